use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use crate::domain::offer::evaluate::port_lookup::prior_task_port;
use crate::domain::offer::evaluate::stage::StageTarget;
use crate::domain::offer::offer::Offer;
use crate::domain::offer::resource::{PORTS, Resource};
use crate::domain::specification::pod_spec::{PodInstance, TaskSpec};
use crate::domain::specification::requirement::PodInstanceRequirement;
use crate::domain::specification::resource_spec::PortSpec;
use crate::domain::state::task::{CheckInfo, CommandInfo, DiscoveryInfo, DiscoveryPort, ExecutorInfo, TaskInfo, labels};
use crate::domain::utils::id::ExecutorId;

/// In-progress pod for one evaluation attempt: a task draft per task spec plus the executor draft.
///
/// Stages write only into the slice their target names; the drafts are turned into launch operations by
/// the launch stages at the end of the pipeline, or dropped with the offer.
#[derive(Debug)]
pub struct PodInfoBuilder {
    pod_instance: PodInstance,
    target_config_id: Uuid,
    use_default_executor: bool,

    /// Drafts keyed by task spec name.
    tasks: BTreeMap<String, TaskInfo>,
    executor: ExecutorInfo,

    /// Descriptors of the previous launch, keyed by task spec name.
    prior_tasks: BTreeMap<String, TaskInfo>,

    /// Ports handed out on overlay networks, which never show up as resources.
    overlay_ports: BTreeSet<u64>,
}

impl PodInfoBuilder {
    pub fn new(
        requirement: &PodInstanceRequirement,
        service_name: &str,
        target_config_id: Uuid,
        use_default_executor: bool,
        prior_tasks: BTreeMap<String, TaskInfo>,
        executor_id: Option<ExecutorId>,
    ) -> Self {
        let pod_instance = requirement.pod_instance.clone();
        let tasks = pod_instance
            .pod
            .tasks
            .iter()
            .map(|spec| (spec.name.clone(), task_draft(requirement, spec, service_name, target_config_id)))
            .collect();

        let executor = ExecutorInfo { executor_id: executor_id.unwrap_or_else(ExecutorId::empty), name: pod_instance.pod.pod_type.clone(), resources: Vec::new() };

        Self { pod_instance, target_config_id, use_default_executor, tasks, executor, prior_tasks, overlay_ports: BTreeSet::new() }
    }

    pub fn pod_instance(&self) -> &PodInstance {
        &self.pod_instance
    }

    pub fn target_config_id(&self) -> Uuid {
        self.target_config_id
    }

    pub fn use_default_executor(&self) -> bool {
        self.use_default_executor
    }

    pub fn executor(&self) -> &ExecutorInfo {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut ExecutorInfo {
        &mut self.executor
    }

    /// Whether the executor this pod already owns is running on the offered agent.
    pub fn is_executor_running(&self, offer: &Offer) -> bool {
        offer.has_executor(&self.executor.executor_id)
    }

    pub fn task(&self, task_name: &str) -> Option<&TaskInfo> {
        self.tasks.get(task_name)
    }

    pub fn task_mut(&mut self, task_name: &str) -> Option<&mut TaskInfo> {
        self.tasks.get_mut(task_name)
    }

    pub fn prior_task(&self, task_name: &str) -> Option<&TaskInfo> {
        self.prior_tasks.get(task_name)
    }

    /// Spec names of every task that declares `resource_set_id`.
    pub fn tasks_in_set(&self, resource_set_id: &str) -> Vec<String> {
        self.pod_instance.pod.tasks.iter().filter(|task| task.resource_set_id == resource_set_id).map(|task| task.name.clone()).collect()
    }

    fn target_tasks(&mut self, target: &StageTarget) -> Vec<&mut TaskInfo> {
        let StageTarget::ResourceSet(resource_set_id) = target else {
            return Vec::new();
        };
        let names: HashSet<String> = self.tasks_in_set(resource_set_id).into_iter().collect();
        self.tasks.iter_mut().filter(|(name, _)| names.contains(*name)).map(|(_, task)| task).collect()
    }

    /// Attaches `resource` to the executor or to every task sharing the resource set.
    pub fn add_resource(&mut self, target: &StageTarget, resource: Resource) {
        match target {
            StageTarget::Executor => self.executor.resources.push(resource),
            StageTarget::ResourceSet(_) => {
                for task in self.target_tasks(target) {
                    task.resources.push(resource.clone());
                }
            }
        }
    }

    /// Mounts a pod-level volume into every task.
    pub fn add_volume_mount(&mut self, container_path: &str) {
        for task in self.tasks.values_mut() {
            if !task.volume_mounts.iter().any(|path| path == container_path) {
                task.volume_mounts.push(container_path.to_string());
            }
        }
    }

    /// Exports `port` under `env_key` to the command, health check and readiness check of the target tasks.
    pub fn set_port_environment(&mut self, target: &StageTarget, env_key: &str, port: u64) {
        for task in self.target_tasks(target) {
            let commands = [task.command.as_mut(), task.health_check.as_mut().map(|check| &mut check.command), task.readiness_check.as_mut().map(|check| &mut check.command)];
            for command in commands.into_iter().flatten() {
                command.environment.insert(env_key.to_string(), port.to_string());
            }
        }
    }

    pub fn add_discovery_port(&mut self, target: &StageTarget, port: DiscoveryPort) {
        for task in self.target_tasks(target) {
            let name = task.name.clone();
            let discovery = task.discovery.get_or_insert_with(|| DiscoveryInfo { name, visibility: port.visibility, ports: Vec::new() });
            discovery.ports.retain(|existing| existing.name != port.name);
            discovery.ports.push(port.clone());
        }
    }

    /// Port a previous launch of a task in the target used for `port`.
    pub fn prior_port(&self, target: &StageTarget, port: &PortSpec) -> Option<u64> {
        let StageTarget::ResourceSet(resource_set_id) = target else {
            return None;
        };
        self.tasks_in_set(resource_set_id).iter().filter_map(|name| self.prior_tasks.get(name)).find_map(|task| prior_task_port(task, port))
    }

    /// Every host port already attached to a task or executor draft during this attempt.
    pub fn assigned_ports(&self) -> HashSet<u64> {
        self.tasks
            .values()
            .flat_map(|task| task.resources.iter())
            .chain(self.executor.resources.iter())
            .filter(|resource| resource.name == PORTS)
            .flat_map(|resource| resource.value.ports())
            .collect()
    }

    pub fn overlay_ports(&self) -> &BTreeSet<u64> {
        &self.overlay_ports
    }

    pub fn assign_overlay_port(&mut self, port: u64) {
        self.overlay_ports.insert(port);
    }
}

fn task_draft(requirement: &PodInstanceRequirement, spec: &TaskSpec, service_name: &str, target_config_id: Uuid) -> TaskInfo {
    let pod_instance = &requirement.pod_instance;
    let name = pod_instance.task_instance_name(&spec.name);
    let mut task = TaskInfo::new(&name);

    let mut environment = spec.command.as_ref().map(|command| command.environment.clone()).unwrap_or_default();
    environment.extend(requirement.environment.clone());
    environment.insert("TASK_NAME".to_string(), name.clone());
    environment.insert("POD_INSTANCE_INDEX".to_string(), pod_instance.index.to_string());
    environment.insert("FRAMEWORK_NAME".to_string(), service_name.to_string());

    let command_value = spec.command.as_ref().map(|command| command.value.clone()).unwrap_or_default();
    task.command = Some(CommandInfo { value: command_value, environment: environment.clone() });
    task.health_check = spec.health_check.as_ref().map(|check| CheckInfo { command: CommandInfo { value: check.command.clone(), environment: environment.clone() } });
    task.readiness_check = spec.readiness_check.as_ref().map(|check| CheckInfo { command: CommandInfo { value: check.command.clone(), environment: environment.clone() } });

    let discovery = spec.discovery.clone().unwrap_or_default();
    let discovery_name = match &discovery.prefix {
        Some(prefix) => format!("{}-{}", prefix, pod_instance.index),
        None => name.clone(),
    };
    task.discovery = Some(DiscoveryInfo { name: discovery_name, visibility: discovery.visibility.unwrap_or_default(), ports: Vec::new() });

    task.set_label(labels::TASK_TYPE, pod_instance.pod.pod_type.clone());
    task.set_label(labels::INDEX, pod_instance.index.to_string());
    task.set_label(labels::TARGET_CONFIGURATION, target_config_id.to_string());
    task.set_label(labels::GOAL_STATE, spec.goal.to_string());
    task
}
