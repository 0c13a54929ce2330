use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::domain::placement::PlacementRule;
use crate::domain::specification::resource_spec::{ResourceRequirement, Visibility, VolumeSpec};
use crate::error::{Error, Result};

/// Named group of resources reserved once and shared by every task that references it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSet {
    pub id: String,
    pub resources: Vec<ResourceRequirement>,
    pub volumes: Vec<VolumeSpec>,
}

impl ResourceSet {
    /// Resources and volumes as one list of requirements.
    pub fn requirements(&self) -> Vec<ResourceRequirement> {
        self.resources.iter().cloned().chain(self.volumes.iter().cloned().map(ResourceRequirement::Volume)).collect()
    }

    pub fn static_ports(&self) -> impl Iterator<Item = u64> + '_ {
        self.resources.iter().filter_map(|requirement| requirement.port_spec()).map(|port| port.port()).filter(|port| *port != 0)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for requirement in self.requirements() {
            if !seen.insert(requirement.identity()) {
                return Err(Error::InvalidRequirement(format!("Resource set '{}' declares '{}' more than once", self.id, requirement.identity())));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum GoalState {
    #[default]
    Running,
    Finish,
    Once,
}

impl fmt::Display for GoalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalState::Running => write!(f, "RUNNING"),
            GoalState::Finish => write!(f, "FINISH"),
            GoalState::Once => write!(f, "ONCE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CommandSpec {
    pub value: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DiscoverySpec {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportEncryptionKind {
    Tls,
    Keystore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportEncryptionSpec {
    pub name: String,
    pub kind: TransportEncryptionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub goal: GoalState,
    pub resource_set_id: String,
    #[serde(default)]
    pub command: Option<CommandSpec>,
    #[serde(default)]
    pub health_check: Option<CheckSpec>,
    #[serde(default)]
    pub readiness_check: Option<CheckSpec>,
    #[serde(default)]
    pub discovery: Option<DiscoverySpec>,
    #[serde(default)]
    pub transport_encryption: Vec<TransportEncryptionSpec>,
}

impl TaskSpec {
    pub fn new(name: &str, resource_set_id: &str) -> Self {
        Self {
            name: name.to_string(),
            goal: GoalState::Running,
            resource_set_id: resource_set_id.to_string(),
            command: None,
            health_check: None,
            readiness_check: None,
            discovery: None,
            transport_encryption: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PodSpec {
    pub pod_type: String,
    pub count: u32,
    pub user: Option<String>,
    pub tasks: Vec<TaskSpec>,
    pub resource_sets: Vec<ResourceSet>,

    /// Pod-level volumes, reserved against the executor and mounted into every task.
    pub volumes: Vec<VolumeSpec>,
    pub placement_rule: Option<Arc<dyn PlacementRule>>,
}

impl PodSpec {
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|task| task.name == name)
    }

    pub fn resource_set(&self, id: &str) -> Option<&ResourceSet> {
        self.resource_sets.iter().find(|resource_set| resource_set.id == id)
    }

    /// Every statically configured port in the pod.
    pub fn static_ports(&self) -> HashSet<u64> {
        self.resource_sets.iter().flat_map(|resource_set| resource_set.static_ports()).collect()
    }

    /// Rejects specifications that could never be evaluated, before any offer is looked at.
    pub fn validate(&self) -> Result<()> {
        let mut task_names = HashSet::new();
        for task in &self.tasks {
            if !task_names.insert(task.name.as_str()) {
                return Err(Error::InvalidRequirement(format!("Pod '{}' declares task '{}' more than once", self.pod_type, task.name)));
            }
            if self.resource_set(&task.resource_set_id).is_none() {
                return Err(Error::InvalidRequirement(format!(
                    "Task '{}' of pod '{}' references unknown resource set '{}'",
                    task.name, self.pod_type, task.resource_set_id
                )));
            }
        }

        let mut set_ids = HashSet::new();
        for resource_set in &self.resource_sets {
            if !set_ids.insert(resource_set.id.as_str()) {
                return Err(Error::InvalidRequirement(format!("Pod '{}' declares resource set '{}' more than once", self.pod_type, resource_set.id)));
            }
            resource_set.validate()?;
        }

        let mut pod_paths = HashSet::new();
        for volume in &self.volumes {
            if !pod_paths.insert(volume.container_path.as_str()) {
                return Err(Error::InvalidRequirement(format!("Pod '{}' declares volume '{}' more than once", self.pod_type, volume.container_path)));
            }
        }

        Ok(())
    }
}

/// One concrete replica of a pod, e.g. `hello-0`.
#[derive(Debug, Clone)]
pub struct PodInstance {
    pub pod: Arc<PodSpec>,
    pub index: u32,
}

impl PodInstance {
    pub fn new(pod: Arc<PodSpec>, index: u32) -> Self {
        Self { pod, index }
    }

    pub fn name(&self) -> String {
        format!("{}-{}", self.pod.pod_type, self.index)
    }

    pub fn task_instance_name(&self, task_name: &str) -> String {
        format!("{}-{}", self.name(), task_name)
    }
}
