use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::domain::offer::evaluate::cleanup_stage::{DestroyEvaluationStage, UnreserveEvaluationStage};
use crate::domain::offer::evaluate::evaluator::EvaluatorConfig;
use crate::domain::offer::evaluate::executor_stage::ExecutorEvaluationStage;
use crate::domain::offer::evaluate::launch_stage::LaunchEvaluationStage;
use crate::domain::offer::evaluate::placement_stage::PlacementRuleEvaluationStage;
use crate::domain::offer::evaluate::port_stage::PortEvaluationStage;
use crate::domain::offer::evaluate::resource_mapper::{ResourceLabels, ResourceMapping, map_resources};
use crate::domain::offer::evaluate::resource_stage::ResourceEvaluationStage;
use crate::domain::offer::evaluate::stage::{EvaluationStage, StageTarget};
use crate::domain::offer::evaluate::tls_stage::{TlsEvaluationStage, TlsProvisioner};
use crate::domain::offer::evaluate::volume_stage::VolumeEvaluationStage;
use crate::domain::offer::resource::{CPUS, DISK, MEM};
use crate::domain::offer::value::Value;
use crate::domain::specification::pod_spec::{GoalState, PodSpec, TaskSpec};
use crate::domain::specification::requirement::{PodInstanceRequirement, RecoveryType};
use crate::domain::specification::resource_spec::{ResourceRequirement, ResourceSpec, ordered_requirements};
use crate::domain::state::task::{ExecutorInfo, GoalStateOverride, TaskInfo};
use crate::domain::utils::id::ExecutorId;
use crate::error::{Error, Result};

pub type Pipeline = Vec<Box<dyn EvaluationStage>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// No task of the pod has ever reserved anything.
    NewPod,

    /// The pod is replaced from scratch: permanent recovery, or every task is marked permanently failed.
    FailedPod,

    /// Existing reservations are reused and only the difference is reserved or released.
    ExistingPod,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::NewPod => write!(f, "new pod"),
            PipelineKind::FailedPod => write!(f, "failed pod"),
            PipelineKind::ExistingPod => write!(f, "existing pod"),
        }
    }
}

/// Everything pipeline assembly reads, gathered once per evaluation.
#[derive(Debug)]
pub struct PipelineContext<'a> {
    pub requirement: &'a PodInstanceRequirement,
    pub config: &'a EvaluatorConfig,
    pub tls: Option<Arc<dyn TlsProvisioner>>,

    /// Every task the scheduler knows about, for placement rules.
    pub all_tasks: &'a [TaskInfo],

    /// Previous descriptors of this pod's tasks, keyed by task spec name.
    pub pod_tasks: &'a BTreeMap<String, TaskInfo>,

    /// Spec names of this pod's tasks that are currently running.
    pub running: &'a BTreeSet<String>,
    pub goal_overrides: &'a BTreeMap<String, GoalStateOverride>,

    /// Executor the offer has to carry, if the pod's executor is still up.
    pub executor_id: Option<ExecutorId>,
}

impl PipelineContext<'_> {
    fn pod(&self) -> &PodSpec {
        &self.requirement.pod_instance.pod
    }

    fn goal_override(&self, task_name: &str) -> GoalStateOverride {
        self.goal_overrides.get(task_name).copied().unwrap_or_default()
    }
}

pub fn pipeline_kind(requirement: &PodInstanceRequirement, pod_tasks: &BTreeMap<String, TaskInfo>) -> PipelineKind {
    if !pod_tasks.values().any(TaskInfo::has_reservations) {
        return PipelineKind::NewPod;
    }
    if requirement.recovery_type == RecoveryType::Permanent || pod_tasks.values().all(TaskInfo::is_permanently_failed) {
        return PipelineKind::FailedPod;
    }
    PipelineKind::ExistingPod
}

/// Assembles the ordered stage list for one pod instance requirement.
pub fn build_pipeline(context: &PipelineContext, kind: PipelineKind) -> Result<Pipeline> {
    context.requirement.validate()?;

    let pipeline = match kind {
        PipelineKind::NewPod | PipelineKind::FailedPod => new_pod_pipeline(context)?,
        PipelineKind::ExistingPod => existing_pod_pipeline(context)?,
    };

    log::debug!("Assembled {} pipeline for {}: {:?}", kind, context.requirement, pipeline.iter().map(|stage| stage.name()).collect::<Vec<_>>());
    Ok(pipeline)
}

fn new_pod_pipeline(context: &PipelineContext) -> Result<Pipeline> {
    let pod = context.pod();
    let mut pipeline: Pipeline = vec![Box::new(ExecutorEvaluationStage::new(None))];

    if let Some(rule) = &pod.placement_rule {
        pipeline.push(Box::new(PlacementRuleEvaluationStage::new(rule.clone(), context.all_tasks.to_vec())));
    }

    for requirement in executor_requirements(context) {
        pipeline.push(requirement_stage(requirement, StageTarget::Executor, None));
    }

    for resource_set_id in resource_sets_in_launch_order(context.requirement) {
        let resource_set = pod
            .resource_set(&resource_set_id)
            .ok_or_else(|| Error::InvalidRequirement(format!("Unknown resource set '{}' in pod '{}'", resource_set_id, pod.pod_type)))?;

        for requirement in ordered_requirements(resource_set.requirements()) {
            pipeline.push(requirement_stage(requirement, StageTarget::ResourceSet(resource_set_id.clone()), None));
        }
    }

    pipeline.extend(tls_stages(context));

    for task in &pod.tasks {
        let should_launch = context.requirement.should_launch(&task.name);
        pipeline.push(Box::new(LaunchEvaluationStage::new(&task.name, should_launch, context.goal_override(&task.name))));
    }

    Ok(pipeline)
}

fn existing_pod_pipeline(context: &PipelineContext) -> Result<Pipeline> {
    let pod = context.pod();
    let mut pipeline: Pipeline = vec![Box::new(ExecutorEvaluationStage::new(context.executor_id.clone()))];
    pipeline.extend(tls_stages(context));

    let prior_executor = prior_executor(context.pod_tasks, context.executor_id.as_ref());
    let executor_mapping = map_resources(prior_executor.map(|executor| executor.resources.as_slice()).unwrap_or_default(), executor_requirements(context), None);

    // Tasks launched now, plus sidecars that finished and need their reservations kept current.
    let refreshed: Vec<&TaskSpec> = pod
        .tasks
        .iter()
        .filter(|task| {
            context.requirement.should_launch(&task.name) || (matches!(task.goal, GoalState::Once | GoalState::Finish) && !context.running.contains(&task.name))
        })
        .collect();

    let mut set_mappings: Vec<(String, ResourceMapping)> = Vec::new();
    for task in &refreshed {
        if set_mappings.iter().any(|(resource_set_id, _)| *resource_set_id == task.resource_set_id) {
            continue;
        }
        let resource_set = pod
            .resource_set(&task.resource_set_id)
            .ok_or_else(|| Error::InvalidRequirement(format!("Task '{}' references unknown resource set '{}'", task.name, task.resource_set_id)))?;

        let prior_task = prior_task_for_set(context, &task.name, &task.resource_set_id);
        if prior_task.is_none() {
            log::info!("No previous launch of resource set '{}' found, all of its resources are new", task.resource_set_id);
        }
        let prior_resources = prior_task.map(|prior| prior.resources.as_slice()).unwrap_or_default();
        set_mappings.push((task.resource_set_id.clone(), map_resources(prior_resources, resource_set.requirements(), prior_task)));
    }

    // Release orphans first: all DESTROYs, then all UNRESERVEs.
    let orphans: Vec<_> = executor_mapping.orphans.iter().chain(set_mappings.iter().flat_map(|(_, mapping)| mapping.orphans.iter())).collect();
    for orphan in orphans.iter().filter(|orphan| orphan.persistence_id().is_some()) {
        pipeline.push(Box::new(DestroyEvaluationStage::new((*orphan).clone())));
    }
    for orphan in &orphans {
        pipeline.push(Box::new(UnreserveEvaluationStage::new((*orphan).clone())));
    }

    pipeline.extend(mapping_stages(executor_mapping, StageTarget::Executor));
    for (resource_set_id, mapping) in set_mappings {
        pipeline.extend(mapping_stages(mapping, StageTarget::ResourceSet(resource_set_id)));
    }

    for task in &refreshed {
        let should_launch = context.requirement.should_launch(&task.name);
        pipeline.push(Box::new(LaunchEvaluationStage::new(&task.name, should_launch, context.goal_override(&task.name))));
    }

    // Running tasks keep their reservations until they terminate; only their target configuration moves.
    for task in &pod.tasks {
        if refreshed.iter().any(|refreshed| refreshed.name == task.name) || !context.running.contains(&task.name) {
            continue;
        }
        if let Some(running) = context.pod_tasks.get(&task.name) {
            pipeline.push(Box::new(LaunchEvaluationStage::metadata_only(running.clone())));
        }
    }

    Ok(pipeline)
}

/// Stage for one requirement, reusing the reservation in `existing` when present.
fn requirement_stage(requirement: ResourceRequirement, target: StageTarget, existing: Option<&ResourceLabels>) -> Box<dyn EvaluationStage> {
    let resource_id = existing.map(|labels| labels.resource_id.clone());
    match requirement {
        ResourceRequirement::Simple(spec) => Box::new(ResourceEvaluationStage::new(spec, target, resource_id)),
        ResourceRequirement::Port(port) => Box::new(PortEvaluationStage::new(port, target, resource_id)),
        ResourceRequirement::NamedVip(vip) => Box::new(PortEvaluationStage::named_vip(vip, target, resource_id)),
        ResourceRequirement::Volume(volume) => match existing {
            Some(labels) => {
                Box::new(VolumeEvaluationStage::existing(volume, target, labels.resource_id.clone(), labels.persistence_id.clone(), labels.source_root.clone()))
            }
            None => Box::new(VolumeEvaluationStage::new(volume, target)),
        },
    }
}

/// Update and create stages of a mapping, in evaluation order.
fn mapping_stages(mapping: ResourceMapping, target: StageTarget) -> Vec<Box<dyn EvaluationStage>> {
    let mut entries: Vec<(ResourceRequirement, Option<ResourceLabels>)> = mapping
        .updates
        .into_iter()
        .map(|labels| (labels.requirement.clone(), Some(labels)))
        .chain(mapping.creates.into_iter().map(|requirement| (requirement, None)))
        .collect();
    entries.sort_by_key(|(requirement, _)| requirement.evaluation_rank());

    entries.into_iter().map(|(requirement, labels)| requirement_stage(requirement, target.clone(), labels.as_ref())).collect()
}

/// Default-executor overhead plus pod-level volumes.
fn executor_requirements(context: &PipelineContext) -> Vec<ResourceRequirement> {
    let config = context.config;
    let mut requirements = Vec::new();

    if config.use_default_executor {
        let overhead = &config.executor_overhead;
        for (name, amount) in [(CPUS, overhead.cpus), (MEM, overhead.mem), (DISK, overhead.disk)] {
            requirements.push(ResourceRequirement::Simple(ResourceSpec::new(name, Value::scalar(amount), &config.role, config.principal.as_deref())));
        }
    }

    requirements.extend(context.pod().volumes.iter().cloned().map(ResourceRequirement::Volume));
    requirements
}

/// Resource sets of the tasks being launched first, then the sets of the pod's remaining tasks.
fn resource_sets_in_launch_order(requirement: &PodInstanceRequirement) -> Vec<String> {
    let pod = &requirement.pod_instance.pod;
    let launched = pod.tasks.iter().filter(|task| requirement.should_launch(&task.name));
    let remaining = pod.tasks.iter().filter(|task| !requirement.should_launch(&task.name));

    let mut resource_set_ids: Vec<String> = Vec::new();
    for task in launched.chain(remaining) {
        if !resource_set_ids.contains(&task.resource_set_id) {
            resource_set_ids.push(task.resource_set_id.clone());
        }
    }
    resource_set_ids
}

/// Previous descriptor holding the reservations of `resource_set_id`, preferring the task itself.
fn prior_task_for_set<'a>(context: &PipelineContext<'a>, task_name: &str, resource_set_id: &str) -> Option<&'a TaskInfo> {
    if let Some(task) = context.pod_tasks.get(task_name) {
        return Some(task);
    }
    context
        .pod()
        .tasks
        .iter()
        .filter(|task| task.resource_set_id == resource_set_id)
        .find_map(|task| context.pod_tasks.get(&task.name))
}

/// Executor whose resources the pod holds: the running one when known, otherwise the first recorded.
fn prior_executor<'a>(pod_tasks: &'a BTreeMap<String, TaskInfo>, executor_id: Option<&ExecutorId>) -> Option<&'a ExecutorInfo> {
    let mut executors = pod_tasks.values().filter_map(|task| task.executor.as_ref());
    match executor_id {
        Some(executor_id) => executors.find(|executor| executor.executor_id == *executor_id),
        None => executors.next(),
    }
}

fn tls_stages(context: &PipelineContext) -> Vec<Box<dyn EvaluationStage>> {
    context
        .pod()
        .tasks
        .iter()
        .filter(|task| context.requirement.should_launch(&task.name) && !task.transport_encryption.is_empty())
        .map(|task| Box::new(TlsEvaluationStage::new(&task.name, task.transport_encryption.clone(), context.tls.clone())) as Box<dyn EvaluationStage>)
        .collect()
}
