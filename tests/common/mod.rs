#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use offer_evaluation::domain::offer::evaluate::evaluator::{EvaluatorConfig, OfferEvaluator};
use offer_evaluation::domain::offer::offer::Offer;
use offer_evaluation::domain::offer::operation::{Operation, OperationKind};
use offer_evaluation::domain::offer::resource::{DISK, DiskInfo, DiskSource, DiskSourceKind, Resource};
use offer_evaluation::domain::offer::resource_builder::ResourceBuilder;
use offer_evaluation::domain::offer::value::{Range, Value};
use offer_evaluation::domain::specification::pod_spec::{PodInstance, PodSpec, ResourceSet, TaskSpec};
use offer_evaluation::domain::specification::requirement::PodInstanceRequirement;
use offer_evaluation::domain::specification::resource_spec::{PortSpec, ResourceRequirement, ResourceSpec, VolumeSpec, VolumeType};
use offer_evaluation::domain::state::state_store::{MemoryStateStore, StateStore};
use offer_evaluation::domain::state::task::{ExecutorInfo, GoalStateOverride, TaskInfo, TaskState, TaskStatus, labels};
use offer_evaluation::domain::utils::id::{ExecutorId, PersistenceId, ResourceId, TaskId};
use offer_evaluation::error::{Error, Result};

pub const ROLE: &str = "hello-world-role";
pub const PRINCIPAL: &str = "hello-world-principal";
pub const POD_TYPE: &str = "hello";

pub fn config(use_default_executor: bool) -> EvaluatorConfig {
    EvaluatorConfig { use_default_executor, ..EvaluatorConfig::default() }
}

pub fn cpus(amount: f64) -> ResourceSpec {
    ResourceSpec::new("cpus", Value::scalar(amount), ROLE, Some(PRINCIPAL))
}

pub fn mem(amount: f64) -> ResourceSpec {
    ResourceSpec::new("mem", Value::scalar(amount), ROLE, Some(PRINCIPAL))
}

pub fn simple(spec: ResourceSpec) -> ResourceRequirement {
    ResourceRequirement::Simple(spec)
}

pub fn port(number: u64, name: &str) -> PortSpec {
    PortSpec::new(number, name, ROLE, Some(PRINCIPAL))
}

pub fn volume(size: f64, volume_type: VolumeType, container_path: &str) -> VolumeSpec {
    VolumeSpec::new(size, volume_type, container_path, ROLE, Some(PRINCIPAL))
}

pub fn resource_set(id: &str, resources: Vec<ResourceRequirement>, volumes: Vec<VolumeSpec>) -> ResourceSet {
    ResourceSet { id: id.to_string(), resources, volumes }
}

pub fn pod(tasks: Vec<TaskSpec>, resource_sets: Vec<ResourceSet>) -> PodSpec {
    PodSpec { pod_type: POD_TYPE.to_string(), count: 1, user: None, tasks, resource_sets, volumes: Vec::new(), placement_rule: None }
}

/// Single task `server` on resource set `server-resources`.
pub fn single_task_pod(resources: Vec<ResourceRequirement>, volumes: Vec<VolumeSpec>) -> PodSpec {
    pod(vec![TaskSpec::new("server", "server-resources")], vec![resource_set("server-resources", resources, volumes)])
}

pub fn requirement(pod: PodSpec, tasks: &[&str]) -> PodInstanceRequirement {
    PodInstanceRequirement::new(PodInstance::new(Arc::new(pod), 0), tasks.iter().copied())
}

pub fn unreserved(name: &str, value: Value) -> Resource {
    Resource::new(name, value)
}

pub fn unreserved_scalar(name: &str, amount: f64) -> Resource {
    Resource::new(name, Value::scalar(amount))
}

pub fn unreserved_ports(begin: u64, end: u64) -> Resource {
    Resource::new("ports", Value::ranges(vec![Range::new(begin, end)]))
}

/// Unreserved MOUNT disk of `size` rooted at `root`.
pub fn mount_disk(size: f64, root: &str) -> Resource {
    let mut disk = Resource::new(DISK, Value::scalar(size));
    disk.disk = Some(DiskInfo { source: Some(DiskSource { kind: DiskSourceKind::Mount, root: Some(root.to_string()) }), persistence: None, volume: None });
    disk
}

/// `spec` as it looks once reserved under `resource_id`.
pub fn reserved(spec: &ResourceSpec, resource_id: &str) -> Resource {
    ResourceBuilder::from_spec(spec, Some(ResourceId::new(resource_id))).build()
}

/// Created MOUNT volume at `container_path` on the disk rooted at `root`.
pub fn reserved_mount_volume(size: f64, container_path: &str, root: &str, resource_id: &str, persistence_id: &str) -> Resource {
    let spec = volume(size, VolumeType::Mount, container_path);
    ResourceBuilder::from_spec(&spec.resource, Some(ResourceId::new(resource_id)))
        .volume(VolumeType::Mount, container_path, Some(PersistenceId::new(persistence_id)), Some(root))
        .build()
}

/// Created ROOT volume at `container_path`.
pub fn reserved_root_volume(size: f64, container_path: &str, resource_id: &str, persistence_id: &str) -> Resource {
    let spec = volume(size, VolumeType::Root, container_path);
    ResourceBuilder::from_spec(&spec.resource, Some(ResourceId::new(resource_id)))
        .volume(VolumeType::Root, container_path, Some(PersistenceId::new(persistence_id)), None)
        .build()
}

pub fn offer(id: &str, resources: Vec<Resource>) -> Offer {
    resources.into_iter().fold(Offer::new(id, "agent-1", "host-1"), Offer::with_resource)
}

/// Previously launched `hello-0-<task_name>` holding `resources`, run by `executor_id`.
pub fn prior_task(task_name: &str, resources: Vec<Resource>, executor_id: &str) -> TaskInfo {
    let name = format!("{}-0-{}", POD_TYPE, task_name);
    let mut task = TaskInfo::new(&name);
    task.task_id = TaskId::with_prefix(&name);
    task.resources = resources;
    task.executor = Some(ExecutorInfo { executor_id: ExecutorId::new(executor_id), name: POD_TYPE.to_string(), resources: Vec::new() });
    task.set_label(labels::TASK_TYPE, POD_TYPE);
    task.set_label(labels::INDEX, "0");
    task
}

pub fn store_with(tasks: Vec<(TaskInfo, TaskState)>) -> Arc<MemoryStateStore> {
    let store = Arc::new(MemoryStateStore::new());
    for (task, state) in tasks {
        let name = task.name.clone();
        let task_id = task.task_id.clone();
        store.store_task(task).unwrap();
        store.store_status(&name, TaskStatus { task_id, state }).unwrap();
    }
    store
}

pub fn evaluator(store: Arc<dyn StateStore>, config: EvaluatorConfig) -> OfferEvaluator {
    OfferEvaluator::new(store, config)
}

/// Which read of an `UnavailableStateStore` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingRead {
    AllTasks,
    Task,
}

/// Store whose chosen read always fails; every other read sees an empty store. Counts every read.
#[derive(Debug)]
pub struct UnavailableStateStore {
    failing: FailingRead,
    reads: AtomicUsize,
    task_reads: AtomicUsize,
}

impl UnavailableStateStore {
    pub fn new(failing: FailingRead) -> Self {
        Self { failing, reads: AtomicUsize::new(0), task_reads: AtomicUsize::new(0) }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn task_reads(&self) -> usize {
        self.task_reads.load(Ordering::SeqCst)
    }
}

impl StateStore for UnavailableStateStore {
    fn fetch_task(&self, task_name: &str) -> Result<Option<TaskInfo>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.task_reads.fetch_add(1, Ordering::SeqCst);
        match self.failing {
            FailingRead::Task => Err(Error::StateStore(format!("task {} is unreadable", task_name))),
            FailingRead::AllTasks => Ok(None),
        }
    }

    fn fetch_tasks(&self) -> Result<Vec<TaskInfo>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.failing {
            FailingRead::AllTasks => Err(Error::StateStore("task list is unreadable".to_string())),
            FailingRead::Task => Ok(Vec::new()),
        }
    }

    fn fetch_status(&self, _task_name: &str) -> Result<Option<TaskStatus>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    fn fetch_goal_override_status(&self, _task_name: &str) -> Result<GoalStateOverride> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(GoalStateOverride::None)
    }
}

pub fn kinds(operations: &[Operation]) -> Vec<OperationKind> {
    operations.iter().map(Operation::kind).collect()
}

/// Resources of every RESERVE in `operations`.
pub fn reserved_resources(operations: &[Operation]) -> Vec<&Resource> {
    operations.iter().filter(|operation| operation.kind() == OperationKind::Reserve).filter_map(Operation::resource).collect()
}

pub fn launched_task<'a>(operations: &'a [Operation], task_name: &str) -> &'a TaskInfo {
    let name = format!("{}-0-{}", POD_TYPE, task_name);
    operations.iter().filter_map(Operation::task).find(|task| task.name == name).unwrap_or_else(|| panic!("No launch of {} in {:?}", name, operations))
}
