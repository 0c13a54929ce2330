use crate::domain::offer::evaluate::evaluation_utils::evaluate_simple_resource;
use crate::domain::offer::evaluate::outcome::{EvaluationOutcome, FailureReason};
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::{EvaluationStage, StageTarget};
use crate::domain::offer::operation::Operation;
use crate::domain::offer::resource::Resource;
use crate::domain::offer::resource_builder::ResourceBuilder;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::specification::resource_spec::{VolumeSpec, VolumeType};
use crate::domain::utils::id::{PersistenceId, ResourceId};

/// Reserves and creates a persistent volume, or reuses an existing one.
///
/// ROOT volumes resize like any mergeable resource. MOUNT volumes take a whole offered disk; once created
/// their persistence id and source root stay fixed for the life of the volume.
#[derive(Debug)]
pub struct VolumeEvaluationStage {
    spec: VolumeSpec,
    target: StageTarget,
    resource_id: Option<ResourceId>,
    persistence_id: Option<PersistenceId>,
    source_root: Option<String>,
}

impl VolumeEvaluationStage {
    pub fn new(spec: VolumeSpec, target: StageTarget) -> Self {
        Self { spec, target, resource_id: None, persistence_id: None, source_root: None }
    }

    pub fn existing(spec: VolumeSpec, target: StageTarget, resource_id: ResourceId, persistence_id: Option<PersistenceId>, source_root: Option<String>) -> Self {
        Self { spec, target, resource_id: Some(resource_id), persistence_id, source_root }
    }

    fn attach(&self, pod: &mut PodInfoBuilder, resource: Resource) {
        if self.target == StageTarget::Executor {
            pod.add_volume_mount(&self.spec.container_path);
        }
        pod.add_resource(&self.target, resource);
    }

    fn evaluate_root(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let evaluation = evaluate_simple_resource(self.name(), pool, &self.spec.resource, self.resource_id.as_ref());
        let Some(reserved) = evaluation.resource else {
            return evaluation.outcome;
        };

        let volume = ResourceBuilder::from_spec(&self.spec.resource, reserved.resource_id())
            .volume(VolumeType::Root, &self.spec.container_path, self.persistence_id.clone(), None)
            .build();

        let mut operations = evaluation.outcome.into_operations();
        if self.persistence_id.is_none() {
            operations.push(Operation::Create { offer_id: pool.offer().id.clone(), resource: volume.clone() });
        }

        let reason = format!("Offer contains ROOT volume {}", volume);
        self.attach(pod, volume);
        EvaluationOutcome::pass(self.name(), operations, reason)
    }

    fn evaluate_mount(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let offer_id = pool.offer().id.clone();
        let name = self.spec.resource.name.as_str();
        let mut operations = Vec::new();

        let (offered, resource_id) = match &self.resource_id {
            Some(resource_id) => match pool.consume_reserved(name, &self.spec.resource.value, resource_id) {
                Some(offered) => (offered, resource_id.clone()),
                None => {
                    return EvaluationOutcome::fail(
                        self.name(),
                        FailureReason::MissingReservation,
                        format!("Offer lacks reserved MOUNT volume {} with resource id {}", self.spec.container_path, resource_id),
                    );
                }
            },
            None => match pool.consume_atomic(name, &self.spec.resource.value) {
                Some(offered) => (offered, ResourceId::random()),
                None => {
                    return EvaluationOutcome::fail(
                        self.name(),
                        FailureReason::AtomicUnavailable,
                        format!("Offer lacks a MOUNT disk of at least {} for {}", self.spec.resource.value, self.spec.container_path),
                    );
                }
            },
        };

        let source_root = offered.source_root().map(str::to_string).or_else(|| self.source_root.clone());
        let volume = ResourceBuilder::from_spec(&self.spec.resource, Some(resource_id))
            .value(offered.value.clone())
            .volume(VolumeType::Mount, &self.spec.container_path, self.persistence_id.clone(), source_root.as_deref())
            .build();

        if self.resource_id.is_none() {
            let mut reservation = volume.clone();
            if let Some(disk) = reservation.disk.as_mut() {
                disk.persistence = None;
                disk.volume = None;
            }
            operations.push(Operation::Reserve { offer_id: offer_id.clone(), resource: reservation });
        }
        if self.persistence_id.is_none() {
            operations.push(Operation::Create { offer_id, resource: volume.clone() });
        }

        let reason = format!("Offer contains MOUNT volume {}", volume);
        self.attach(pod, volume);
        EvaluationOutcome::pass(self.name(), operations, reason)
    }
}

impl EvaluationStage for VolumeEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        if self.target == StageTarget::Executor && pod.is_executor_running(pool.offer()) {
            if let (Some(resource_id), Some(persistence_id)) = (&self.resource_id, &self.persistence_id) {
                let volume = ResourceBuilder::from_spec(&self.spec.resource, Some(resource_id.clone()))
                    .volume(self.spec.volume_type, &self.spec.container_path, Some(persistence_id.clone()), self.source_root.as_deref())
                    .build();
                let reason = format!("Executor is running, keeping volume {}", volume);
                self.attach(pod, volume);
                return EvaluationOutcome::pass(self.name(), Vec::new(), reason);
            }
        }

        match self.spec.volume_type {
            VolumeType::Root => self.evaluate_root(pool, pod),
            VolumeType::Mount => self.evaluate_mount(pool, pod),
        }
    }

    fn name(&self) -> &'static str {
        "VolumeEvaluationStage"
    }
}
