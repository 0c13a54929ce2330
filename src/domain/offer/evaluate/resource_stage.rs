use crate::domain::offer::evaluate::evaluation_utils::evaluate_simple_resource;
use crate::domain::offer::evaluate::outcome::EvaluationOutcome;
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::{EvaluationStage, StageTarget};
use crate::domain::offer::resource_builder::ResourceBuilder;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::specification::resource_spec::ResourceSpec;
use crate::domain::utils::id::ResourceId;

/// Reserves (or reuses and resizes) one scalar or range resource.
#[derive(Debug)]
pub struct ResourceEvaluationStage {
    spec: ResourceSpec,
    target: StageTarget,
    resource_id: Option<ResourceId>,
}

impl ResourceEvaluationStage {
    pub fn new(spec: ResourceSpec, target: StageTarget, resource_id: Option<ResourceId>) -> Self {
        Self { spec, target, resource_id }
    }
}

impl EvaluationStage for ResourceEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        // A running executor already holds its reservations on the agent.
        if self.target == StageTarget::Executor && pod.is_executor_running(pool.offer()) {
            if let Some(resource_id) = &self.resource_id {
                let resource = ResourceBuilder::from_spec(&self.spec, Some(resource_id.clone())).build();
                let reason = format!("Executor is running, keeping {}", resource);
                pod.add_resource(&self.target, resource);
                return EvaluationOutcome::pass(self.name(), Vec::new(), reason);
            }
        }

        let evaluation = evaluate_simple_resource(self.name(), pool, &self.spec, self.resource_id.as_ref());
        if let Some(resource) = evaluation.resource {
            pod.add_resource(&self.target, resource);
        }
        evaluation.outcome
    }

    fn name(&self) -> &'static str {
        "ResourceEvaluationStage"
    }
}
