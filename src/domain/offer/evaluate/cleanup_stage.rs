use crate::domain::offer::evaluate::outcome::EvaluationOutcome;
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::EvaluationStage;
use crate::domain::offer::operation::Operation;
use crate::domain::offer::resource::Resource;
use crate::domain::offer::resource_pool::ResourcePool;

/// Destroys an orphaned persistent volume that is present in the offer.
#[derive(Debug)]
pub struct DestroyEvaluationStage {
    resource: Resource,
}

impl DestroyEvaluationStage {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }
}

impl EvaluationStage for DestroyEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, _pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let in_offer = self.resource.resource_id().is_some_and(|resource_id| pool.reserved_resource(&resource_id).is_some());
        if !in_offer {
            return EvaluationOutcome::pass(self.name(), Vec::new(), format!("Orphaned volume {} is not in this offer", self.resource));
        }

        let operations = vec![Operation::Destroy { offer_id: pool.offer().id.clone(), resource: self.resource.clone() }];
        EvaluationOutcome::pass(self.name(), operations, format!("Destroying orphaned volume {}", self.resource))
    }

    fn name(&self) -> &'static str {
        "DestroyEvaluationStage"
    }
}

/// Releases an orphaned reservation that is present in the offer and returns it to the pool.
#[derive(Debug)]
pub struct UnreserveEvaluationStage {
    resource: Resource,
}

impl UnreserveEvaluationStage {
    pub fn new(resource: Resource) -> Self {
        Self { resource }
    }
}

impl EvaluationStage for UnreserveEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, _pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let Some(offered) = self.resource.resource_id().and_then(|resource_id| pool.reserved_resource(&resource_id).cloned()) else {
            return EvaluationOutcome::pass(self.name(), Vec::new(), format!("Orphaned reservation {} is not in this offer", self.resource));
        };

        // Release what the offer actually holds under this id. A volume is destroyed before this runs.
        let mut released = offered;
        if let Some(disk) = released.disk.as_mut() {
            disk.persistence = None;
            disk.volume = None;
        }
        pool.free(&released);

        let operations = vec![Operation::Unreserve { offer_id: pool.offer().id.clone(), resource: released.clone() }];
        EvaluationOutcome::pass(self.name(), operations, format!("Unreserving orphaned {}", released))
    }

    fn name(&self) -> &'static str {
        "UnreserveEvaluationStage"
    }
}
