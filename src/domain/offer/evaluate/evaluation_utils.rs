use std::cmp::Ordering;

use crate::domain::offer::evaluate::outcome::{EvaluationOutcome, FailureReason};
use crate::domain::offer::operation::Operation;
use crate::domain::offer::resource::Resource;
use crate::domain::offer::resource_builder::ResourceBuilder;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::specification::resource_spec::ResourceSpec;
use crate::domain::utils::id::ResourceId;

/// Outcome of matching one simple resource, plus the resource to attach to the draft when it passed.
#[derive(Debug)]
pub struct ResourceEvaluation {
    pub outcome: EvaluationOutcome,
    pub resource: Option<Resource>,
}

impl ResourceEvaluation {
    fn failed(outcome: EvaluationOutcome) -> Self {
        Self { outcome, resource: None }
    }
}

/// Matches `spec` against the pool.
///
/// Without a `resource_id` the full quantity is reserved fresh. With one, the existing reservation is
/// reused and only the difference is reserved or unreserved under the same resource id.
pub fn evaluate_simple_resource(source: &str, pool: &mut ResourcePool, spec: &ResourceSpec, resource_id: Option<&ResourceId>) -> ResourceEvaluation {
    let offer_id = pool.offer().id.clone();

    let Some(resource_id) = resource_id else {
        if pool.consume_reservable_merged(&spec.name, &spec.value, &spec.pre_reserved_role).is_none() {
            return ResourceEvaluation::failed(EvaluationOutcome::fail(
                source,
                FailureReason::InsufficientResources,
                format!("Offer lacks unreserved {} for {}", spec.value, spec.name),
            ));
        }

        let resource = ResourceBuilder::from_spec(spec, None).build();
        let operations = vec![Operation::Reserve { offer_id, resource: resource.clone() }];
        let reason = format!("Reserving new {}", resource);
        return ResourceEvaluation { outcome: EvaluationOutcome::pass(source, operations, reason), resource: Some(resource) };
    };

    let Some(reserved) = pool.consume_reserved(&spec.name, &spec.value, resource_id) else {
        return ResourceEvaluation::failed(EvaluationOutcome::fail(
            source,
            FailureReason::MissingReservation,
            format!("Offer lacks reserved {} with resource id {}", spec.name, resource_id),
        ));
    };

    let resource = ResourceBuilder::from_spec(spec, Some(resource_id.clone())).build();
    let ordering = match spec.value.compare(&reserved.value) {
        Ok(ordering) => ordering,
        Err(e) => {
            log::error!("Reservation {} cannot be compared against {}: {}", resource_id, spec, e);
            return ResourceEvaluation::failed(EvaluationOutcome::fail(source, FailureReason::InsufficientResources, e.to_string()));
        }
    };

    match ordering {
        Ordering::Equal => {
            let reason = format!("Reusing reserved {}", resource);
            ResourceEvaluation { outcome: EvaluationOutcome::pass(source, Vec::new(), reason), resource: Some(resource) }
        }
        Ordering::Greater => {
            let increase = &spec.value - &reserved.value;
            if pool.consume_reservable_merged(&spec.name, &increase, &spec.pre_reserved_role).is_none() {
                return ResourceEvaluation::failed(EvaluationOutcome::fail(
                    source,
                    FailureReason::InsufficientResources,
                    format!("Offer lacks unreserved {} to grow reservation {} of {}", increase, resource_id, spec.name),
                ));
            }

            log::info!("Growing reservation {} of {} by {}", resource_id, spec.name, increase);
            let delta = ResourceBuilder::from_spec(spec, Some(resource_id.clone())).value(increase).build();
            let reason = format!("Reserving additional {}", delta);
            let operations = vec![Operation::Reserve { offer_id, resource: delta }];
            ResourceEvaluation { outcome: EvaluationOutcome::pass(source, operations, reason), resource: Some(resource) }
        }
        Ordering::Less => {
            let decrease = &reserved.value - &spec.value;
            log::info!("Shrinking reservation {} of {} by {}", resource_id, spec.name, decrease);

            let delta = ResourceBuilder::from_spec(spec, Some(resource_id.clone())).value(decrease).build();
            let reason = format!("Unreserving surplus {}", delta);
            let operations = vec![Operation::Unreserve { offer_id, resource: delta }];
            ResourceEvaluation { outcome: EvaluationOutcome::pass(source, operations, reason), resource: Some(resource) }
        }
    }
}
