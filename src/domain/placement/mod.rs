use std::fmt::Debug;

use crate::domain::offer::evaluate::outcome::EvaluationOutcome;
use crate::domain::offer::offer::Offer;
use crate::domain::specification::pod_spec::PodInstance;
use crate::domain::state::task::TaskInfo;

/// Colocation / anti-affinity predicate supplied alongside a pod specification.
///
/// Implementations decide whether `offer` may host `pod_instance` given every task the scheduler currently
/// knows about, and explain the decision through the returned outcome.
pub trait PlacementRule: Debug + Send + Sync {
    fn filter(&self, offer: &Offer, pod_instance: &PodInstance, tasks: &[TaskInfo]) -> EvaluationOutcome;
}
