use std::fmt;

use crate::domain::offer::evaluate::outcome::EvaluationOutcome;
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::resource_pool::ResourcePool;

/// One unit of the evaluation pipeline.
///
/// Stages run strictly in pipeline order against one offer. They may consume from the pool and write
/// into their own slice of the pod draft, and always report back with an outcome instead of erroring.
pub trait EvaluationStage: fmt::Debug {
    fn evaluate(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome;

    fn name(&self) -> &'static str;
}

/// Which part of the pod draft a stage attaches its resources to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StageTarget {
    Executor,

    /// Every task that declares this resource set.
    ResourceSet(String),
}

impl fmt::Display for StageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageTarget::Executor => write!(f, "executor"),
            StageTarget::ResourceSet(id) => write!(f, "resource set '{}'", id),
        }
    }
}
