use crate::domain::offer::evaluate::outcome::{EvaluationOutcome, FailureReason};
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::EvaluationStage;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::utils::id::ExecutorId;

/// Checks that the offer carries the executor this pod already runs, or mints an id for a new executor.
#[derive(Debug)]
pub struct ExecutorEvaluationStage {
    executor_id: Option<ExecutorId>,
}

impl ExecutorEvaluationStage {
    pub fn new(executor_id: Option<ExecutorId>) -> Self {
        Self { executor_id: executor_id.filter(|id| !id.is_empty()) }
    }
}

impl EvaluationStage for ExecutorEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let Some(executor_id) = &self.executor_id else {
            let minted = ExecutorId::with_prefix(&pod.pod_instance().pod.pod_type);
            let reason = format!("Offer is accepted for new executor {}", minted);
            pod.executor_mut().executor_id = minted;
            return EvaluationOutcome::pass(self.name(), Vec::new(), reason);
        };

        if pool.offer().has_executor(executor_id) {
            pod.executor_mut().executor_id = executor_id.clone();
            EvaluationOutcome::pass(self.name(), Vec::new(), format!("Offer contains the required executor {}", executor_id))
        } else {
            EvaluationOutcome::fail(
                self.name(),
                FailureReason::ExecutorMismatch,
                format!("Offer from agent {} lacks the required executor {}", pool.offer().agent_id, executor_id),
            )
        }
    }

    fn name(&self) -> &'static str {
        "ExecutorEvaluationStage"
    }
}
