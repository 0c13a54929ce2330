use std::sync::Arc;

use crate::domain::offer::evaluate::outcome::{EvaluationOutcome, FailureReason};
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::EvaluationStage;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::placement::PlacementRule;
use crate::domain::state::task::TaskInfo;

/// Delegates to the pod's placement rule with every task the scheduler knows about.
#[derive(Debug)]
pub struct PlacementRuleEvaluationStage {
    rule: Arc<dyn PlacementRule>,
    tasks: Vec<TaskInfo>,
}

impl PlacementRuleEvaluationStage {
    pub fn new(rule: Arc<dyn PlacementRule>, tasks: Vec<TaskInfo>) -> Self {
        Self { rule, tasks }
    }
}

impl EvaluationStage for PlacementRuleEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let decision = self.rule.filter(pool.offer(), pod.pod_instance(), &self.tasks);

        if decision.is_passing() {
            EvaluationOutcome::pass(self.name(), Vec::new(), "Placement rule accepted the offer").with_children(vec![decision])
        } else {
            EvaluationOutcome::fail(self.name(), FailureReason::PlacementRejected, format!("Placement rule rejected offer {}", pool.offer().id))
                .with_children(vec![decision])
        }
    }

    fn name(&self) -> &'static str {
        "PlacementRuleEvaluationStage"
    }
}
