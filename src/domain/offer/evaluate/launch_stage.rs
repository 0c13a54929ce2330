use crate::domain::offer::evaluate::outcome::EvaluationOutcome;
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::EvaluationStage;
use crate::domain::offer::operation::Operation;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::state::task::{ExecutorInfo, GoalStateOverride, TaskInfo, labels};
use crate::domain::utils::id::{OfferId, TaskId};

/// Command a paused task runs instead of its own.
pub const PAUSE_COMMAND: &str = "echo This task is PAUSED, sleeping ... && while true; do sleep 1000; done";

#[derive(Debug)]
enum LaunchSource {
    /// The task draft built up by the preceding stages.
    Draft { task_name: String },

    /// A running task whose reservations stay untouched; only its metadata is refreshed.
    Running(TaskInfo),
}

/// Finalizes a task descriptor and emits the terminal launch operation.
///
/// `should_launch = false` keeps the task's footprint and metadata current without starting it.
#[derive(Debug)]
pub struct LaunchEvaluationStage {
    source: LaunchSource,
    should_launch: bool,
    goal_override: GoalStateOverride,
}

impl LaunchEvaluationStage {
    pub fn new(task_name: &str, should_launch: bool, goal_override: GoalStateOverride) -> Self {
        Self { source: LaunchSource::Draft { task_name: task_name.to_string() }, should_launch, goal_override }
    }

    pub fn metadata_only(running: TaskInfo) -> Self {
        Self { source: LaunchSource::Running(running), should_launch: false, goal_override: GoalStateOverride::None }
    }

    fn launch_operation(&self, offer_id: OfferId, mut task: TaskInfo, executor: ExecutorInfo, use_default_executor: bool) -> Operation {
        if use_default_executor {
            Operation::LaunchGroup { offer_id, task, executor, should_launch: self.should_launch }
        } else {
            task.executor = Some(executor);
            Operation::Launch { offer_id, task, should_launch: self.should_launch }
        }
    }
}

impl EvaluationStage for LaunchEvaluationStage {
    fn evaluate(&self, pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let offer = pool.offer();
        let use_default_executor = pod.use_default_executor();

        let task_name = match &self.source {
            LaunchSource::Running(running) => {
                let mut task = running.clone();
                task.set_label(labels::TARGET_CONFIGURATION, pod.target_config_id().to_string());
                let executor = task.executor.clone().unwrap_or_else(|| pod.executor().clone());
                let reason = format!("Updating metadata of running task {}", task.name);
                let operation = self.launch_operation(offer.id.clone(), task, executor, use_default_executor);
                return EvaluationOutcome::pass(self.name(), vec![operation], reason);
            }
            LaunchSource::Draft { task_name } => task_name,
        };

        let executor = pod.executor().clone();
        let Some(task) = pod.task_mut(task_name) else {
            panic!("Launch stage for unknown task '{}'", task_name);
        };

        task.task_id = TaskId::with_prefix(&task.name);
        task.agent_id = offer.agent_id.clone();
        task.set_label(labels::OFFER_HOSTNAME, offer.hostname.clone());
        if !offer.attributes.is_empty() {
            task.set_label(labels::OFFER_ATTRIBUTES, offer.attribute_string());
        }
        if let Some(domain) = &offer.domain {
            task.set_label(labels::OFFER_REGION, domain.region.clone());
            task.set_label(labels::OFFER_ZONE, domain.zone.clone());
        }

        if self.should_launch && self.goal_override == GoalStateOverride::Paused {
            log::info!("Launching task {} in paused state", task.name);
            if let Some(command) = task.command.as_mut() {
                command.value = PAUSE_COMMAND.to_string();
            }
            task.health_check = None;
            task.readiness_check = None;
            task.set_label(labels::GOAL_OVERRIDE, GoalStateOverride::Paused.to_string());
        }

        let task = task.clone();
        let reason = format!("Added launch information for {} (should launch: {})", task.name, self.should_launch);
        let operation = self.launch_operation(offer.id.clone(), task, executor, use_default_executor);
        EvaluationOutcome::pass(self.name(), vec![operation], reason)
    }

    fn name(&self) -> &'static str {
        "LaunchEvaluationStage"
    }
}
