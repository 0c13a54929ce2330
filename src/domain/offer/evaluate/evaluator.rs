use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::offer::evaluate::outcome::EvaluationOutcome;
use crate::domain::offer::evaluate::pipeline::{PipelineContext, PipelineKind, build_pipeline, pipeline_kind};
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::tls_stage::TlsProvisioner;
use crate::domain::offer::offer::Offer;
use crate::domain::offer::operation::{Operation, validate_ordering};
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::specification::requirement::{PodInstanceRequirement, RecoveryType};
use crate::domain::state::state_store::StateStore;
use crate::domain::state::task::TaskInfo;
use crate::domain::utils::id::ExecutorId;
use crate::error::Result;

/// Resources the default executor itself needs, reserved once per pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOverhead {
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
}

impl Default for ExecutorOverhead {
    fn default() -> Self {
        Self { cpus: 0.1, mem: 32.0, disk: 256.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub service_name: String,

    /// Role the framework reserves resources under.
    pub role: String,
    pub principal: Option<String>,

    /// Configuration new launches are labelled with.
    pub target_config_id: Uuid,

    /// Launch tasks into a shared default executor (LAUNCH_GROUP) instead of inline (LAUNCH).
    pub use_default_executor: bool,
    pub executor_overhead: ExecutorOverhead,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            service_name: "hello-world".to_string(),
            role: "hello-world-role".to_string(),
            principal: Some("hello-world-principal".to_string()),
            target_config_id: Uuid::new_v4(),
            use_default_executor: true,
            executor_overhead: ExecutorOverhead::default(),
        }
    }
}

/// Matches a pod instance requirement against a batch of offers, first fit.
#[derive(Debug)]
pub struct OfferEvaluator {
    state_store: Arc<dyn StateStore>,
    config: EvaluatorConfig,
    tls: Option<Arc<dyn TlsProvisioner>>,
}

impl OfferEvaluator {
    pub fn new(state_store: Arc<dyn StateStore>, config: EvaluatorConfig) -> Self {
        Self { state_store, config, tls: None }
    }

    pub fn with_tls_provisioner(mut self, provisioner: Arc<dyn TlsProvisioner>) -> Self {
        self.tls = Some(provisioner);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Returns the operations of the first offer every stage accepts, or an empty list when none does.
    ///
    /// # Errors
    /// `Error::InvalidRequirement` if the pod specification is malformed and `Error::StateStore` if reading
    /// persisted state fails. Rejected offers are never errors.
    pub fn evaluate(&self, requirement: &PodInstanceRequirement, offers: &[Offer]) -> Result<Vec<Operation>> {
        let pod_instance = &requirement.pod_instance;

        let all_tasks = self.state_store.fetch_tasks()?;
        let mut pod_tasks = BTreeMap::new();
        let mut running = BTreeSet::new();
        let mut goal_overrides = BTreeMap::new();

        for task in &pod_instance.pod.tasks {
            let instance_name = pod_instance.task_instance_name(&task.name);
            if let Some(info) = self.state_store.fetch_task(&instance_name)? {
                pod_tasks.insert(task.name.clone(), info);
            }
            if self.state_store.fetch_status(&instance_name)?.is_some_and(|status| status.is_running()) {
                running.insert(task.name.clone());
            }
            goal_overrides.insert(task.name.clone(), self.state_store.fetch_goal_override_status(&instance_name)?);
        }

        let kind = pipeline_kind(requirement, &pod_tasks);
        let executor_id = match kind {
            PipelineKind::ExistingPod => running_executor_id(&pod_tasks, &running),
            _ => None,
        };
        let target_config_id = self.target_config_id(requirement, &pod_tasks);

        let context = PipelineContext {
            requirement,
            config: &self.config,
            tls: self.tls.clone(),
            all_tasks: &all_tasks,
            pod_tasks: &pod_tasks,
            running: &running,
            goal_overrides: &goal_overrides,
            executor_id: executor_id.clone(),
        };
        let pipeline = build_pipeline(&context, kind)?;
        log::info!("Evaluating {} against {} offer(s) with the {} pipeline of {} stages", requirement, offers.len(), kind, pipeline.len());

        for (index, offer) in offers.iter().enumerate() {
            let mut pool = ResourcePool::new(offer.clone(), &self.config.role);
            let mut pod = PodInfoBuilder::new(
                requirement,
                &self.config.service_name,
                target_config_id,
                self.config.use_default_executor,
                pod_tasks.clone(),
                executor_id.clone(),
            );

            // Every stage runs, even after a failure, so the log explains all reasons at once.
            let outcomes: Vec<EvaluationOutcome> = pipeline.iter().map(|stage| stage.evaluate(&mut pool, &mut pod)).collect();
            let failed_stages = outcomes.iter().filter(|outcome| !outcome.is_passing()).count();
            let passed_stages = outcomes.len() - failed_stages;
            let operations: Vec<Operation> = outcomes.iter().flat_map(|outcome| outcome.operations().iter().cloned()).collect();

            let first_failure = outcomes.iter().find_map(|outcome| outcome.failure());
            let summary = match first_failure {
                None => EvaluationOutcome::pass("OfferEvaluator", Vec::new(), format!("Offer {} passed all {} stages", offer.id, passed_stages)),
                Some(failure) => EvaluationOutcome::fail("OfferEvaluator", failure, format!("Offer {} failed {} of {} stages", offer.id, failed_stages, outcomes.len())),
            }
            .with_children(outcomes);
            let accepted_operations = if failed_stages == 0 { operations.len() } else { 0 };

            tracing::info!(
                offer = %offer.id,
                passed_stages,
                failed_stages,
                operations = accepted_operations,
                "Evaluated offer {}/{} for {}",
                index + 1,
                offers.len(),
                pod_instance.name()
            );
            log::info!("Offer {} outcome:\n{}", offer.id, summary.tree(1));

            if failed_stages == 0 {
                if let Err(e) = validate_ordering(&operations) {
                    log::error!("Operations for offer {} violate the ordering contract: {}", offer.id, e);
                }
                return Ok(operations);
            }
        }

        log::info!("No offer satisfied {}", requirement);
        Ok(Vec::new())
    }

    /// Configuration a relaunch should carry.
    ///
    /// Recovering pods keep the configuration they were launched with; everything else moves to the
    /// configured target.
    fn target_config_id(&self, requirement: &PodInstanceRequirement, pod_tasks: &BTreeMap<String, TaskInfo>) -> Uuid {
        if requirement.recovery_type == RecoveryType::None {
            return self.config.target_config_id;
        }
        let Some(first) = pod_tasks.values().next() else {
            return self.config.target_config_id;
        };

        match first.target_config_id() {
            Some(id) => id,
            None => {
                log::error!("Task {} has no valid target configuration label, using {}", first.name, self.config.target_config_id);
                self.config.target_config_id
            }
        }
    }
}

/// Executor id of a running task of the pod.
fn running_executor_id(pod_tasks: &BTreeMap<String, TaskInfo>, running: &BTreeSet<String>) -> Option<ExecutorId> {
    pod_tasks
        .iter()
        .filter(|(name, _)| running.contains(*name))
        .find_map(|(_, task)| task.executor.as_ref().map(|executor| executor.executor_id.clone()))
}
