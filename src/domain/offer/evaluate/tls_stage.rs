use std::fmt::Debug;
use std::sync::Arc;

use crate::domain::offer::evaluate::outcome::{EvaluationOutcome, FailureReason};
use crate::domain::offer::evaluate::pod_info_builder::PodInfoBuilder;
use crate::domain::offer::evaluate::stage::EvaluationStage;
use crate::domain::offer::resource_pool::ResourcePool;
use crate::domain::specification::pod_spec::TransportEncryptionSpec;

/// Provisions TLS artifacts for a task and returns references to the stored secrets.
pub trait TlsProvisioner: Debug + Send + Sync {
    fn provision(&self, task_name: &str, spec: &TransportEncryptionSpec) -> Result<Vec<String>, String>;
}

#[derive(Debug)]
pub struct TlsEvaluationStage {
    task_name: String,
    specs: Vec<TransportEncryptionSpec>,
    provisioner: Option<Arc<dyn TlsProvisioner>>,
}

impl TlsEvaluationStage {
    pub fn new(task_name: &str, specs: Vec<TransportEncryptionSpec>, provisioner: Option<Arc<dyn TlsProvisioner>>) -> Self {
        Self { task_name: task_name.to_string(), specs, provisioner }
    }
}

impl EvaluationStage for TlsEvaluationStage {
    fn evaluate(&self, _pool: &mut ResourcePool, pod: &mut PodInfoBuilder) -> EvaluationOutcome {
        let Some(provisioner) = &self.provisioner else {
            return EvaluationOutcome::fail(self.name(), FailureReason::TlsProvisioning, format!("Task '{}' needs transport encryption but no provisioner is configured", self.task_name));
        };

        let instance_name = pod.pod_instance().task_instance_name(&self.task_name);
        let mut secrets = Vec::new();
        for spec in &self.specs {
            match provisioner.provision(&instance_name, spec) {
                Ok(references) => secrets.extend(references),
                Err(e) => {
                    log::error!("Failed to provision TLS artifacts '{}' for {}: {}", spec.name, instance_name, e);
                    return EvaluationOutcome::fail(self.name(), FailureReason::TlsProvisioning, format!("Provisioning '{}' for {} failed: {}", spec.name, instance_name, e));
                }
            }
        }

        let Some(task) = pod.task_mut(&self.task_name) else {
            panic!("TLS stage for unknown task '{}'", self.task_name);
        };
        task.secrets.extend(secrets);

        EvaluationOutcome::pass(self.name(), Vec::new(), format!("Provisioned {} TLS artifact set(s) for {}", self.specs.len(), instance_name))
    }

    fn name(&self) -> &'static str {
        "TlsEvaluationStage"
    }
}
