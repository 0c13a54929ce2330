use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::specification::pod_spec::PodInstance;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecoveryType {
    /// Regular deployment or configuration update.
    #[default]
    None,
    /// Relaunch in place, reusing existing reservations.
    Transient,
    /// Replace the pod as if it had never run.
    Permanent,
}

impl fmt::Display for RecoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryType::None => write!(f, "NONE"),
            RecoveryType::Transient => write!(f, "TRANSIENT"),
            RecoveryType::Permanent => write!(f, "PERMANENT"),
        }
    }
}

/// Request to realize some or all tasks of one pod instance.
#[derive(Debug, Clone)]
pub struct PodInstanceRequirement {
    pub pod_instance: PodInstance,
    pub tasks_to_launch: BTreeSet<String>,
    pub recovery_type: RecoveryType,

    /// Extra environment injected into every launched task.
    pub environment: BTreeMap<String, String>,
}

impl PodInstanceRequirement {
    pub fn new(pod_instance: PodInstance, tasks_to_launch: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            pod_instance,
            tasks_to_launch: tasks_to_launch.into_iter().map(Into::into).collect(),
            recovery_type: RecoveryType::None,
            environment: BTreeMap::new(),
        }
    }

    pub fn with_recovery_type(mut self, recovery_type: RecoveryType) -> Self {
        self.recovery_type = recovery_type;
        self
    }

    pub fn should_launch(&self, task_name: &str) -> bool {
        self.tasks_to_launch.contains(task_name)
    }

    pub fn validate(&self) -> Result<()> {
        let pod = &self.pod_instance.pod;
        pod.validate()?;

        if self.pod_instance.index >= pod.count {
            return Err(Error::InvalidRequirement(format!("Pod instance {} is out of range: pod '{}' has {} instances", self.pod_instance.name(), pod.pod_type, pod.count)));
        }

        for task_name in &self.tasks_to_launch {
            if pod.task(task_name).is_none() {
                return Err(Error::InvalidRequirement(format!("Cannot launch unknown task '{}' of pod '{}'", task_name, pod.pod_type)));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PodInstanceRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tasks: Vec<&str> = self.tasks_to_launch.iter().map(String::as_str).collect();
        write!(f, "{} [{}] (recovery: {})", self.pod_instance.name(), tasks.join(", "), self.recovery_type)
    }
}
