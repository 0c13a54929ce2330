use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::offer::resource::Resource;
use crate::domain::specification::resource_spec::Visibility;
use crate::domain::utils::id::{AgentId, ExecutorId, TaskId};

/// Label keys written onto task descriptors.
pub mod labels {
    pub const TASK_TYPE: &str = "task_type";
    pub const INDEX: &str = "index";
    pub const TARGET_CONFIGURATION: &str = "target_configuration";
    pub const GOAL_STATE: &str = "goal_state";
    pub const OFFER_ATTRIBUTES: &str = "offer_attributes";
    pub const OFFER_HOSTNAME: &str = "offer_hostname";
    pub const OFFER_REGION: &str = "offer_region";
    pub const OFFER_ZONE: &str = "offer_zone";
    pub const PERMANENTLY_FAILED: &str = "permanently_failed";
    pub const GOAL_OVERRIDE: &str = "goal_override";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CommandInfo {
    pub value: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInfo {
    pub command: CommandInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPort {
    pub number: u64,
    pub name: String,
    pub protocol: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub ports: Vec<DiscoveryPort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    pub executor_id: ExecutorId,
    pub name: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Task descriptor, both as persisted after a launch and as drafted during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub executor: Option<ExecutorInfo>,
    #[serde(default)]
    pub command: Option<CommandInfo>,
    #[serde(default)]
    pub health_check: Option<CheckInfo>,
    #[serde(default)]
    pub readiness_check: Option<CheckInfo>,
    #[serde(default)]
    pub discovery: Option<DiscoveryInfo>,

    /// Container paths of pod-level volumes mounted into this task.
    #[serde(default)]
    pub volume_mounts: Vec<String>,

    /// References to provisioned TLS artifacts.
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl TaskInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            task_id: TaskId::empty(),
            agent_id: AgentId::empty(),
            resources: Vec::new(),
            executor: None,
            command: None,
            health_check: None,
            readiness_check: None,
            discovery: None,
            volume_mounts: Vec::new(),
            secrets: Vec::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn set_label(&mut self, key: &str, value: impl Into<String>) {
        self.labels.insert(key.to_string(), value.into());
    }

    pub fn target_config_id(&self) -> Option<Uuid> {
        self.label(labels::TARGET_CONFIGURATION).and_then(|id| Uuid::parse_str(id).ok())
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.label(labels::PERMANENTLY_FAILED) == Some("true")
    }

    /// Whether any resource of the task carries one of our reservations.
    pub fn has_reservations(&self) -> bool {
        self.resources.iter().any(|resource| resource.is_reserved())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
}

impl TaskStatus {
    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }
}

/// Operator override of a task's goal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum GoalStateOverride {
    #[default]
    None,
    Paused,
}

impl fmt::Display for GoalStateOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStateOverride::None => write!(f, "NONE"),
            GoalStateOverride::Paused => write!(f, "PAUSED"),
        }
    }
}
