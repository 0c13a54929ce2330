use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::offer::evaluate::evaluator::EvaluatorConfig;
use crate::domain::offer::offer::Offer;
use crate::domain::offer::value::Value;
use crate::domain::specification::pod_spec::TaskSpec;
use crate::domain::specification::requirement::RecoveryType;
use crate::domain::specification::resource_spec::{Visibility, VolumeType};
use crate::domain::state::task::{GoalStateOverride, TaskInfo, TaskState};

/// One evaluation run: configuration, pod, requirement, persisted state and the offer batch.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScenarioDto {
    #[serde(default)]
    pub config: EvaluatorConfig,
    pub pod: PodSpecDto,
    pub requirement: RequirementDto,

    #[serde(default)]
    pub tasks: Vec<StoredTaskDto>,
    pub offers: Vec<Offer>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PodSpecDto {
    pub pod_type: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub user: Option<String>,
    pub tasks: Vec<TaskSpec>,
    pub resource_sets: Vec<ResourceSetDto>,
    #[serde(default)]
    pub volumes: Vec<VolumeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResourceSetDto {
    pub id: String,
    #[serde(default)]
    pub resources: Vec<ResourceDto>,
    #[serde(default)]
    pub volumes: Vec<VolumeDto>,
}

/// A simple resource when `port` is absent, a port (or named VIP) otherwise.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResourceDto {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub pre_reserved_role: Option<String>,
    #[serde(default)]
    pub port: Option<PortDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PortDto {
    pub port_name: String,
    #[serde(default)]
    pub port: u64,
    #[serde(default)]
    pub env_key: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub network_names: Vec<String>,
    #[serde(default)]
    pub vip: Option<VipDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VipDto {
    pub name: String,
    pub port: u64,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VolumeDto {
    #[serde(rename = "type")]
    pub volume_type: VolumeType,
    pub container_path: String,
    pub size: f64,
    #[serde(default)]
    pub pre_reserved_role: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RequirementDto {
    #[serde(default)]
    pub index: u32,
    pub tasks_to_launch: Vec<String>,
    #[serde(default)]
    pub recovery_type: RecoveryType,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// A persisted task with its last known state.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredTaskDto {
    pub info: TaskInfo,
    #[serde(default)]
    pub state: Option<TaskState>,
    #[serde(default)]
    pub goal_override: GoalStateOverride,
}

fn default_count() -> u32 {
    1
}

fn default_protocol() -> String {
    "tcp".to_string()
}
