use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::offer::resource::Resource;
use crate::domain::utils::id::{AgentId, ExecutorId, OfferId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultDomain {
    pub region: String,
    pub zone: String,
}

/// A time-boxed grant of resources on one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub agent_id: AgentId,
    pub hostname: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Executors of this framework that are currently running on the agent.
    #[serde(default)]
    pub executor_ids: Vec<ExecutorId>,
    #[serde(default)]
    pub domain: Option<FaultDomain>,
}

impl Offer {
    pub fn new(id: &str, agent_id: &str, hostname: &str) -> Self {
        Self {
            id: OfferId::new(id),
            agent_id: AgentId::new(agent_id),
            hostname: hostname.to_string(),
            resources: Vec::new(),
            attributes: BTreeMap::new(),
            executor_ids: Vec::new(),
            domain: None,
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_executor(mut self, executor_id: ExecutorId) -> Self {
        self.executor_ids.push(executor_id);
        self
    }

    pub fn has_executor(&self, executor_id: &ExecutorId) -> bool {
        !executor_id.is_empty() && self.executor_ids.contains(executor_id)
    }

    /// Attributes flattened as `key:value` pairs joined by `;`.
    pub fn attribute_string(&self) -> String {
        self.attributes.iter().map(|(key, value)| format!("{}:{}", key, value)).collect::<Vec<_>>().join(";")
    }
}
