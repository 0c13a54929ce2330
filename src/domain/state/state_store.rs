use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use crate::domain::state::task::{GoalStateOverride, TaskInfo, TaskStatus};
use crate::error::{Error, Result};

/// Read access to the scheduler's persisted task state.
///
/// Failures are propagated to the caller unchanged; the evaluator never retries a read.
pub trait StateStore: Debug + Send + Sync {
    fn fetch_task(&self, task_name: &str) -> Result<Option<TaskInfo>>;

    fn fetch_tasks(&self) -> Result<Vec<TaskInfo>>;

    fn fetch_status(&self, task_name: &str) -> Result<Option<TaskStatus>>;

    fn fetch_goal_override_status(&self, task_name: &str) -> Result<GoalStateOverride>;
}

new_key_type! {
    pub struct TaskKey;
}

#[derive(Debug)]
struct StoredTask {
    info: TaskInfo,
    status: Option<TaskStatus>,
    goal_override: GoalStateOverride,
}

#[derive(Debug)]
struct StoreInner {
    /// Task storage.
    slots: SlotMap<TaskKey, StoredTask>,

    /// Lookup of the internal key by task name.
    name_index: HashMap<String, TaskKey>,
}

/// `StateStore` kept entirely in memory, used by the CLI and in tests.
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    /// Both maps are protected with a single lock.
    inner: Arc<RwLock<StoreInner>>,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(StoreInner { slots: SlotMap::with_key(), name_index: HashMap::new() })) }
    }

    /// Stores (or replaces) a task descriptor, keeping its status and override.
    pub fn store_task(&self, info: TaskInfo) -> Result<TaskKey> {
        let mut guard = self.inner.write().map_err(|_| Error::StateStore("task store lock poisoned".to_string()))?;

        if let Some(key) = guard.name_index.get(&info.name).copied() {
            if let Some(stored) = guard.slots.get_mut(key) {
                stored.info = info;
                return Ok(key);
            }
        }

        let name = info.name.clone();
        let key = guard.slots.insert(StoredTask { info, status: None, goal_override: GoalStateOverride::None });
        guard.name_index.insert(name, key);

        Ok(key)
    }

    pub fn store_status(&self, task_name: &str, status: TaskStatus) -> Result<()> {
        self.update(task_name, |stored| stored.status = Some(status))
    }

    pub fn store_goal_override(&self, task_name: &str, goal_override: GoalStateOverride) -> Result<()> {
        self.update(task_name, |stored| stored.goal_override = goal_override)
    }

    fn update(&self, task_name: &str, apply: impl FnOnce(&mut StoredTask)) -> Result<()> {
        let mut guard = self.inner.write().map_err(|_| Error::StateStore("task store lock poisoned".to_string()))?;
        let key = guard.name_index.get(task_name).copied().ok_or_else(|| Error::StateStore(format!("Unknown task '{}'", task_name)))?;

        match guard.slots.get_mut(key) {
            Some(stored) => {
                apply(stored);
                Ok(())
            }
            None => Err(Error::StateStore(format!("Task '{}' is indexed but not stored", task_name))),
        }
    }

    fn read<T>(&self, task_name: &str, extract: impl FnOnce(&StoredTask) -> T) -> Result<Option<T>> {
        let guard = self.inner.read().map_err(|_| Error::StateStore("task store lock poisoned".to_string()))?;
        let Some(key) = guard.name_index.get(task_name) else {
            return Ok(None);
        };
        Ok(guard.slots.get(*key).map(extract))
    }
}

impl StateStore for MemoryStateStore {
    fn fetch_task(&self, task_name: &str) -> Result<Option<TaskInfo>> {
        self.read(task_name, |stored| stored.info.clone())
    }

    fn fetch_tasks(&self) -> Result<Vec<TaskInfo>> {
        let guard = self.inner.read().map_err(|_| Error::StateStore("task store lock poisoned".to_string()))?;
        Ok(guard.slots.values().map(|stored| stored.info.clone()).collect())
    }

    fn fetch_status(&self, task_name: &str) -> Result<Option<TaskStatus>> {
        Ok(self.read(task_name, |stored| stored.status.clone())?.flatten())
    }

    fn fetch_goal_override_status(&self, task_name: &str) -> Result<GoalStateOverride> {
        Ok(self.read(task_name, |stored| stored.goal_override)?.unwrap_or_default())
    }
}
