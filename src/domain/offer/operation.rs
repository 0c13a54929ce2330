use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::domain::offer::resource::Resource;
use crate::domain::state::task::{ExecutorInfo, TaskInfo};
use crate::domain::utils::id::{OfferId, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Reserve,
    Unreserve,
    Create,
    Destroy,
    Launch,
    LaunchGroup,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Reserve => write!(f, "RESERVE"),
            OperationKind::Unreserve => write!(f, "UNRESERVE"),
            OperationKind::Create => write!(f, "CREATE"),
            OperationKind::Destroy => write!(f, "DESTROY"),
            OperationKind::Launch => write!(f, "LAUNCH"),
            OperationKind::LaunchGroup => write!(f, "LAUNCH_GROUP"),
        }
    }
}

/// Operation to be accepted against one offer.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Reserve { offer_id: OfferId, resource: Resource },
    Unreserve { offer_id: OfferId, resource: Resource },
    Create { offer_id: OfferId, resource: Resource },
    Destroy { offer_id: OfferId, resource: Resource },

    /// Task launched with its executor inline on the task descriptor.
    Launch { offer_id: OfferId, task: TaskInfo, should_launch: bool },

    /// Task launched into the pod's shared executor.
    LaunchGroup { offer_id: OfferId, task: TaskInfo, executor: ExecutorInfo, should_launch: bool },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Reserve { .. } => OperationKind::Reserve,
            Operation::Unreserve { .. } => OperationKind::Unreserve,
            Operation::Create { .. } => OperationKind::Create,
            Operation::Destroy { .. } => OperationKind::Destroy,
            Operation::Launch { .. } => OperationKind::Launch,
            Operation::LaunchGroup { .. } => OperationKind::LaunchGroup,
        }
    }

    pub fn offer_id(&self) -> &OfferId {
        match self {
            Operation::Reserve { offer_id, .. }
            | Operation::Unreserve { offer_id, .. }
            | Operation::Create { offer_id, .. }
            | Operation::Destroy { offer_id, .. }
            | Operation::Launch { offer_id, .. }
            | Operation::LaunchGroup { offer_id, .. } => offer_id,
        }
    }

    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Operation::Reserve { resource, .. }
            | Operation::Unreserve { resource, .. }
            | Operation::Create { resource, .. }
            | Operation::Destroy { resource, .. } => Some(resource),
            _ => None,
        }
    }

    pub fn task(&self) -> Option<&TaskInfo> {
        match self {
            Operation::Launch { task, .. } | Operation::LaunchGroup { task, .. } => Some(task),
            _ => None,
        }
    }

    pub fn should_launch(&self) -> bool {
        match self {
            Operation::Launch { should_launch, .. } | Operation::LaunchGroup { should_launch, .. } => *should_launch,
            _ => false,
        }
    }

    pub fn is_launch(&self) -> bool {
        matches!(self.kind(), OperationKind::Launch | OperationKind::LaunchGroup)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Reserve { resource, .. }
            | Operation::Unreserve { resource, .. }
            | Operation::Create { resource, .. }
            | Operation::Destroy { resource, .. } => write!(f, "{} {}", self.kind(), resource),
            Operation::Launch { task, should_launch, .. } | Operation::LaunchGroup { task, should_launch, .. } => {
                write!(f, "{} {} (task id: {}, should launch: {})", self.kind(), task.name, task.task_id, should_launch)
            }
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum OrderingViolation {
    #[error("DESTROY of {0} follows its UNRESERVE")]
    DestroyAfterUnreserve(ResourceId),

    #[error("{kind} of {resource} follows a launch")]
    ReservationAfterLaunch { kind: OperationKind, resource: String },
}

/// Checks the batch contract for one offer: DESTROY precedes UNRESERVE of the same reservation, and every
/// RESERVE / CREATE precedes the first launch.
pub fn validate_ordering(operations: &[Operation]) -> Result<(), OrderingViolation> {
    let mut unreserved: HashSet<ResourceId> = HashSet::new();
    let mut launched = false;

    for operation in operations {
        match operation {
            Operation::Unreserve { resource, .. } => {
                if let Some(resource_id) = resource.resource_id() {
                    unreserved.insert(resource_id);
                }
            }
            Operation::Destroy { resource, .. } => {
                if let Some(resource_id) = resource.resource_id().filter(|id| unreserved.contains(id)) {
                    return Err(OrderingViolation::DestroyAfterUnreserve(resource_id));
                }
            }
            Operation::Reserve { resource, .. } | Operation::Create { resource, .. } => {
                if launched {
                    return Err(OrderingViolation::ReservationAfterLaunch { kind: operation.kind(), resource: resource.to_string() });
                }
            }
            Operation::Launch { .. } | Operation::LaunchGroup { .. } => launched = true,
        }
    }
    Ok(())
}
