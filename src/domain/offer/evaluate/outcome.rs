use std::fmt;

use crate::domain::offer::operation::Operation;

/// Why a stage rejected an offer. Offer rejection is routine and never an `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    InsufficientResources,
    AtomicUnavailable,
    MissingReservation,
    PortUnavailable,
    ExecutorMismatch,
    PlacementRejected,
    TlsProvisioning,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::InsufficientResources => "insufficient resources",
            FailureReason::AtomicUnavailable => "atomic resource unavailable",
            FailureReason::MissingReservation => "missing reservation",
            FailureReason::PortUnavailable => "port unavailable",
            FailureReason::ExecutorMismatch => "executor mismatch",
            FailureReason::PlacementRejected => "placement rejected",
            FailureReason::TlsProvisioning => "tls provisioning",
        };
        write!(f, "{}", text)
    }
}

/// Result of running one stage against one offer. Immutable once built.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    passed: bool,
    source: String,
    operations: Vec<Operation>,
    reason: String,
    failure: Option<FailureReason>,
    children: Vec<EvaluationOutcome>,
}

impl EvaluationOutcome {
    pub fn pass(source: &str, operations: Vec<Operation>, reason: impl Into<String>) -> Self {
        Self { passed: true, source: source.to_string(), operations, reason: reason.into(), failure: None, children: Vec::new() }
    }

    pub fn fail(source: &str, failure: FailureReason, reason: impl Into<String>) -> Self {
        Self { passed: false, source: source.to_string(), operations: Vec::new(), reason: reason.into(), failure: Some(failure), children: Vec::new() }
    }

    pub fn with_children(mut self, children: Vec<EvaluationOutcome>) -> Self {
        self.children = children;
        self
    }

    pub fn is_passing(&self) -> bool {
        self.passed
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    pub fn children(&self) -> &[EvaluationOutcome] {
        &self.children
    }

    /// Renders this outcome and its children as an indented tree, one line per outcome.
    pub fn tree(&self, depth: usize) -> String {
        let mut lines = vec![format!("{}{}", "  ".repeat(depth), self)];
        lines.extend(self.children.iter().map(|child| child.tree(depth + 1)));
        lines.join("\n")
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure {
            None => write!(f, "PASS({}): {}", self.source, self.reason),
            Some(failure) => write!(f, "FAIL({}) [{}]: {}", self.source, failure, self.reason),
        }
    }
}
