//! Error type shared by every engine component.
//!
//! All failures are local validation failures returned to the immediate
//! caller. Nothing is retried and nothing is recovered automatically; the
//! caller's unit of work discards staged writes when one of these comes back.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Malformed or inconsistent process definition.
    #[error("Structure error at '{id}': {reason}")]
    Structure { id: String, reason: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The chosen edge does not leave the instance's current position.
    #[error("Invalid transition via edge '{edge_id}': {reason}")]
    InvalidTransition { edge_id: String, reason: String },

    #[error("Instance {instance_id} is already {state}")]
    TerminalState { instance_id: u64, state: &'static str },

    #[error("User {actor_id} may not act on node '{node_id}'")]
    Permission { actor_id: u64, node_id: String },

    #[error("Guard '{expression}' failed: {reason}")]
    Evaluation { expression: String, reason: String },

    #[error("No eligible path leaves gateway '{gateway_id}'")]
    NoMatchingTransition { gateway_id: String },

    #[error("Node '{node_id}' has unsupported kind {kind}")]
    UnsupportedNodeKind { node_id: String, kind: String },

    #[error("Variable '{name}' rejected: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("Role resolution failed for tenant {tenant_id}: {reason}")]
    RoleResolution { tenant_id: u64, reason: String },

    #[error("Repository error: {0}")]
    Repository(String),
}

impl EngineError {
    pub fn structure(id: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Structure {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn evaluation(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Evaluation {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Stable label used for log fields and failure counters.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Structure { .. } => "structure",
            EngineError::NotFound { .. } => "not_found",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::TerminalState { .. } => "terminal_state",
            EngineError::Permission { .. } => "permission",
            EngineError::Evaluation { .. } => "evaluation",
            EngineError::NoMatchingTransition { .. } => "no_matching_transition",
            EngineError::UnsupportedNodeKind { .. } => "unsupported_node_kind",
            EngineError::InvalidVariable { .. } => "invalid_variable",
            EngineError::RoleResolution { .. } => "role_resolution",
            EngineError::Repository(_) => "repository",
        }
    }

    /// The engine never retries; every error goes back to the caller as is.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
