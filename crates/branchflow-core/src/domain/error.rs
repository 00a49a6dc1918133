//! Error taxonomy for branchflow.

/// Errors produced while unwrapping an inbound notification envelope.
///
/// These are never fatal: the orchestrator logs the envelope and drops it.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("unsupported reference type: {reference_type}")]
    UnsupportedReferenceType { reference_type: String },

    #[error("unknown event type: {event_type}")]
    UnknownEventType { event_type: String },
}

/// Failures reported by the stack, credential and job collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExternalError {
    #[error("stack already exists: {stack_name}")]
    AlreadyExists { stack_name: String },

    #[error("stack not found: {stack_name}")]
    StackNotFound { stack_name: String },

    #[error("assume role {role_arn} failed: {message}")]
    AssumeRole { role_arn: String, message: String },

    #[error("start job {project} failed: {message}")]
    StartJob { project: String, message: String },

    #[error("{operation} failed: {message}")]
    Rejected { operation: String, message: String },
}

/// Result type for collaborator calls.
pub type ExternalResult<T> = std::result::Result<T, ExternalError>;

/// Configuration errors raised while building a [`crate::config::TriggerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Errors surfaced from a branchflow invocation.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("external call failed: {0}")]
    External(#[from] ExternalError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for branchflow operations.
pub type Result<T> = std::result::Result<T, TriggerError>;
