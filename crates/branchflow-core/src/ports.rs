//! Collaborator trait definitions for branchflow
//!
//! These traits define the black-box operations the core invokes:
//! - `StackProvisioner`: create/delete per-branch pipeline stacks
//! - `CredentialBroker`: short-lived cross-account role assumption
//! - `JobLauncher`: start the remote metadata-update job
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::domain::error::ExternalResult;
use crate::metadata_sync::MetadataUpdateJob;

// ---------------------------------------------------------------------------
// StackProvisioner: Pipeline Stack Lifecycle
// ---------------------------------------------------------------------------

/// What the provisioner does with a stack whose creation fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnFailure {
    Rollback,
    Delete,
    DoNothing,
}

impl OnFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnFailure::Rollback => "ROLLBACK",
            OnFailure::Delete => "DELETE",
            OnFailure::DoNothing => "DO_NOTHING",
        }
    }
}

/// Capabilities acknowledged when creating a stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Capability {
    #[serde(rename = "CAPABILITY_IAM")]
    Iam,
    #[serde(rename = "CAPABILITY_NAMED_IAM")]
    NamedIam,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
        }
    }
}

/// Full create-stack call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateStackInput {
    pub stack_name: String,
    pub template_url: String,
    pub parameters: BTreeMap<String, String>,
    pub on_failure: OnFailure,
    pub capabilities: Vec<Capability>,
}

/// Identifier the provisioner assigns to a created stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(pub String);

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stack lifecycle.
///
/// Guarantees expected from implementations:
/// - `create_stack` on an existing name fails with `ExternalError::AlreadyExists`.
/// - `delete_stack` on an unknown name either succeeds or fails with
///   `ExternalError::StackNotFound`; callers treat both as success.
#[async_trait]
pub trait StackProvisioner: Send + Sync {
    /// Start stack creation. Returns once the request is accepted.
    async fn create_stack(&self, input: CreateStackInput) -> ExternalResult<StackId>;

    /// Start stack deletion. Returns once the request is accepted.
    async fn delete_stack(&self, stack_name: &str) -> ExternalResult<()>;
}

// ---------------------------------------------------------------------------
// CredentialBroker: Temporary Cross-Account Credentials
// ---------------------------------------------------------------------------

/// Short-lived credentials from a role assumption.
///
/// Deliberately not `Clone`: a credential is moved into the one call that
/// needs it and dropped when that call returns.
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
    /// Session name the role was assumed with
    pub session_name: String,
}

impl TemporaryCredentials {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

impl std::fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .field("session_name", &self.session_name)
            .finish()
    }
}

/// Role assumption in another account.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> ExternalResult<TemporaryCredentials>;
}

// ---------------------------------------------------------------------------
// JobLauncher: Remote Metadata-Update Job
// ---------------------------------------------------------------------------

/// Identifier of a started job run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobRunId(pub String);

impl std::fmt::Display for JobRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Starts the metadata-update job. Fire-and-forget: returns once the run is
/// accepted, never waits for it to finish.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    /// Start `job` in `region` using `credentials`, which are consumed.
    async fn start_job(
        &self,
        credentials: TemporaryCredentials,
        region: &str,
        job: &MetadataUpdateJob,
    ) -> ExternalResult<JobRunId>;
}
