//! Branchflow Core Library
//!
//! Turns source-control branch events into per-branch pipeline stack
//! operations and service metadata updates for services that follow the
//! Gitflow branching convention.

pub mod classifier;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod fakes;
pub mod metadata_sync;
pub mod obs;
pub mod orchestrator;
pub mod pipeline;
pub mod ports;
pub mod telemetry;

pub use classifier::{classify, normalize_branch_name, resolve_environment};
pub use config::TriggerConfig;
pub use decoder::{decode, decode_str};
pub use domain::{
    BranchEvent, ClassifiedBranch, ConfigError, DecodeError, EnvironmentKey, EventKind,
    ExternalError, Result, TriggerError,
};
pub use metadata_sync::{MetadataAction, MetadataSyncTrigger, MetadataUpdateJob};
pub use orchestrator::{DispatchedJob, DropReason, InvocationOutcome, Orchestrator};
pub use pipeline::{
    stack_name, PipelineLifecycleController, PipelineStackRequest, StackAction, StackOutcome,
};
pub use ports::{
    CredentialBroker, JobLauncher, JobRunId, StackId, StackProvisioner, TemporaryCredentials,
};
pub use telemetry::init_tracing;

/// Branchflow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
