//! Domain models for branchflow.
//!
//! Canonical definitions for the core entities:
//! - `BranchEvent`: One decoded branch create/delete notification
//! - `ClassifiedBranch`: Gitflow classification of a branch name
//! - `EnvironmentKey`: Logical deployment target derived from a branch

pub mod environment;
pub mod error;
pub mod event;

pub use environment::{ClassifiedBranch, EnvironmentKey};
pub use error::{ConfigError, DecodeError, ExternalError, Result, TriggerError};
pub use event::{BranchEvent, EventKind};
