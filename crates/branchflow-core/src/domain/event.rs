//! Branch lifecycle events.

use serde::{Deserialize, Serialize};

/// Event type string for a newly pushed reference.
pub const REFERENCE_CREATED: &str = "referenceCreated";

/// Event type string for a removed reference.
pub const REFERENCE_DELETED: &str = "referenceDeleted";

/// Whether the branch appeared or disappeared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Deleted,
}

impl EventKind {
    /// Map a source-control event type (`referenceCreated` / `referenceDeleted`).
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            REFERENCE_CREATED => Some(EventKind::Created),
            REFERENCE_DELETED => Some(EventKind::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single branch create/delete notification for one service.
///
/// Built once per invocation by the decoder and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchEvent {
    /// Service the repository belongs to (e.g. "demo").
    pub service_name: String,

    /// Source repository the branch lives in.
    pub repository_name: String,

    /// Raw branch name as pushed (e.g. "feature/acme-login").
    pub branch_name: String,

    /// Created or deleted.
    pub kind: EventKind,
}

impl BranchEvent {
    pub fn new(
        service_name: impl Into<String>,
        repository_name: impl Into<String>,
        branch_name: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            repository_name: repository_name.into(),
            branch_name: branch_name.into(),
            kind,
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == EventKind::Deleted
    }
}
