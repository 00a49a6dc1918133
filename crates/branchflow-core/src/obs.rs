//! Structured observability hooks for branchflow invocations.
//!
//! This module provides:
//! - An invocation-scoped tracing span via `invocation_span`
//! - Emission functions for key lifecycle events: receipt, drop, stack
//!   operations, metadata jobs, failures
//! - `envelope_fingerprint` to correlate log lines for one envelope
//!
//! Dropped and failed invocations always log the full envelope so they can be
//! reconciled by hand.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::domain::EnvironmentKey;
use crate::ports::{JobRunId, StackId};

/// SHA-256 hex digest of the envelope's compact JSON form.
pub fn envelope_fingerprint(envelope: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(envelope.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Span covering one invocation, tagged with the envelope fingerprint.
///
/// Attach it to the invocation future with `tracing::Instrument` so every
/// event logged while processing the envelope carries the fingerprint.
pub fn invocation_span(fingerprint: &str) -> tracing::Span {
    tracing::info_span!("branchflow.invocation", fingerprint = %fingerprint)
}

/// Emit event: envelope received (always, before decoding).
pub fn emit_event_received(envelope: &serde_json::Value) {
    info!(event = "event.received", envelope = %envelope);
}

/// Emit event: envelope decoded into a branch event.
pub fn emit_event_decoded(service_name: &str, branch_name: &str, kind: &str) {
    info!(
        event = "event.decoded",
        service_name = %service_name,
        branch_name = %branch_name,
        kind = %kind,
    );
}

/// Emit event: envelope dropped without side effects (warning level).
pub fn emit_event_dropped(reason: &dyn std::fmt::Display, envelope: &serde_json::Value) {
    warn!(event = "event.dropped", reason = %reason, envelope = %envelope);
}

/// Emit event: stack creation accepted by the provisioner.
pub fn emit_stack_creation_started(stack_name: &str, stack_id: &StackId) {
    info!(event = "stack.create_started", stack_name = %stack_name, stack_id = %stack_id);
}

/// Emit event: stack deletion accepted by the provisioner.
pub fn emit_stack_deletion_started(stack_name: &str) {
    info!(event = "stack.delete_started", stack_name = %stack_name);
}

/// Emit event: deletion requested for a stack that does not exist.
pub fn emit_stack_already_absent(stack_name: &str) {
    info!(event = "stack.already_absent", stack_name = %stack_name);
}

/// Emit event: metadata removal skipped for a release branch.
pub fn emit_metadata_retained(branch_name: &str) {
    info!(event = "metadata.retained", branch_name = %branch_name);
}

/// Emit event: metadata-update job started.
pub fn emit_metadata_job_started(project: &str, run_id: &JobRunId, environment: &EnvironmentKey) {
    info!(
        event = "metadata.job_started",
        project = %project,
        run_id = %run_id,
        environment = %environment,
    );
}

/// Emit event: invocation failed on an external call (error level).
pub fn emit_invocation_failed(error: &dyn std::fmt::Display, envelope: &serde_json::Value) {
    tracing::error!(event = "invocation.failed", error = %error, envelope = %envelope);
}
