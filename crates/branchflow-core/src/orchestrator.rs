//! Invocation entry point.
//!
//! One [`Orchestrator::handle`] call processes one envelope to completion:
//! decode → classify → stack operation → (on deletion) metadata job.
//!
//! Undecodable envelopes and non-Gitflow branches are dropped with a log line
//! and reported as [`InvocationOutcome::Dropped`]. External call failures are
//! logged with the envelope and returned to the host, which owns retries.

use std::sync::Arc;

use serde::Serialize;
use tracing::{instrument, Instrument};

use crate::classifier::classify;
use crate::config::TriggerConfig;
use crate::decoder::decode;
use crate::domain::{BranchEvent, EnvironmentKey, Result};
use crate::metadata_sync::{MetadataSyncTrigger, MetadataUpdateJob};
use crate::obs;
use crate::pipeline::{PipelineLifecycleController, PipelineStackRequest, StackOutcome};
use crate::ports::{CredentialBroker, JobLauncher, JobRunId, StackProvisioner};

/// Why an envelope produced no side effects.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum DropReason {
    /// The envelope could not be decoded (missing fields, tag reference, ...).
    Undecodable { detail: String },
    /// The branch does not follow the Gitflow naming convention.
    NotGitflow { branch_name: String },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::Undecodable { detail } => write!(f, "undecodable envelope: {}", detail),
            DropReason::NotGitflow { branch_name } => {
                write!(f, "branch {} is not a valid Gitflow branch", branch_name)
            }
        }
    }
}

/// A metadata job together with the run it started.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DispatchedJob {
    pub job: MetadataUpdateJob,
    pub run_id: JobRunId,
}

/// Result of one invocation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum InvocationOutcome {
    Dropped(DropReason),
    Reconciled {
        event: BranchEvent,
        environment: Option<EnvironmentKey>,
        stack: PipelineStackRequest,
        stack_outcome: StackOutcome,
        metadata_job: Option<DispatchedJob>,
    },
}

impl InvocationOutcome {
    pub fn stack_request(&self) -> Option<&PipelineStackRequest> {
        match self {
            InvocationOutcome::Reconciled { stack, .. } => Some(stack),
            InvocationOutcome::Dropped(_) => None,
        }
    }

    pub fn metadata_job(&self) -> Option<&MetadataUpdateJob> {
        match self {
            InvocationOutcome::Reconciled { metadata_job, .. } => {
                metadata_job.as_ref().map(|d| &d.job)
            }
            InvocationOutcome::Dropped(_) => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, InvocationOutcome::Dropped(_))
    }
}

/// Sequences the branch event components for a single envelope.
pub struct Orchestrator {
    config: Arc<TriggerConfig>,
    pipelines: PipelineLifecycleController,
    metadata: MetadataSyncTrigger,
}

impl Orchestrator {
    pub fn new(
        config: TriggerConfig,
        provisioner: Arc<dyn StackProvisioner>,
        broker: Arc<dyn CredentialBroker>,
        launcher: Arc<dyn JobLauncher>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            pipelines: PipelineLifecycleController::new(config.clone(), provisioner),
            metadata: MetadataSyncTrigger::new(config.clone(), broker, launcher),
            config,
        }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Process one envelope to completion.
    pub async fn handle(&self, envelope: &serde_json::Value) -> Result<InvocationOutcome> {
        let span = obs::invocation_span(&obs::envelope_fingerprint(envelope));
        self.process(envelope).instrument(span).await
    }

    async fn process(&self, envelope: &serde_json::Value) -> Result<InvocationOutcome> {
        obs::emit_event_received(envelope);

        let event = match decode(envelope) {
            Ok(event) => event,
            Err(e) => {
                let reason = DropReason::Undecodable {
                    detail: e.to_string(),
                };
                obs::emit_event_dropped(&reason, envelope);
                return Ok(InvocationOutcome::Dropped(reason));
            }
        };
        obs::emit_event_decoded(&event.service_name, &event.branch_name, event.kind.as_str());

        match self.reconcile(event).await {
            Ok(outcome) => {
                if let InvocationOutcome::Dropped(reason) = &outcome {
                    obs::emit_event_dropped(reason, envelope);
                }
                Ok(outcome)
            }
            Err(e) => {
                obs::emit_invocation_failed(&e, envelope);
                Err(e)
            }
        }
    }

    /// Parse raw JSON text and process it.
    ///
    /// Text that is not JSON at all is dropped like any other undecodable
    /// envelope.
    pub async fn handle_str(&self, raw: &str) -> Result<InvocationOutcome> {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(envelope) => self.handle(&envelope).await,
            Err(e) => {
                let reason = DropReason::Undecodable {
                    detail: e.to_string(),
                };
                obs::emit_event_dropped(&reason, &serde_json::Value::String(raw.to_string()));
                Ok(InvocationOutcome::Dropped(reason))
            }
        }
    }

    #[instrument(skip(self, event), fields(service = %event.service_name, branch = %event.branch_name, kind = %event.kind))]
    async fn reconcile(&self, event: BranchEvent) -> Result<InvocationOutcome> {
        let classification = classify(&event.branch_name, &self.config.project.key);

        let Some(stack) = self.pipelines.plan(&event, &classification) else {
            return Ok(InvocationOutcome::Dropped(DropReason::NotGitflow {
                branch_name: event.branch_name,
            }));
        };

        let stack_outcome = self.pipelines.apply(&stack).await?;

        let metadata_job = match self.metadata.on_delete(&event, &classification) {
            Some(job) => {
                let run_id = self.metadata.dispatch(&job).await?;
                Some(DispatchedJob { job, run_id })
            }
            None => {
                if event.is_deletion() {
                    obs::emit_metadata_retained(&event.branch_name);
                }
                None
            }
        };

        Ok(InvocationOutcome::Reconciled {
            environment: classification.target_environment,
            event,
            stack,
            stack_outcome,
            metadata_job,
        })
    }
}
