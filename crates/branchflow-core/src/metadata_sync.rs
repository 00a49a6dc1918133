//! Service metadata synchronization on branch deletion.
//!
//! When a branch goes away its entry in the central service metadata record
//! must go too. The record itself lives in a repository owned by the core
//! account; this module only computes what to remove and starts the remote
//! job that removes it.
//!
//! Release branches are skipped: the staging entry of the last release stays
//! until the next release replaces it.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::classifier::resolve_environment;
use crate::config::TriggerConfig;
use crate::domain::{BranchEvent, ClassifiedBranch, EnvironmentKey, Result};
use crate::obs;
use crate::ports::{CredentialBroker, JobLauncher, JobRunId};

/// Session name used for every metadata role assumption.
pub const METADATA_SESSION_NAME: &str = "cross-account-codebuild-session";

pub const VAR_SERVICE_NAME: &str = "SERVICE_NAME";
pub const VAR_SERVICE_METADATA: &str = "SERVICE_METADATA";
pub const VAR_SERVICE_METADATA_ACTION: &str = "SERVICE_METADATA_ACTION";

/// Operation the remote job applies to the metadata record.
///
/// Creates and updates happen in the per-branch pipelines, never here.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetadataAction {
    Delete,
}

impl MetadataAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataAction::Delete => "DELETE",
        }
    }
}

/// A remote metadata-update job ready to be started.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetadataUpdateJob {
    /// Job project to start in the core account.
    pub project_identifier: String,
    /// Environment overrides handed to the job.
    pub variables: BTreeMap<String, String>,
    pub action: MetadataAction,
    /// Environment whose entry is removed.
    pub environment: EnvironmentKey,
}

/// The part of the service metadata record that addresses one environment.
///
/// The environment key is a dotted path inside the service's entry, so
/// `sandbox.features.feature-login` for service `demo` becomes
/// `{"demo": {"sandbox": {"features": {"feature-login": {}}}}}`.
pub fn metadata_payload(service_name: &str, environment: &EnvironmentKey) -> Value {
    let leaf = environment
        .path_segments()
        .into_iter()
        .rev()
        .fold(Value::Object(Map::new()), |inner, segment| {
            let mut node = Map::new();
            node.insert(segment.to_string(), inner);
            Value::Object(node)
        });

    let mut root = Map::new();
    root.insert(service_name.to_string(), leaf);
    Value::Object(root)
}

/// Pretty-printed JSON, base64 encoded with the standard alphabet.
pub fn encode_payload(payload: &Value) -> String {
    STANDARD.encode(format!("{:#}", payload))
}

/// Compute the metadata removal for a deleted branch.
///
/// Returns `None` for creations, non-Gitflow branches and release branches.
pub fn on_delete(
    event: &BranchEvent,
    classification: &ClassifiedBranch,
    config: &TriggerConfig,
) -> Option<MetadataUpdateJob> {
    if !event.is_deletion() || !classification.is_gitflow || classification.is_release() {
        return None;
    }

    let environment = resolve_environment(&classification.normalized_name, &config.project.key);
    let payload = metadata_payload(&event.service_name, &environment);

    let variables = BTreeMap::from([
        (VAR_SERVICE_NAME.to_string(), event.service_name.clone()),
        (VAR_SERVICE_METADATA.to_string(), encode_payload(&payload)),
        (
            VAR_SERVICE_METADATA_ACTION.to_string(),
            MetadataAction::Delete.as_str().to_string(),
        ),
    ]);

    Some(MetadataUpdateJob {
        project_identifier: config.metadata_update.project_name.clone(),
        variables,
        action: MetadataAction::Delete,
        environment,
    })
}

/// Starts metadata-update jobs under a temporary cross-account session.
pub struct MetadataSyncTrigger {
    config: Arc<TriggerConfig>,
    broker: Arc<dyn CredentialBroker>,
    launcher: Arc<dyn JobLauncher>,
}

impl MetadataSyncTrigger {
    pub fn new(
        config: Arc<TriggerConfig>,
        broker: Arc<dyn CredentialBroker>,
        launcher: Arc<dyn JobLauncher>,
    ) -> Self {
        Self {
            config,
            broker,
            launcher,
        }
    }

    /// Compute the removal against this trigger's configuration.
    pub fn on_delete(
        &self,
        event: &BranchEvent,
        classification: &ClassifiedBranch,
    ) -> Option<MetadataUpdateJob> {
        on_delete(event, classification, &self.config)
    }

    /// Assume the metadata role and start `job`.
    ///
    /// The credential is moved into the launcher and dropped when that one
    /// call returns.
    #[instrument(skip(self, job), fields(project = %job.project_identifier, environment = %job.environment))]
    pub async fn dispatch(&self, job: &MetadataUpdateJob) -> Result<JobRunId> {
        let target = &self.config.metadata_update;
        let credentials = self
            .broker
            .assume_role(&target.role_arn, METADATA_SESSION_NAME)
            .await?;

        let run_id = self
            .launcher
            .start_job(credentials, &self.config.core_account.region, job)
            .await?;

        obs::emit_metadata_job_started(&job.project_identifier, &run_id, &job.environment);
        Ok(run_id)
    }
}
