//! Per-branch pipeline stack lifecycle.
//!
//! [`plan`] decides what should happen to the pipeline stack of a branch;
//! [`PipelineLifecycleController::apply`] carries the decision out through a
//! [`StackProvisioner`].
//!
//! Creation is not idempotent: a second create for the same branch surfaces
//! `ExternalError::AlreadyExists`. Deletion is: a missing stack is success.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::TriggerConfig;
use crate::domain::{BranchEvent, ClassifiedBranch, EventKind, ExternalError, Result};
use crate::obs;
use crate::ports::{Capability, CreateStackInput, OnFailure, StackId, StackProvisioner};

pub const PARAM_CORE_ACCOUNT_ID: &str = "CoreAccountId";
pub const PARAM_CORE_ACCOUNT_REGION: &str = "CoreAccountRegion";
pub const PARAM_SERVICE_NAME: &str = "CIServiceName";
pub const PARAM_SERVICE_IMAGE_REPOSITORY_URL: &str = "CIServiceImageRepositoryURL";
pub const PARAM_REPOSITORY_NAME: &str = "RepositoryName";
pub const PARAM_BRANCH_NAME: &str = "BranchName";
pub const PARAM_BRANCH_NAME_PRETTIFIED: &str = "BranchNamePrettified";
pub const PARAM_METADATA_PROJECT_NAME: &str = "CoreMetadataUpdateProjectName";
pub const PARAM_METADATA_PROJECT_ROLE_ARN: &str = "CoreMetadataUpdateProjectRoleArn";
pub const PARAM_PIPELINE_METADATA_ROLE_ARN: &str = "CodeBuildMetadataUpdateProjectRoleArn";

/// Create or delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StackAction {
    Create,
    Delete,
}

/// Planned operation on one branch's pipeline stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineStackRequest {
    pub stack_name: String,
    pub action: StackAction,
    /// Template parameters; empty for `Delete`.
    pub parameters: BTreeMap<String, String>,
}

/// What the provisioner reported after applying a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status", content = "stack_id")]
pub enum StackOutcome {
    Creating(StackId),
    Deleting,
    AlreadyAbsent,
}

/// `{service_name}-pipeline-{normalized_branch_name}`.
///
/// Create and the later Delete for one branch must derive the same name;
/// nothing else addresses the stack.
pub fn stack_name(service_name: &str, normalized_branch_name: &str) -> String {
    format!("{}-pipeline-{}", service_name, normalized_branch_name)
}

fn create_parameters(
    event: &BranchEvent,
    classification: &ClassifiedBranch,
    config: &TriggerConfig,
) -> BTreeMap<String, String> {
    let metadata = &config.metadata_update;
    [
        (PARAM_CORE_ACCOUNT_ID, config.core_account.account_id.clone()),
        (PARAM_CORE_ACCOUNT_REGION, config.core_account.region.clone()),
        (PARAM_SERVICE_NAME, event.service_name.clone()),
        (
            PARAM_SERVICE_IMAGE_REPOSITORY_URL,
            config.service_image_repository_for(&event.service_name),
        ),
        (PARAM_REPOSITORY_NAME, event.repository_name.clone()),
        (PARAM_BRANCH_NAME, event.branch_name.clone()),
        (
            PARAM_BRANCH_NAME_PRETTIFIED,
            classification.normalized_name.clone(),
        ),
        (PARAM_METADATA_PROJECT_NAME, metadata.project_name.clone()),
        (PARAM_METADATA_PROJECT_ROLE_ARN, metadata.role_arn.clone()),
        (
            PARAM_PIPELINE_METADATA_ROLE_ARN,
            metadata.pipeline_role_arn.clone(),
        ),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

/// Decide the stack operation for a classified branch event.
///
/// Returns `None` for non-Gitflow branches.
pub fn plan(
    event: &BranchEvent,
    classification: &ClassifiedBranch,
    config: &TriggerConfig,
) -> Option<PipelineStackRequest> {
    if !classification.is_gitflow {
        return None;
    }

    let stack_name = stack_name(&event.service_name, &classification.normalized_name);
    let request = match event.kind {
        EventKind::Created => PipelineStackRequest {
            stack_name,
            action: StackAction::Create,
            parameters: create_parameters(event, classification, config),
        },
        EventKind::Deleted => PipelineStackRequest {
            stack_name,
            action: StackAction::Delete,
            parameters: BTreeMap::new(),
        },
    };
    Some(request)
}

/// Applies planned stack requests through a provisioner.
pub struct PipelineLifecycleController {
    config: Arc<TriggerConfig>,
    provisioner: Arc<dyn StackProvisioner>,
}

impl PipelineLifecycleController {
    pub fn new(config: Arc<TriggerConfig>, provisioner: Arc<dyn StackProvisioner>) -> Self {
        Self {
            config,
            provisioner,
        }
    }

    /// Plan against this controller's configuration.
    pub fn plan(
        &self,
        event: &BranchEvent,
        classification: &ClassifiedBranch,
    ) -> Option<PipelineStackRequest> {
        plan(event, classification, &self.config)
    }

    /// Send the request to the provisioner.
    #[instrument(skip(self, request), fields(stack_name = %request.stack_name))]
    pub async fn apply(&self, request: &PipelineStackRequest) -> Result<StackOutcome> {
        match request.action {
            StackAction::Create => {
                let input = CreateStackInput {
                    stack_name: request.stack_name.clone(),
                    template_url: self.config.pipeline_template.url.clone(),
                    parameters: request.parameters.clone(),
                    on_failure: OnFailure::Rollback,
                    capabilities: vec![Capability::NamedIam],
                };
                let stack_id = self.provisioner.create_stack(input).await?;
                obs::emit_stack_creation_started(&request.stack_name, &stack_id);
                Ok(StackOutcome::Creating(stack_id))
            }
            StackAction::Delete => match self.provisioner.delete_stack(&request.stack_name).await {
                Ok(()) => {
                    obs::emit_stack_deletion_started(&request.stack_name);
                    Ok(StackOutcome::Deleting)
                }
                Err(ExternalError::StackNotFound { .. }) => {
                    obs::emit_stack_already_absent(&request.stack_name);
                    Ok(StackOutcome::AlreadyAbsent)
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}
