//! Trigger configuration.
//!
//! All account ids, ARNs and template locations the core needs are carried in
//! a [`TriggerConfig`] handed to the orchestrator at construction. Nothing is
//! read from the process environment after that.

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;

/// Placeholder substituted with the service name in the image repository template.
pub const SERVICE_PLACEHOLDER: &str = "{service}";

/// Account and region hosting the core (pipeline + metadata) resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreAccount {
    pub account_id: String,
    pub region: String,
}

/// Project identity shared by every service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Display name (e.g. "Demo")
    pub name: String,
    /// Short key used in branch names (e.g. "demo" in `feature/demo-login`)
    pub key: String,
    /// Public domain
    pub domain: String,
}

/// Location of the per-branch pipeline template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineTemplate {
    pub url: String,
    pub bucket: Option<String>,
    pub key: Option<String>,
}

/// Cross-account metadata-update job identifiers.
///
/// These are passed through opaquely to pipeline stacks and used for the
/// single role assumption performed on branch deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataUpdateTarget {
    /// Name of the job project in the core account
    pub project_name: String,
    /// Role in the core account allowed to start the job
    pub role_arn: String,
    /// Role the generated pipelines use to invoke the job
    pub pipeline_role_arn: String,
}

/// Full configuration for one deployment of the trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerConfig {
    pub core_account: CoreAccount,
    pub pipeline_template: PipelineTemplate,
    /// Image repository URL; may contain a `{service}` placeholder
    pub service_image_repository_url: String,
    pub project: ProjectConfig,
    pub metadata_update: MetadataUpdateTarget,
}

impl TriggerConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - CORE_ACCOUNT_ID, CORE_ACCOUNT_REGION (required)
    /// - PIPELINE_TEMPLATE_URL (required)
    /// - PIPELINE_TEMPLATE_BUCKET, PIPELINE_TEMPLATE_KEY (optional)
    /// - CI_SERVICE_IMAGE_REPOSITORY_URL (required)
    /// - CI_PROJECT_NAME, CI_PROJECT_KEY (required)
    /// - CI_PROJECT_DOMAIN (optional, default: "")
    /// - CORE_METADATA_UPDATE_PROJECT_NAME (required)
    /// - CORE_METADATA_UPDATE_PROJECT_ROLE_ARN (required)
    /// - CODEBUILD_METADATA_UPDATE_PROJECT_ROLE_ARN (required)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup (environment, map, test fixture).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or(ConfigError::Missing(name))?;
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
            Ok(value)
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            core_account: CoreAccount {
                account_id: required("CORE_ACCOUNT_ID")?,
                region: required("CORE_ACCOUNT_REGION")?,
            },
            pipeline_template: PipelineTemplate {
                url: required("PIPELINE_TEMPLATE_URL")?,
                bucket: optional("PIPELINE_TEMPLATE_BUCKET"),
                key: optional("PIPELINE_TEMPLATE_KEY"),
            },
            service_image_repository_url: required("CI_SERVICE_IMAGE_REPOSITORY_URL")?,
            project: ProjectConfig {
                name: required("CI_PROJECT_NAME")?,
                key: required("CI_PROJECT_KEY")?,
                domain: optional("CI_PROJECT_DOMAIN").unwrap_or_default(),
            },
            metadata_update: MetadataUpdateTarget {
                project_name: required("CORE_METADATA_UPDATE_PROJECT_NAME")?,
                role_arn: required("CORE_METADATA_UPDATE_PROJECT_ROLE_ARN")?,
                pipeline_role_arn: required("CODEBUILD_METADATA_UPDATE_PROJECT_ROLE_ARN")?,
            },
        })
    }

    /// Image repository URL for a service, with `{service}` substituted.
    pub fn service_image_repository_for(&self, service_name: &str) -> String {
        self.service_image_repository_url
            .replace(SERVICE_PLACEHOLDER, service_name)
    }
}
