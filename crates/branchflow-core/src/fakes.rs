//! In-memory fakes for collaborator traits
//!
//! Provides `MemoryStackProvisioner`, `MemoryCredentialBroker`, and
//! `MemoryJobLauncher` that satisfy the trait contracts without any external
//! service. Each records the calls it receives and can be told to fail the
//! next call. `branchflowd` uses them for dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::ExternalError;
use crate::metadata_sync::MetadataUpdateJob;
use crate::ports::*;

// ---------------------------------------------------------------------------
// MemoryStackProvisioner
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProvisionerState {
    stacks: HashMap<String, StackId>,
    create_calls: Vec<CreateStackInput>,
    delete_calls: Vec<String>,
    fail_create: Option<String>,
    fail_delete: Option<String>,
}

/// In-memory provisioner backed by a `HashMap<stack_name, StackId>`.
///
/// Mirrors the provisioner contract: duplicate creates fail with
/// `AlreadyExists`, deletes of unknown stacks fail with `StackNotFound`.
#[derive(Debug)]
pub struct MemoryStackProvisioner {
    account_id: String,
    region: String,
    state: Mutex<ProvisionerState>,
}

impl Default for MemoryStackProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStackProvisioner {
    pub fn new() -> Self {
        Self::in_account("000000000000", "us-east-1")
    }

    /// Provisioner minting stack ids for the given account and region.
    pub fn in_account(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            state: Mutex::new(ProvisionerState::default()),
        }
    }

    /// Whether a stack with this name currently exists.
    pub fn contains(&self, stack_name: &str) -> bool {
        self.state.lock().unwrap().stacks.contains_key(stack_name)
    }

    /// Names of existing stacks, sorted.
    pub fn stack_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().unwrap().stacks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every create call received, in order.
    pub fn create_calls(&self) -> Vec<CreateStackInput> {
        self.state.lock().unwrap().create_calls.clone()
    }

    /// Every delete call received, in order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    /// Make the next `create_stack` fail with `Rejected`.
    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.state.lock().unwrap().fail_create = Some(message.into());
    }

    /// Make the next `delete_stack` fail with `Rejected`.
    pub fn fail_next_delete(&self, message: impl Into<String>) {
        self.state.lock().unwrap().fail_delete = Some(message.into());
    }
}

#[async_trait]
impl StackProvisioner for MemoryStackProvisioner {
    async fn create_stack(&self, input: CreateStackInput) -> ExternalResult<StackId> {
        let mut state = self.state.lock().unwrap();
        state.create_calls.push(input.clone());

        if let Some(message) = state.fail_create.take() {
            return Err(ExternalError::Rejected {
                operation: "create-stack".to_string(),
                message,
            });
        }
        if state.stacks.contains_key(&input.stack_name) {
            return Err(ExternalError::AlreadyExists {
                stack_name: input.stack_name,
            });
        }

        let stack_id = StackId(format!(
            "arn:aws:cloudformation:{}:{}:stack/{}/{}",
            self.region,
            self.account_id,
            input.stack_name,
            Uuid::new_v4()
        ));
        state.stacks.insert(input.stack_name, stack_id.clone());
        Ok(stack_id)
    }

    async fn delete_stack(&self, stack_name: &str) -> ExternalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(stack_name.to_string());

        if let Some(message) = state.fail_delete.take() {
            return Err(ExternalError::Rejected {
                operation: "delete-stack".to_string(),
                message,
            });
        }
        state
            .stacks
            .remove(stack_name)
            .map(|_| ())
            .ok_or_else(|| ExternalError::StackNotFound {
                stack_name: stack_name.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryCredentialBroker
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BrokerState {
    assumed: Vec<(String, String)>,
    fail_next: Option<String>,
}

/// Broker that mints random credentials valid for fifteen minutes.
#[derive(Debug, Default)]
pub struct MemoryCredentialBroker {
    state: Mutex<BrokerState>,
}

impl MemoryCredentialBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(role_arn, session_name)` of every successful assumption.
    pub fn assumed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().assumed.clone()
    }

    /// Make the next `assume_role` fail.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().unwrap().fail_next = Some(message.into());
    }
}

#[async_trait]
impl CredentialBroker for MemoryCredentialBroker {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> ExternalResult<TemporaryCredentials> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_next.take() {
            return Err(ExternalError::AssumeRole {
                role_arn: role_arn.to_string(),
                message,
            });
        }
        state
            .assumed
            .push((role_arn.to_string(), session_name.to_string()));

        let key = Uuid::new_v4().simple().to_string().to_uppercase();
        Ok(TemporaryCredentials {
            access_key_id: format!("ASIA{}", &key[..16]),
            secret_access_key: Uuid::new_v4().to_string(),
            session_token: Uuid::new_v4().to_string(),
            expiration: Utc::now() + Duration::minutes(15),
            session_name: session_name.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryJobLauncher
// ---------------------------------------------------------------------------

/// A job start recorded by [`MemoryJobLauncher`].
#[derive(Debug, Clone)]
pub struct StartedJob {
    pub run_id: JobRunId,
    pub region: String,
    pub job: MetadataUpdateJob,
    /// Session the credentials belonged to
    pub session_name: String,
    /// Access key the job was started with
    pub access_key_id: String,
}

#[derive(Debug, Default)]
struct LauncherState {
    started: Vec<StartedJob>,
    fail_next: Option<String>,
}

/// In-memory launcher that records started jobs.
///
/// Refuses expired credentials, like the real job service would.
#[derive(Debug, Default)]
pub struct MemoryJobLauncher {
    state: Mutex<LauncherState>,
}

impl MemoryJobLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<StartedJob> {
        self.state.lock().unwrap().started.clone()
    }

    /// Make the next `start_job` fail.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().unwrap().fail_next = Some(message.into());
    }
}

#[async_trait]
impl JobLauncher for MemoryJobLauncher {
    async fn start_job(
        &self,
        credentials: TemporaryCredentials,
        region: &str,
        job: &MetadataUpdateJob,
    ) -> ExternalResult<JobRunId> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail_next.take() {
            return Err(ExternalError::StartJob {
                project: job.project_identifier.clone(),
                message,
            });
        }
        if credentials.is_expired_at(Utc::now()) {
            return Err(ExternalError::StartJob {
                project: job.project_identifier.clone(),
                message: "security token expired".to_string(),
            });
        }

        let run_id = JobRunId(format!("{}:{}", job.project_identifier, Uuid::new_v4()));
        state.started.push(StartedJob {
            run_id: run_id.clone(),
            region: region.to_string(),
            job: job.clone(),
            session_name: credentials.session_name,
            access_key_id: credentials.access_key_id,
        });
        Ok(run_id)
    }
}
