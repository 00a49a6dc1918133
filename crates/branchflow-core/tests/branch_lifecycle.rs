//! End-to-end branch lifecycle scenarios through the orchestrator.
//!
//! Each test feeds complete envelopes through `Orchestrator::handle` against
//! the in-memory collaborators and checks the requests that come out.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use branchflow_core::fakes::{MemoryCredentialBroker, MemoryJobLauncher, MemoryStackProvisioner};
use branchflow_core::metadata_sync::{
    METADATA_SESSION_NAME, VAR_SERVICE_METADATA, VAR_SERVICE_METADATA_ACTION, VAR_SERVICE_NAME,
};
use branchflow_core::{
    classify, DropReason, ExternalError, InvocationOutcome, MetadataAction, Orchestrator,
    StackAction, StackOutcome, TriggerConfig, TriggerError,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config() -> TriggerConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("CORE_ACCOUNT_ID", "111111111111"),
        ("CORE_ACCOUNT_REGION", "eu-west-1"),
        (
            "PIPELINE_TEMPLATE_URL",
            "https://resources.s3.amazonaws.com/service-pipeline.yaml",
        ),
        ("PIPELINE_TEMPLATE_BUCKET", "resources"),
        ("PIPELINE_TEMPLATE_KEY", "service-pipeline.yaml"),
        (
            "CI_SERVICE_IMAGE_REPOSITORY_URL",
            "222222222222.dkr.ecr.eu-west-1.amazonaws.com/services",
        ),
        ("CI_PROJECT_NAME", "Acme"),
        ("CI_PROJECT_KEY", "acme"),
        ("CI_PROJECT_DOMAIN", "acme.dev"),
        (
            "CORE_METADATA_UPDATE_PROJECT_NAME",
            "service-metadata-update-project",
        ),
        (
            "CORE_METADATA_UPDATE_PROJECT_ROLE_ARN",
            "arn:aws:iam::111111111111:role/service-metadata-update-project-role",
        ),
        (
            "CODEBUILD_METADATA_UPDATE_PROJECT_ROLE_ARN",
            "arn:aws:iam::222222222222:role/codebuild-metadata-update-role",
        ),
    ]);
    TriggerConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).expect("config")
}

struct World {
    orchestrator: Orchestrator,
    provisioner: Arc<MemoryStackProvisioner>,
    broker: Arc<MemoryCredentialBroker>,
    launcher: Arc<MemoryJobLauncher>,
}

fn world() -> World {
    let provisioner = Arc::new(MemoryStackProvisioner::in_account("111111111111", "eu-west-1"));
    let broker = Arc::new(MemoryCredentialBroker::new());
    let launcher = Arc::new(MemoryJobLauncher::new());
    let orchestrator = Orchestrator::new(
        config(),
        provisioner.clone(),
        broker.clone(),
        launcher.clone(),
    );
    World {
        orchestrator,
        provisioner,
        broker,
        launcher,
    }
}

fn envelope(branch: &str, event: &str, reference_type: &str) -> Value {
    json!({
        "serviceName": "demo",
        "originalEvent": {
            "version": "0",
            "detail-type": "CodeCommit Repository State Change",
            "source": "aws.codecommit",
            "account": "222222222222",
            "region": "eu-west-1",
            "detail": {
                "event": event,
                "repositoryName": "aws-demo-service",
                "referenceName": branch,
                "referenceType": reference_type
            }
        }
    })
}

fn created(branch: &str) -> Value {
    envelope(branch, "referenceCreated", "branch")
}

fn deleted(branch: &str) -> Value {
    envelope(branch, "referenceDeleted", "branch")
}

fn decoded_payload(encoded: &str) -> Value {
    let bytes = STANDARD.decode(encoded).expect("base64");
    serde_json::from_slice(&bytes).expect("payload json")
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn feature_branch_creation_requests_one_stack_and_no_metadata_job() {
    let w = world();

    let outcome = w
        .orchestrator
        .handle(&created("feature/acme-login"))
        .await
        .expect("handle");

    let stack = outcome.stack_request().expect("stack request");
    assert_eq!(stack.action, StackAction::Create);
    assert_eq!(stack.stack_name, "demo-pipeline-feature-acme-login");
    assert!(outcome.metadata_job().is_none());

    assert_eq!(w.provisioner.create_calls().len(), 1);
    assert!(w.provisioner.contains("demo-pipeline-feature-acme-login"));
    assert!(w.broker.assumed().is_empty());
    assert!(w.launcher.started().is_empty());
}

#[tokio::test]
async fn creation_parameters_reach_the_provisioner() {
    let w = world();

    w.orchestrator
        .handle(&created("release/2.1.0"))
        .await
        .expect("handle");

    let calls = w.provisioner.create_calls();
    let call = &calls[0];
    assert_eq!(call.stack_name, "demo-pipeline-release-2-1-0");
    assert_eq!(
        call.template_url,
        "https://resources.s3.amazonaws.com/service-pipeline.yaml"
    );
    assert_eq!(call.parameters["BranchName"], "release/2.1.0");
    assert_eq!(call.parameters["BranchNamePrettified"], "release-2-1-0");
    assert_eq!(call.parameters["CIServiceName"], "demo");
    assert_eq!(call.parameters["RepositoryName"], "aws-demo-service");
}

#[tokio::test]
async fn duplicate_creation_surfaces_already_exists() {
    let w = world();

    w.orchestrator
        .handle(&created("develop"))
        .await
        .expect("first create");
    let err = w
        .orchestrator
        .handle(&created("develop"))
        .await
        .unwrap_err();

    match err {
        TriggerError::External(ExternalError::AlreadyExists { stack_name }) => {
            assert_eq!(stack_name, "demo-pipeline-develop");
        }
        other => panic!("expected AlreadyExists, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn feature_branch_deletion_removes_stack_and_metadata() {
    let w = world();
    w.orchestrator
        .handle(&created("feature/acme-login"))
        .await
        .expect("create");

    let outcome = w
        .orchestrator
        .handle(&deleted("feature/acme-login"))
        .await
        .expect("delete");

    let stack = outcome.stack_request().expect("stack request");
    assert_eq!(stack.action, StackAction::Delete);
    assert_eq!(stack.stack_name, "demo-pipeline-feature-acme-login");
    assert!(!w.provisioner.contains("demo-pipeline-feature-acme-login"));

    let job = outcome.metadata_job().expect("metadata job");
    assert_eq!(job.action, MetadataAction::Delete);
    // Project-key rewrite: feature-acme-login collapses to feature-login.
    assert_eq!(job.environment.to_string(), "sandbox.features.feature-login");
    assert_eq!(job.variables[VAR_SERVICE_NAME], "demo");
    assert_eq!(job.variables[VAR_SERVICE_METADATA_ACTION], "DELETE");
    assert_eq!(
        decoded_payload(&job.variables[VAR_SERVICE_METADATA]),
        json!({ "demo": { "sandbox": { "features": { "feature-login": {} } } } })
    );

    let started = w.launcher.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].region, "eu-west-1");
    assert_eq!(started[0].session_name, METADATA_SESSION_NAME);
    assert_eq!(
        w.broker.assumed(),
        vec![(
            "arn:aws:iam::111111111111:role/service-metadata-update-project-role".to_string(),
            METADATA_SESSION_NAME.to_string()
        )]
    );
}

#[tokio::test]
async fn release_branch_deletion_keeps_metadata() {
    let w = world();

    let outcome = w
        .orchestrator
        .handle(&deleted("release/3.0.0"))
        .await
        .expect("delete");

    let stack = outcome.stack_request().expect("stack request");
    assert_eq!(stack.action, StackAction::Delete);
    assert_eq!(stack.stack_name, "demo-pipeline-release-3-0-0");
    assert!(outcome.metadata_job().is_none());
    assert!(w.broker.assumed().is_empty());
    assert!(w.launcher.started().is_empty());
}

#[tokio::test]
async fn duplicate_deletion_is_absorbed() {
    let w = world();
    w.orchestrator
        .handle(&created("feature/checkout"))
        .await
        .expect("create");

    let first = w
        .orchestrator
        .handle(&deleted("feature/checkout"))
        .await
        .expect("first delete");
    let second = w
        .orchestrator
        .handle(&deleted("feature/checkout"))
        .await
        .expect("second delete");

    assert_eq!(
        first.stack_request().map(|s| s.stack_name.clone()),
        second.stack_request().map(|s| s.stack_name.clone())
    );
    match (&first, &second) {
        (
            InvocationOutcome::Reconciled {
                stack_outcome: a, ..
            },
            InvocationOutcome::Reconciled {
                stack_outcome: b, ..
            },
        ) => {
            assert_eq!(*a, StackOutcome::Deleting);
            assert_eq!(*b, StackOutcome::AlreadyAbsent);
        }
        other => panic!("expected two reconciled outcomes, got {:?}", other),
    }
    assert_eq!(w.launcher.started().len(), 2);
}

#[tokio::test]
async fn metadata_job_failure_fails_the_invocation() {
    let w = world();
    w.launcher.fail_next("project not found");

    let err = w
        .orchestrator
        .handle(&deleted("develop"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TriggerError::External(ExternalError::StartJob { .. })
    ));
}

#[tokio::test]
async fn assume_role_failure_fails_the_invocation() {
    let w = world();
    w.broker.fail_next("access denied");

    let err = w
        .orchestrator
        .handle(&deleted("feature/x"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TriggerError::External(ExternalError::AssumeRole { .. })
    ));
    assert!(w.launcher.started().is_empty());
}

// ---------------------------------------------------------------------------
// Dropped events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tag_reference_is_dropped_without_requests() {
    let w = world();

    let outcome = w
        .orchestrator
        .handle(&envelope("v1.0.0", "referenceCreated", "tag"))
        .await
        .expect("handle");

    assert!(matches!(
        outcome,
        InvocationOutcome::Dropped(DropReason::Undecodable { .. })
    ));
    assert!(w.provisioner.create_calls().is_empty());
    assert!(w.provisioner.delete_calls().is_empty());
}

#[tokio::test]
async fn non_gitflow_branches_never_reach_collaborators() {
    let w = world();

    for branch in ["hotfix/urgent", "bugfix/login", "Feature/x", "chore-main"] {
        for event in [created(branch), deleted(branch)] {
            let outcome = w.orchestrator.handle(&event).await.expect("handle");
            assert!(
                matches!(
                    outcome,
                    InvocationOutcome::Dropped(DropReason::NotGitflow { .. })
                ),
                "{} should be dropped",
                branch
            );
        }
        assert!(!classify(branch, "acme").is_gitflow);
    }

    assert!(w.provisioner.create_calls().is_empty());
    assert!(w.provisioner.delete_calls().is_empty());
    assert!(w.launcher.started().is_empty());
}

#[tokio::test]
async fn incomplete_envelope_is_dropped() {
    let w = world();

    let outcome = w
        .orchestrator
        .handle(&json!({ "serviceName": "demo", "originalEvent": {} }))
        .await
        .expect("handle");

    assert!(outcome.is_dropped());
}
