//! Inbound envelope decoding.
//!
//! The notification source wraps the original change event one level deep:
//!
//! ```json
//! {
//!   "serviceName": "demo",
//!   "originalEvent": {
//!     "detail": {
//!       "event": "referenceCreated",
//!       "repositoryName": "aws-demo-service",
//!       "referenceName": "feature/acme-login",
//!       "referenceType": "branch"
//!     }
//!   }
//! }
//! ```
//!
//! Anything else in the envelope (source, account, region, commit ids) is
//! ignored.

use serde::Deserialize;

use crate::domain::{BranchEvent, DecodeError, EventKind};

/// Only branch references drive pipelines; tags are dropped.
pub const BRANCH_REFERENCE_TYPE: &str = "branch";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    service_name: Option<String>,
    original_event: Option<OriginalEvent>,
}

#[derive(Debug, Deserialize)]
struct OriginalEvent {
    detail: Option<ReferenceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceDetail {
    event: Option<String>,
    repository_name: Option<String>,
    reference_name: Option<String>,
    reference_type: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, DecodeError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(DecodeError::MissingField { field })
}

/// Decode an already parsed envelope into a [`BranchEvent`].
pub fn decode(envelope: &serde_json::Value) -> Result<BranchEvent, DecodeError> {
    let envelope = Envelope::deserialize(envelope)?;

    let service_name = required(envelope.service_name, "serviceName")?;
    let detail = envelope
        .original_event
        .ok_or(DecodeError::MissingField {
            field: "originalEvent",
        })?
        .detail
        .ok_or(DecodeError::MissingField {
            field: "originalEvent.detail",
        })?;

    let event_type = required(detail.event, "originalEvent.detail.event")?;
    let repository_name = required(detail.repository_name, "originalEvent.detail.repositoryName")?;
    let branch_name = required(detail.reference_name, "originalEvent.detail.referenceName")?;
    let reference_type = required(detail.reference_type, "originalEvent.detail.referenceType")?;

    if reference_type != BRANCH_REFERENCE_TYPE {
        return Err(DecodeError::UnsupportedReferenceType { reference_type });
    }

    let kind = EventKind::from_event_type(&event_type)
        .ok_or(DecodeError::UnknownEventType { event_type })?;

    Ok(BranchEvent {
        service_name,
        repository_name,
        branch_name,
        kind,
    })
}

/// Parse raw JSON text and decode it.
pub fn decode_str(raw: &str) -> Result<BranchEvent, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    decode(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event: &str, reference_type: &str) -> serde_json::Value {
        json!({
            "serviceName": "demo",
            "originalEvent": {
                "version": "0",
                "source": "aws.codecommit",
                "detail": {
                    "event": event,
                    "repositoryName": "aws-demo-service",
                    "referenceName": "feature/acme-login",
                    "referenceType": reference_type,
                    "commitId": "5d2a0c1e"
                }
            }
        })
    }

    #[test]
    fn test_decode_created_branch() {
        let event = decode(&envelope("referenceCreated", "branch")).expect("decode");
        assert_eq!(event.service_name, "demo");
        assert_eq!(event.repository_name, "aws-demo-service");
        assert_eq!(event.branch_name, "feature/acme-login");
        assert_eq!(event.kind, EventKind::Created);
    }

    #[test]
    fn test_decode_deleted_branch() {
        let event = decode(&envelope("referenceDeleted", "branch")).expect("decode");
        assert_eq!(event.kind, EventKind::Deleted);
    }

    #[test]
    fn test_tag_reference_is_rejected() {
        let err = decode(&envelope("referenceCreated", "tag")).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnsupportedReferenceType { ref reference_type } if reference_type == "tag"
        ));
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let err = decode(&envelope("referenceUpdated", "branch")).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEventType { .. }));
    }

    #[test]
    fn test_missing_service_name() {
        let mut value = envelope("referenceCreated", "branch");
        value.as_object_mut().unwrap().remove("serviceName");
        let err = decode(&value).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "serviceName" }));
    }

    #[test]
    fn test_missing_original_event() {
        let err = decode(&json!({ "serviceName": "demo" })).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "originalEvent" }));
    }

    #[test]
    fn test_missing_detail_field() {
        let value = json!({
            "serviceName": "demo",
            "originalEvent": {
                "detail": {
                    "event": "referenceCreated",
                    "repositoryName": "aws-demo-service",
                    "referenceType": "branch"
                }
            }
        });
        let err = decode(&value).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField {
                field: "originalEvent.detail.referenceName"
            }
        ));
    }

    #[test]
    fn test_empty_field_counts_as_missing() {
        let mut value = envelope("referenceCreated", "branch");
        value["originalEvent"]["detail"]["repositoryName"] = json!("");
        let err = decode(&value).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { .. }));
    }

    #[test]
    fn test_wrong_field_type_is_malformed() {
        let value = json!({ "serviceName": 42 });
        let err = decode(&value).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_str_rejects_invalid_json() {
        let err = decode_str("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
