//! Webhook decoding.

use monitor::{
    BranchName, BuildEvent, BuildStatus, CommitSha, PullRequestBuild, PullRequestNumber,
    RepositoryName, RepositoryOwner, Timestamp,
};
use serde::de::Error as _;
use thiserror::Error;
use tracing::debug;

use crate::payload::{TypeField, WebhookPayload};

/// Event type of pull-request build notifications.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

#[derive(Debug, Error)]
pub enum WebhookError {
    /// The payload of a recognised event type is not structurally valid.
    #[error("malformed {} webhook payload", event_type.as_deref().unwrap_or("untyped"))]
    PayloadParse {
        /// Event type the payload was decoded as; `None` when it could not be determined.
        event_type: Option<String>,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of decoding one notification.
///
/// `Ignored` is a routing decision, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Build(BuildEvent),
    Ignored { event_type: String },
}

impl DecodeOutcome {
    pub fn into_event(self) -> Option<BuildEvent> {
        match self {
            Self::Build(event) => Some(event),
            Self::Ignored { .. } => None,
        }
    }
}

/// Turns raw notification bodies into [`BuildEvent`]s.
///
/// Stateless; one value can be shared by any number of concurrent callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookDecoder;

impl WebhookDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decodes `raw` as a notification of `declared_event_type`.
    ///
    /// Unrecognised event types are ignored without looking at the body.
    pub fn decode(
        &self,
        raw: &str,
        declared_event_type: &str,
    ) -> Result<DecodeOutcome, WebhookError> {
        match declared_event_type {
            PULL_REQUEST_EVENT => {
                let build = decode_pull_request(raw).map_err(|source| {
                    WebhookError::PayloadParse {
                        event_type: Some(declared_event_type.to_string()),
                        source,
                    }
                })?;
                Ok(DecodeOutcome::Build(BuildEvent::PullRequest(build)))
            }
            other => {
                debug!(event_type = other, "Ignoring webhook event type");
                Ok(DecodeOutcome::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }

    /// Decodes a notification that arrived without an event-type header,
    /// routing on the body's own `type` field.
    pub fn decode_untyped(&self, raw: &str) -> Result<DecodeOutcome, WebhookError> {
        let type_field: TypeField =
            serde_json::from_str(raw).map_err(|source| WebhookError::PayloadParse {
                event_type: None,
                source,
            })?;
        self.decode(raw, &type_field.event_type)
    }
}

fn decode_pull_request(raw: &str) -> Result<PullRequestBuild, serde_json::Error> {
    let payload: WebhookPayload = serde_json::from_str(raw)?;

    Ok(PullRequestBuild::new(
        required(RepositoryOwner::new(payload.repository.owner_name), "repository.owner_name")?,
        required(RepositoryName::new(payload.repository.name), "repository.name")?,
        PullRequestNumber::new(payload.pull_request_number),
        BuildStatus::from_provider(&payload.state),
        required(BranchName::new(payload.branch), "branch")?,
        required(CommitSha::new(payload.commit), "commit")?,
        payload.finished_at.map(Timestamp::from_utc),
    ))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, serde_json::Error> {
    value.ok_or_else(|| serde_json::Error::custom(format!("field `{field}` is empty")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSED: &str = r#"{
        "id": 1234,
        "number": "42",
        "type": "pull_request",
        "state": "passed",
        "status_message": "Passed",
        "pull_request_number": 7,
        "branch": "task-1",
        "commit": "62aae5f70ceee39123ef",
        "finished_at": "2024-03-01T10:15:00Z",
        "repository": {"id": 1, "name": "course", "owner_name": "octocat", "url": null},
        "matrix": [{"id": 1, "state": "passed"}]
    }"#;

    fn build(outcome: DecodeOutcome) -> PullRequestBuild {
        match outcome.into_event() {
            Some(BuildEvent::PullRequest(build)) => build,
            None => panic!("expected a build event"),
        }
    }

    #[test]
    fn passed_pull_request_build_copies_every_field() {
        let build = build(WebhookDecoder::new().decode(PASSED, "pull_request").unwrap());

        assert_eq!(build.repository_owner().as_str(), "octocat");
        assert_eq!(build.repository_name().as_str(), "course");
        assert_eq!(build.pull_request_number().as_u64(), 7);
        assert_eq!(build.status(), BuildStatus::Passed);
        assert_eq!(build.branch().as_str(), "task-1");
        assert_eq!(build.commit_sha().as_str(), "62aae5f70ceee39123ef");
        assert_eq!(
            build.finished_at().map(|t| t.to_string()).as_deref(),
            Some("2024-03-01T10:15:00+00:00")
        );
    }

    #[test]
    fn other_event_types_are_ignored_even_with_garbage_bodies() {
        let outcome = WebhookDecoder::new()
            .decode("{not json at all", "issue_comment")
            .unwrap();

        assert_eq!(
            outcome,
            DecodeOutcome::Ignored {
                event_type: "issue_comment".to_string()
            }
        );
    }

    #[test]
    fn truncated_body_is_a_parse_error() {
        let truncated = &PASSED[..PASSED.len() / 2];
        let err = WebhookDecoder::new()
            .decode(truncated, "pull_request")
            .unwrap_err();

        let WebhookError::PayloadParse { event_type, .. } = &err;
        assert_eq!(event_type.as_deref(), Some("pull_request"));
        assert_eq!(err.to_string(), "malformed pull_request webhook payload");
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let body = r#"{"state": "passed", "pull_request_number": 1, "branch": "b",
                       "repository": {"name": "course", "owner_name": "octocat"}}"#;
        assert!(WebhookDecoder::new().decode(body, "pull_request").is_err());
    }

    #[test]
    fn empty_owner_is_a_parse_error() {
        let body = r#"{"state": "passed", "pull_request_number": 1, "branch": "b", "commit": "c",
                       "repository": {"name": "course", "owner_name": ""}}"#;
        let err = WebhookDecoder::new().decode(body, "pull_request").unwrap_err();
        let WebhookError::PayloadParse { source, .. } = err;
        assert!(source.to_string().contains("repository.owner_name"));
    }

    #[test]
    fn unknown_state_maps_to_unknown_status() {
        let body = PASSED.replace(r#""state": "passed""#, r#""state": "exploded""#);
        let build = build(WebhookDecoder::new().decode(&body, "pull_request").unwrap());
        assert_eq!(build.status(), BuildStatus::Unknown);
    }

    #[test]
    fn null_finish_time_is_none() {
        let running = PASSED
            .replace(r#""state": "passed""#, r#""state": "started""#)
            .replace(r#""finished_at": "2024-03-01T10:15:00Z""#, r#""finished_at": null"#);
        let build = build(WebhookDecoder::new().decode(&running, "pull_request").unwrap());

        assert_eq!(build.status(), BuildStatus::Started);
        assert!(build.finished_at().is_none());
    }

    #[test]
    fn missing_finish_time_is_none() {
        let running = PASSED
            .replace(r#""state": "passed""#, r#""state": "started""#)
            .replace(r#""finished_at": "2024-03-01T10:15:00Z","#, "");
        assert!(!running.contains("finished_at"));
        let build = build(WebhookDecoder::new().decode(&running, "pull_request").unwrap());

        assert_eq!(build.status(), BuildStatus::Started);
        assert!(build.finished_at().is_none());
    }

    #[test]
    fn untyped_payload_routes_on_type_field() {
        let decoder = WebhookDecoder::new();

        let pr = decoder.decode_untyped(PASSED).unwrap();
        assert!(matches!(pr, DecodeOutcome::Build(_)));

        let push = PASSED.replace(r#""type": "pull_request""#, r#""type": "push""#);
        assert_eq!(
            decoder.decode_untyped(&push).unwrap(),
            DecodeOutcome::Ignored {
                event_type: "push".to_string()
            }
        );
    }

    #[test]
    fn untyped_payload_without_type_is_a_parse_error() {
        let err = WebhookDecoder::new().decode_untyped("[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "malformed untyped webhook payload");
    }

    #[test]
    fn decoded_event_serialises_with_kind_tag() {
        let event = WebhookDecoder::new()
            .decode(PASSED, "pull_request")
            .unwrap()
            .into_event()
            .unwrap();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "pull_request");
        assert_eq!(json["status"], "passed");
    }
}
