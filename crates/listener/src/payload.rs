//! Raw Travis CI webhook payload.
//!
//! Permissive by construction: only the fields the decoder reads are declared
//! and serde skips everything else, so Travis adding fields never breaks
//! decoding. Fields absent from a well-formed notification are `Option`s.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Body of a Travis build notification.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub state: String,
    pub pull_request_number: u64,
    pub branch: String,
    pub commit: String,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub repository: WebhookRepository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRepository {
    pub name: String,
    pub owner_name: String,
}

/// Reads only the `type` field, for payloads delivered without an event-type header.
#[derive(Debug, Deserialize)]
pub(crate) struct TypeField {
    #[serde(rename = "type")]
    pub event_type: String,
}
