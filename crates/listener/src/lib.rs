//! CI monitor webhook ingestion.
//!
//! Decodes the JSON body of a Travis CI build notification into a
//! [`monitor::BuildEvent`]. The HTTP endpoint that receives notifications is
//! owned elsewhere; it hands `(body, event type header)` to
//! [`WebhookDecoder::decode`] and passes the resulting event on to persistence.
//!
//! ## Architectural Layer
//!
//! **Infrastructure, pure.** No I/O and no shared state: the decoder is a
//! function of its input.
//!
//! ## Routing
//!
//! | Event type | Outcome |
//! |------------|---------|
//! | `pull_request` | [`DecodeOutcome::Build`], or [`WebhookError::PayloadParse`] if the body is malformed |
//! | anything else | [`DecodeOutcome::Ignored`], body not inspected |

pub mod decoder;
pub mod payload;

pub use decoder::{DecodeOutcome, WebhookDecoder, WebhookError, PULL_REQUEST_EVENT};
pub use payload::{WebhookPayload, WebhookRepository};
