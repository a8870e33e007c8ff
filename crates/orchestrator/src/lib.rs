//! CI monitor orchestration layer.
//!
//! This crate sequences calls between the domain types in [`monitor`] and the
//! infrastructure behind its port traits (CI provider API, login exchange,
//! token store). It contains no transport details of its own.
//!
//! - [`ActivationOrchestrator`] drives the activation protocol: token
//!   resolution, provider user fetch, sync trigger, bounded sync wait,
//!   repository activation. It also offers deactivation and build listing.
//! - [`CredentialResolver`] returns the cached provider token for a user or
//!   performs a login exchange and caches the result.
//!
//! ## Concurrency
//!
//! Each operation occupies its calling task for its full duration, including
//! the poll sleeps. Operations for different (user, repository) pairs share no
//! locks beyond a short in-flight registry update; a second concurrent
//! operation on the same pair is refused.

pub mod activation;
pub mod credentials;

pub use activation::{
    ActivationConfig, ActivationOrchestrator, ActivationReport, DEFAULT_ATTEMPT_LIMIT,
    DEFAULT_POLL_DELAY,
};
pub use credentials::{CredentialResolver, InMemoryTokenStore};
