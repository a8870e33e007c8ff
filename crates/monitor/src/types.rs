//! Shared value types exchanged between the orchestrator and provider adapters.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types group
//! several values and carry meaning of their own (e.g. whether the provider is
//! still synchronising an account).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    IdentityToken, IdentityUserId, ProviderUserId, RepositoryName, RepositorySlug, UserName,
};

// ---------------------------------------------------------------------------
// Activation input
// ---------------------------------------------------------------------------

/// Input of one activation (or deactivation) call.
///
/// Created per call and never persisted. The repository activated on the
/// provider is `identity_user/repository`.
#[derive(Debug, Clone)]
pub struct ActivationRequest {
    /// Local user on whose behalf the provider is driven.
    pub user: UserName,
    /// Repository name, without owner.
    pub repository: RepositoryName,
    /// Login of the user on the identity provider; also the repository owner.
    pub identity_user: IdentityUserId,
    /// Identity-provider token, exchanged for a CI-provider token when no
    /// cached token exists. May be omitted when a token is known to be cached.
    pub identity_token: Option<IdentityToken>,
}

impl ActivationRequest {
    /// Returns the `owner/name` slug this request targets.
    pub fn slug(&self) -> RepositorySlug {
        RepositorySlug::from_parts(&self.identity_user, &self.repository)
    }
}

// ---------------------------------------------------------------------------
// Provider-side records
// ---------------------------------------------------------------------------

/// The CI provider's view of the authenticated user.
///
/// `(id, is_syncing)` is the account sync state polled during activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    /// Provider-assigned user id.
    pub id: ProviderUserId,
    /// Login on the provider (mirrors the identity-provider login).
    pub login: String,
    /// Display name, possibly empty.
    pub name: String,
    /// `true` while the provider is refreshing its view of the user's repositories.
    pub is_syncing: bool,
    /// Numeric id of the same user on the identity provider, when reported.
    pub identity_id: Option<u64>,
}

/// A repository as reported back by the provider after (de)activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRepository {
    /// Provider-assigned repository id.
    pub id: u64,
    /// Repository slug, `owner/name`.
    pub slug: RepositorySlug,
    /// Whether monitoring is enabled for the repository.
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
