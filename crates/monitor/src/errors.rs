//! Error taxonomy for the CI monitor domain.
//!
//! [`ProviderError`] and [`CredentialError`] are produced by the port
//! implementations. [`ActivationError`] is the single failure type callers of
//! the orchestrator see; every variant keeps its cause reachable through
//! [`std::error::Error::source`] so the full chain can be reported.
//!
//! No error here is retried by this system. The only repetition is the bounded
//! sync poll, and any error inside it ends the activation.

use std::time::Duration;

use thiserror::Error;

use crate::{ProviderUserId, RepositorySlug, UserName};

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Failure of a single CI-provider API call.
///
/// Separates "the provider said no" from "the provider could not be reached"
/// so callers can react differently to each.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider answered with a logical error body.
    #[error("provider rejected the request (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status of the response.
        status: u16,
        /// Message extracted from the provider's error body.
        message: String,
    },

    /// The call failed below the API level: connection refused, timeout, or a
    /// response whose body could not be decoded.
    #[error("provider unreachable: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },
}

impl ProviderError {
    /// Returns `true` for transport-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

// ---------------------------------------------------------------------------
// Credential errors
// ---------------------------------------------------------------------------

/// Failure to obtain a CI-provider access token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The token store could not be read or written.
    #[error("token store failure: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
    },

    /// Exchanging identity-provider credentials for a provider token failed.
    #[error("login exchange failed: {message}")]
    Login {
        /// Description of the login failure.
        message: String,
    },

    /// The login exchange completed but yielded no usable token.
    #[error("login exchange returned an empty token")]
    EmptyToken,

    /// No token is cached and no identity token was supplied to log in with.
    #[error("no cached token and no identity token to log in with")]
    MissingIdentityToken,
}

// ---------------------------------------------------------------------------
// Activation errors
// ---------------------------------------------------------------------------

/// Failure of an orchestrator operation.
///
/// Every failure aborts the operation. Nothing is rolled back: a repository
/// activation that fails after a successful sync leaves the account synced.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// No access token could be obtained for the user.
    #[error("could not retrieve a CI provider token for {user}")]
    TokenRetrievalFailed {
        /// Local user the token was requested for.
        user: UserName,
        #[source]
        source: CredentialError,
    },

    /// Fetching the provider's view of the user failed, either before the
    /// sync was triggered or while polling for its completion.
    #[error("could not fetch the CI provider user")]
    ProviderUserFetchFailed {
        #[source]
        source: ProviderError,
    },

    /// The provider refused to start an account sync.
    #[error("sync for provider user {provider_user} has not started")]
    SyncTriggerFailed {
        /// Provider user whose sync was requested.
        provider_user: ProviderUserId,
        #[source]
        source: ProviderError,
    },

    /// The account sync did not settle within the attempt limit.
    #[error("provider synchronisation has not finished after {} seconds", observed.as_secs())]
    SyncTimeout {
        /// Total time spent waiting (attempt limit × poll delay).
        observed: Duration,
    },

    /// The provider refused to activate the repository.
    #[error("activation of repository {slug} failed")]
    RepositoryActivationFailed {
        /// Repository that was being activated.
        slug: RepositorySlug,
        #[source]
        source: ProviderError,
    },

    /// The provider refused to deactivate the repository.
    #[error("deactivation of repository {slug} failed")]
    RepositoryDeactivationFailed {
        /// Repository that was being deactivated.
        slug: RepositorySlug,
        #[source]
        source: ProviderError,
    },

    /// Listing the repository's pull-request builds failed.
    #[error("could not list builds of repository {slug}")]
    BuildListingFailed {
        /// Repository whose builds were requested.
        slug: RepositorySlug,
        #[source]
        source: ProviderError,
    },

    /// Another call is already operating on the same repository for the same user.
    #[error("an operation on {slug} for {user} is already in progress")]
    AlreadyInProgress {
        /// Local user of the in-flight activation.
        user: UserName,
        /// Repository of the in-flight activation.
        slug: RepositorySlug,
    },
}

impl ActivationError {
    /// Returns the provider error behind this failure, if there is one.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::ProviderUserFetchFailed { source }
            | Self::SyncTriggerFailed { source, .. }
            | Self::RepositoryActivationFailed { source, .. }
            | Self::RepositoryDeactivationFailed { source, .. }
            | Self::BuildListingFailed { source, .. } => Some(source),
            Self::TokenRetrievalFailed { .. }
            | Self::SyncTimeout { .. }
            | Self::AlreadyInProgress { .. } => None,
        }
    }
}
