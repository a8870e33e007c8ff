//! Port traits implemented by infrastructure crates.
//!
//! The orchestrator depends only on these traits. The `travis` crate supplies
//! the HTTP-backed [`ProviderClient`] and the [`LoginExchange`] variants; token
//! persistence belongs to whoever owns the user records and is reached only
//! through [`TokenStore`].
//!
//! All traits are object safe (via `async_trait`) so implementations can be
//! injected as `Arc<dyn Trait>`.

use async_trait::async_trait;

use crate::{
    AccessToken, CredentialError, IdentityToken, IdentityUserId, ProviderError, ProviderName,
    ProviderRepository, ProviderUser, ProviderUserId, PullRequestBuild, RepositorySlug, UserName,
};

/// Typed binding to a remote CI provider's API.
///
/// Every call either returns the success payload or a [`ProviderError`] that
/// tells a logical rejection apart from a transport failure. Implementations
/// never retry.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetches the provider user the token belongs to.
    async fn get_user(&self, token: &AccessToken) -> Result<ProviderUser, ProviderError>;

    /// Triggers an account sync for `user`. Returns once the provider has
    /// accepted the request, not when the sync is over.
    async fn sync(&self, token: &AccessToken, user: &ProviderUserId) -> Result<(), ProviderError>;

    /// Enables monitoring for a repository.
    async fn activate(
        &self,
        token: &AccessToken,
        slug: &RepositorySlug,
    ) -> Result<ProviderRepository, ProviderError>;

    /// Disables monitoring for a repository.
    async fn deactivate(
        &self,
        token: &AccessToken,
        slug: &RepositorySlug,
    ) -> Result<ProviderRepository, ProviderError>;

    /// Lists recent pull-request builds of a repository, newest first.
    async fn pull_request_builds(
        &self,
        token: &AccessToken,
        slug: &RepositorySlug,
    ) -> Result<Vec<PullRequestBuild>, ProviderError>;
}

/// Cache of provider access tokens, one per (local user, provider) pair.
///
/// The store's owner serialises writes; callers only read and write through
/// this trait.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the cached token, if one exists.
    async fn get_token(
        &self,
        user: &UserName,
        provider: &ProviderName,
    ) -> Result<Option<AccessToken>, CredentialError>;

    /// Stores (or replaces) the token.
    async fn put_token(
        &self,
        user: &UserName,
        provider: &ProviderName,
        token: AccessToken,
    ) -> Result<(), CredentialError>;
}

/// Exchanges identity-provider credentials for a CI-provider access token.
#[async_trait]
pub trait LoginExchange: Send + Sync {
    /// Performs the login and returns a fresh token.
    async fn exchange(
        &self,
        identity_user: &IdentityUserId,
        identity_token: &IdentityToken,
    ) -> Result<AccessToken, CredentialError>;
}
