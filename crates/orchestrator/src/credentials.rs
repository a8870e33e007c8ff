//! Provider access-token resolution.
//!
//! [`CredentialResolver`] hands out a token for a (local user, provider) pair,
//! reusing the cached one when it exists and otherwise performing a login
//! exchange and caching its result before returning.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use monitor::{
    AccessToken, CredentialError, IdentityToken, IdentityUserId, LoginExchange, ProviderName,
    TokenStore, UserName,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Produces provider access tokens, creating them only when none is cached.
#[derive(Clone)]
pub struct CredentialResolver {
    provider: ProviderName,
    store: Arc<dyn TokenStore>,
    login: Arc<dyn LoginExchange>,
}

impl CredentialResolver {
    /// Creates a resolver for `provider` backed by `store` and `login`.
    pub fn new(
        provider: ProviderName,
        store: Arc<dyn TokenStore>,
        login: Arc<dyn LoginExchange>,
    ) -> Self {
        Self {
            provider,
            store,
            login,
        }
    }

    /// Returns the cached token for `user` or logs in and caches a new one.
    ///
    /// `identity_token` is only needed when nothing is cached. The token is
    /// written to the store before it is returned, so a failed write surfaces
    /// as an error even though the login itself succeeded.
    #[instrument(skip(self, identity_token), fields(provider = %self.provider))]
    pub async fn resolve(
        &self,
        user: &UserName,
        identity_user: &IdentityUserId,
        identity_token: Option<&IdentityToken>,
    ) -> Result<AccessToken, CredentialError> {
        if let Some(token) = self.store.get_token(user, &self.provider).await? {
            debug!("Reusing cached provider token");
            return Ok(token);
        }

        let identity_token = identity_token.ok_or(CredentialError::MissingIdentityToken)?;
        info!("No cached provider token; performing login exchange");
        let token = self.login.exchange(identity_user, identity_token).await?;
        self.store
            .put_token(user, &self.provider, token.clone())
            .await?;

        Ok(token)
    }
}

/// Process-local [`TokenStore`].
///
/// Tokens live as long as the store. Used by the CLI, which has no persistent
/// user records, and by tests.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<(UserName, ProviderName), AccessToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached tokens.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get_token(
        &self,
        user: &UserName,
        provider: &ProviderName,
    ) -> Result<Option<AccessToken>, CredentialError> {
        let key = (user.clone(), provider.clone());
        Ok(self.tokens.read().await.get(&key).cloned())
    }

    async fn put_token(
        &self,
        user: &UserName,
        provider: &ProviderName,
        token: AccessToken,
    ) -> Result<(), CredentialError> {
        self.tokens
            .write()
            .await
            .insert((user.clone(), provider.clone()), token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct CountingLogin {
        calls: AtomicU32,
        outcome: Result<&'static str, CredentialError>,
    }

    impl CountingLogin {
        fn returning(token: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                outcome: Ok(token),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                outcome: Err(CredentialError::Login {
                    message: message.to_string(),
                }),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LoginExchange for CountingLogin {
        async fn exchange(
            &self,
            _identity_user: &IdentityUserId,
            _identity_token: &IdentityToken,
        ) -> Result<AccessToken, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Ok(token) => AccessToken::new(*token).ok_or(CredentialError::EmptyToken),
                Err(e) => Err(e.clone()),
            }
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl TokenStore for BrokenStore {
        async fn get_token(
            &self,
            _user: &UserName,
            _provider: &ProviderName,
        ) -> Result<Option<AccessToken>, CredentialError> {
            Err(CredentialError::Store {
                message: "database offline".to_string(),
            })
        }

        async fn put_token(
            &self,
            _user: &UserName,
            _provider: &ProviderName,
            _token: AccessToken,
        ) -> Result<(), CredentialError> {
            unreachable!("get_token always fails first")
        }
    }

    fn user() -> UserName {
        UserName::new("alice").expect("user")
    }

    fn identity() -> (IdentityUserId, IdentityToken) {
        (
            IdentityUserId::new("alice-gh").expect("identity user"),
            IdentityToken::new("gho_identity").expect("identity token"),
        )
    }

    fn travis() -> ProviderName {
        ProviderName::new("travis").expect("provider")
    }

    #[tokio::test]
    async fn first_resolve_logs_in_and_caches_the_token() {
        let store = Arc::new(InMemoryTokenStore::new());
        let login = CountingLogin::returning("travis-token");
        let resolver = CredentialResolver::new(travis(), store.clone(), login.clone());
        let (identity_user, identity_token) = identity();

        let token = resolver
            .resolve(&user(), &identity_user, Some(&identity_token))
            .await
            .expect("token");

        assert_eq!(token.expose(), "travis-token");
        assert_eq!(login.calls(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn second_resolve_reuses_the_cached_token() {
        let store = Arc::new(InMemoryTokenStore::new());
        let login = CountingLogin::returning("travis-token");
        let resolver = CredentialResolver::new(travis(), store, login.clone());
        let (identity_user, identity_token) = identity();

        resolver
            .resolve(&user(), &identity_user, Some(&identity_token))
            .await
            .expect("first");
        let calls_after_first = login.calls();
        resolver
            .resolve(&user(), &identity_user, Some(&identity_token))
            .await
            .expect("second");

        assert_eq!(login.calls() - calls_after_first, 0);
    }

    #[tokio::test]
    async fn pre_existing_token_means_no_login_at_all() {
        let store = Arc::new(InMemoryTokenStore::new());
        store
            .put_token(
                &user(),
                &travis(),
                AccessToken::new("cached").expect("token"),
            )
            .await
            .expect("seed");
        let login = CountingLogin::returning("fresh");
        let resolver = CredentialResolver::new(travis(), store, login.clone());
        let (identity_user, identity_token) = identity();

        for _ in 0..2 {
            let token = resolver
                .resolve(&user(), &identity_user, Some(&identity_token))
                .await
                .expect("token");
            assert_eq!(token.expose(), "cached");
        }
        assert_eq!(login.calls(), 0);
    }

    #[tokio::test]
    async fn tokens_are_scoped_per_provider() {
        let store = Arc::new(InMemoryTokenStore::new());
        store
            .put_token(
                &user(),
                &ProviderName::new("other-ci").expect("provider"),
                AccessToken::new("other").expect("token"),
            )
            .await
            .expect("seed");
        let login = CountingLogin::returning("travis-token");
        let resolver = CredentialResolver::new(travis(), store, login.clone());
        let (identity_user, identity_token) = identity();

        let token = resolver
            .resolve(&user(), &identity_user, Some(&identity_token))
            .await
            .expect("token");

        assert_eq!(token.expose(), "travis-token");
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn login_failure_is_returned_and_nothing_is_cached() {
        let store = Arc::new(InMemoryTokenStore::new());
        let login = CountingLogin::failing("bad credentials");
        let resolver = CredentialResolver::new(travis(), store.clone(), login);
        let (identity_user, identity_token) = identity();

        let err = resolver
            .resolve(&user(), &identity_user, Some(&identity_token))
            .await
            .expect_err("login should fail");

        assert!(matches!(err, CredentialError::Login { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn store_failure_is_returned_without_logging_in() {
        let login = CountingLogin::returning("travis-token");
        let resolver = CredentialResolver::new(travis(), Arc::new(BrokenStore), login.clone());
        let (identity_user, identity_token) = identity();

        let err = resolver
            .resolve(&user(), &identity_user, Some(&identity_token))
            .await
            .expect_err("store should fail");

        assert!(matches!(err, CredentialError::Store { .. }));
        assert_eq!(login.calls(), 0);
    }

    #[tokio::test]
    async fn cached_token_needs_no_identity_token() {
        let store = Arc::new(InMemoryTokenStore::new());
        store
            .put_token(&user(), &travis(), AccessToken::new("cached").expect("token"))
            .await
            .expect("seed");
        let login = CountingLogin::returning("fresh");
        let resolver = CredentialResolver::new(travis(), store, login.clone());
        let (identity_user, _) = identity();

        let token = resolver
            .resolve(&user(), &identity_user, None)
            .await
            .expect("token");

        assert_eq!(token.expose(), "cached");
        assert_eq!(login.calls(), 0);
    }

    #[tokio::test]
    async fn cache_miss_without_identity_token_fails_before_login() {
        let store = Arc::new(InMemoryTokenStore::new());
        let login = CountingLogin::returning("fresh");
        let resolver = CredentialResolver::new(travis(), store.clone(), login.clone());
        let (identity_user, _) = identity();

        let err = resolver
            .resolve(&user(), &identity_user, None)
            .await
            .expect_err("nothing to log in with");

        assert_eq!(err, CredentialError::MissingIdentityToken);
        assert_eq!(login.calls(), 0);
        assert!(store.is_empty().await);
    }
}
