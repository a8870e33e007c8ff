//! Repository activation protocol.
//!
//! [`ActivationOrchestrator::activate`] runs five strictly sequential steps:
//!
//! 1. resolve a provider token through the [`CredentialResolver`];
//! 2. fetch the provider user;
//! 3. trigger an account sync;
//! 4. poll the provider user until it stops syncing (bounded);
//! 5. activate `identity_user/repository`.
//!
//! The provider only accepts repository activation once its account-level
//! sync has settled. The poll in step 4 uses a fixed delay and a hard attempt
//! ceiling: the worst case is `attempt_limit × poll_delay`, followed by
//! [`ActivationError::SyncTimeout`].
//!
//! Any failure ends the call; nothing already committed on the provider side
//! is rolled back. Abandoning the returned future stops the local polling but
//! cannot undo a provider-side activation that is already underway.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use monitor::{
    AccessToken, ActivationError, ActivationId, ActivationRequest, ProviderClient,
    ProviderRepository, ProviderUserId, PullRequestBuild, RepositorySlug, UserName,
};
use tracing::{info, instrument, warn};

use crate::CredentialResolver;

/// Default number of sync polls before giving up.
pub const DEFAULT_ATTEMPT_LIMIT: u32 = 20;

/// Default delay before each sync poll.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(3000);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bounded-poll parameters for the sync wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationConfig {
    attempt_limit: u32,
    poll_delay: Duration,
}

impl ActivationConfig {
    /// Creates a configuration, returning `None` if `attempt_limit` is zero.
    #[must_use]
    pub fn new(attempt_limit: u32, poll_delay: Duration) -> Option<Self> {
        if attempt_limit == 0 {
            None
        } else {
            Some(Self {
                attempt_limit,
                poll_delay,
            })
        }
    }

    /// Maximum number of polls.
    pub fn attempt_limit(&self) -> u32 {
        self.attempt_limit
    }

    /// Delay slept before every poll.
    pub fn poll_delay(&self) -> Duration {
        self.poll_delay
    }

    /// Longest time the sync wait can take, saturating at [`Duration::MAX`].
    pub fn max_wait(&self) -> Duration {
        self.poll_delay.saturating_mul(self.attempt_limit)
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
            poll_delay: DEFAULT_POLL_DELAY,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a successful activation observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Correlation id of the call (also present on its log span).
    pub activation_id: ActivationId,
    /// Provider user whose account was synced.
    pub provider_user: ProviderUserId,
    /// Number of polls performed before the sync was seen as finished.
    pub sync_polls: u32,
    /// Repository as reported by the provider after activation.
    pub repository: ProviderRepository,
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

type InFlightKey = (UserName, RepositorySlug);

/// Claim on a (user, slug) pair, released on drop.
struct InFlightClaim {
    registry: Arc<Mutex<HashSet<InFlightKey>>>,
    key: InFlightKey,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives activation, deactivation, and build listing against one provider.
///
/// Calls for different (user, repository) pairs run independently. A call for
/// a pair that already has an operation in flight is refused with
/// [`ActivationError::AlreadyInProgress`].
pub struct ActivationOrchestrator {
    provider: Arc<dyn ProviderClient>,
    credentials: CredentialResolver,
    config: ActivationConfig,
    in_flight: Arc<Mutex<HashSet<InFlightKey>>>,
}

impl ActivationOrchestrator {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        credentials: CredentialResolver,
        config: ActivationConfig,
    ) -> Self {
        Self {
            provider,
            credentials,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Enables CI monitoring for `request.identity_user/request.repository`.
    ///
    /// Activating an already-active repository is left to the provider: it
    /// succeeds unless the provider answers with an error.
    #[instrument(
        name = "activate",
        skip_all,
        fields(user = %request.user, slug = %request.slug(), activation_id = tracing::field::Empty)
    )]
    pub async fn activate(
        &self,
        request: &ActivationRequest,
    ) -> Result<ActivationReport, ActivationError> {
        let activation_id = ActivationId::new_random();
        tracing::Span::current().record("activation_id", tracing::field::display(activation_id));

        let slug = request.slug();
        let _claim = self.claim(&request.user, &slug)?;

        let result = self.run_activation(activation_id, request, &slug).await;
        match &result {
            Ok(report) => info!(sync_polls = report.sync_polls, "Repository activated"),
            Err(e) => warn!(error = %e, "Repository activation failed"),
        }
        result
    }

    /// Disables CI monitoring for the request's repository. No sync is needed.
    #[instrument(
        name = "deactivate",
        skip_all,
        fields(user = %request.user, slug = %request.slug(), activation_id = tracing::field::Empty)
    )]
    pub async fn deactivate(
        &self,
        request: &ActivationRequest,
    ) -> Result<ProviderRepository, ActivationError> {
        let activation_id = ActivationId::new_random();
        tracing::Span::current().record("activation_id", tracing::field::display(activation_id));

        let slug = request.slug();
        let _claim = self.claim(&request.user, &slug)?;

        let token = self.resolve_token(request).await?;

        info!("Deactivating repository");
        let result = self
            .provider
            .deactivate(&token, &slug)
            .await
            .map_err(|source| ActivationError::RepositoryDeactivationFailed {
                slug: slug.clone(),
                source,
            });
        if let Err(e) = &result {
            warn!(error = %e, "Repository deactivation failed");
        }
        result
    }

    /// Lists the pull-request builds the provider has for the request's repository.
    #[instrument(name = "pull_request_builds", skip_all, fields(user = %request.user, slug = %request.slug()))]
    pub async fn pull_request_builds(
        &self,
        request: &ActivationRequest,
    ) -> Result<Vec<PullRequestBuild>, ActivationError> {
        let slug = request.slug();
        let token = self.resolve_token(request).await?;

        self.provider
            .pull_request_builds(&token, &slug)
            .await
            .map_err(|source| ActivationError::BuildListingFailed { slug, source })
    }

    async fn run_activation(
        &self,
        activation_id: ActivationId,
        request: &ActivationRequest,
        slug: &RepositorySlug,
    ) -> Result<ActivationReport, ActivationError> {
        let token = self.resolve_token(request).await?;

        info!("Fetching provider user");
        let provider_user = self
            .provider
            .get_user(&token)
            .await
            .map_err(|source| ActivationError::ProviderUserFetchFailed { source })?;

        info!(provider_user = %provider_user.id, "Triggering provider user sync");
        self.provider
            .sync(&token, &provider_user.id)
            .await
            .map_err(|source| ActivationError::SyncTriggerFailed {
                provider_user: provider_user.id.clone(),
                source,
            })?;

        info!(
            attempt_limit = self.config.attempt_limit,
            poll_delay_ms = self.config.poll_delay.as_millis() as u64,
            "Waiting for provider synchronisation to finish"
        );
        let sync_polls = self.wait_until_sync_is_over(&token, &provider_user.id).await?;

        info!("Activating repository");
        let repository = self
            .provider
            .activate(&token, slug)
            .await
            .map_err(|source| ActivationError::RepositoryActivationFailed {
                slug: slug.clone(),
                source,
            })?;

        Ok(ActivationReport {
            activation_id,
            provider_user: provider_user.id,
            sync_polls,
            repository,
        })
    }

    /// Polls until the provider user is no longer syncing; returns the number
    /// of polls made.
    async fn wait_until_sync_is_over(
        &self,
        token: &AccessToken,
        provider_user: &ProviderUserId,
    ) -> Result<u32, ActivationError> {
        let delay = self.config.poll_delay;

        for attempt in 1..=self.config.attempt_limit {
            tokio::time::sleep(delay).await;

            let user = self
                .provider
                .get_user(token)
                .await
                .map_err(|source| ActivationError::ProviderUserFetchFailed { source })?;

            if !user.is_syncing {
                return Ok(attempt);
            }

            info!(
                provider_user = %provider_user,
                observed_secs = delay.saturating_mul(attempt).as_secs(),
                "Provider synchronisation has not finished yet"
            );
        }

        Err(ActivationError::SyncTimeout {
            observed: self.config.max_wait(),
        })
    }

    async fn resolve_token(
        &self,
        request: &ActivationRequest,
    ) -> Result<AccessToken, ActivationError> {
        info!("Resolving provider token");
        self.credentials
            .resolve(
                &request.user,
                &request.identity_user,
                request.identity_token.as_ref(),
            )
            .await
            .map_err(|source| ActivationError::TokenRetrievalFailed {
                user: request.user.clone(),
                source,
            })
    }

    fn claim(
        &self,
        user: &UserName,
        slug: &RepositorySlug,
    ) -> Result<InFlightClaim, ActivationError> {
        let key = (user.clone(), slug.clone());
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());

        if !inserted {
            return Err(ActivationError::AlreadyInProgress {
                user: user.clone(),
                slug: slug.clone(),
            });
        }

        Ok(InFlightClaim {
            registry: Arc::clone(&self.in_flight),
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = ActivationConfig::default();

        assert_eq!(config.attempt_limit(), 20);
        assert_eq!(config.poll_delay(), Duration::from_millis(3000));
        assert_eq!(config.max_wait(), Duration::from_secs(60));
    }

    #[test]
    fn zero_attempt_limit_is_rejected() {
        assert!(ActivationConfig::new(0, Duration::from_secs(1)).is_none());
        assert!(ActivationConfig::new(1, Duration::ZERO).is_some());
    }

    #[test]
    fn max_wait_saturates_instead_of_overflowing() {
        let config = ActivationConfig::new(u32::MAX, Duration::from_secs(u64::MAX / 2)).unwrap();
        assert_eq!(config.max_wait(), Duration::MAX);
    }
}
