//! Travis CI API v3 client.

use std::sync::Arc;

use async_trait::async_trait;
use monitor::{
    AccessToken, ProviderClient, ProviderError, ProviderRepository, ProviderUser, ProviderUserId,
    PullRequestBuild, RepositorySlug,
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::types::{TravisBuilds, TravisErrorBody, TravisRepository, TravisUser};

/// Public Travis CI API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.travis-ci.com";

/// Pinned API version, sent on every request.
pub const API_VERSION: &str = "3";

/// Builds requested per page when listing.
const BUILDS_PAGE_SIZE: u32 = 25;

/// Default ceiling on build listing pages.
pub const DEFAULT_MAX_BUILD_PAGES: u32 = 5;

/// Travis implementation of [`ProviderClient`].
///
/// Stateless apart from its configuration: the access token is passed to
/// every call, so one client serves all users.
#[derive(Clone)]
pub struct TravisClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    user_agent: String,
    max_build_pages: u32,
}

impl TravisClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: concat!("ci-monitor/", env!("CARGO_PKG_VERSION")).to_string(),
            max_build_pages: DEFAULT_MAX_BUILD_PAGES,
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Caps how many pages [`ProviderClient::pull_request_builds`] follows (at least one).
    #[must_use]
    pub fn with_max_build_pages(mut self, pages: u32) -> Self {
        self.max_build_pages = pages.max(1);
        self
    }

    fn request(&self, method: HttpMethod, path: &str, token: &AccessToken) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .header("Travis-API-Version", API_VERSION)
            .header("Authorization", format!("token {}", token.expose()))
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "application/json")
    }

    async fn call<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, ProviderError> {
        let method = request.method;
        let url = request.url.clone();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ProviderError::Transport {
                message: e.to_string(),
            })?;

        debug!(method = method.as_str(), %url, status = response.status, "Travis API call");
        decode_response(&response)
    }
}

/// Splits a response into payload, provider rejection, or transport failure.
fn decode_response<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ProviderError> {
    let error_body = serde_json::from_slice::<TravisErrorBody>(&response.body).ok();

    if !response.is_success() {
        return Err(match error_body {
            Some(body) if body.error_message.is_some() || body.is_error() => {
                ProviderError::Rejected {
                    status: response.status,
                    message: body.message(),
                }
            }
            _ => ProviderError::Transport {
                message: format!(
                    "HTTP {} with unreadable body: {}",
                    response.status,
                    truncate(&response.body_text(), 200)
                ),
            },
        });
    }

    if let Some(body) = error_body.filter(TravisErrorBody::is_error) {
        return Err(ProviderError::Rejected {
            status: response.status,
            message: body.message(),
        });
    }

    serde_json::from_slice(&response.body).map_err(|e| ProviderError::Transport {
        message: format!("undecodable response body: {e}"),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// API v3 addresses repositories by slug with an encoded slash.
fn encode_slug(slug: &RepositorySlug) -> String {
    slug.as_str().replace('/', "%2F")
}

#[async_trait]
impl ProviderClient for TravisClient {
    #[instrument(skip_all)]
    async fn get_user(&self, token: &AccessToken) -> Result<ProviderUser, ProviderError> {
        let user: TravisUser = self.call(self.request(HttpMethod::Get, "/user", token)).await?;
        user.into_provider_user().ok_or_else(|| ProviderError::Transport {
            message: "user response carried an empty id".to_string(),
        })
    }

    #[instrument(skip_all, fields(provider_user = %user))]
    async fn sync(&self, token: &AccessToken, user: &ProviderUserId) -> Result<(), ProviderError> {
        let path = format!("/user/{}/sync", user.as_str());
        let _: serde_json::Value = self.call(self.request(HttpMethod::Post, &path, token)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(slug = %slug))]
    async fn activate(
        &self,
        token: &AccessToken,
        slug: &RepositorySlug,
    ) -> Result<ProviderRepository, ProviderError> {
        let path = format!("/repo/{}/activate", encode_slug(slug));
        let repository: TravisRepository =
            self.call(self.request(HttpMethod::Post, &path, token)).await?;
        Ok(repository.into_provider_repository(slug))
    }

    #[instrument(skip_all, fields(slug = %slug))]
    async fn deactivate(
        &self,
        token: &AccessToken,
        slug: &RepositorySlug,
    ) -> Result<ProviderRepository, ProviderError> {
        let path = format!("/repo/{}/deactivate", encode_slug(slug));
        let repository: TravisRepository =
            self.call(self.request(HttpMethod::Post, &path, token)).await?;
        Ok(repository.into_provider_repository(slug))
    }

    #[instrument(skip_all, fields(slug = %slug))]
    async fn pull_request_builds(
        &self,
        token: &AccessToken,
        slug: &RepositorySlug,
    ) -> Result<Vec<PullRequestBuild>, ProviderError> {
        let mut path = format!(
            "/repo/{}/builds?event_type=pull_request&limit={}",
            encode_slug(slug),
            BUILDS_PAGE_SIZE
        );
        let mut builds = Vec::new();

        for page in 1..=self.max_build_pages {
            let response: TravisBuilds =
                self.call(self.request(HttpMethod::Get, &path, token)).await?;

            let fetched = response.builds.len();
            builds.extend(
                response
                    .builds
                    .into_iter()
                    .filter_map(|build| {
                        let id = build.id;
                        let converted = build.into_pull_request_build();
                        if converted.is_none() {
                            debug!(build_id = id, "Skipping build without pull request details");
                        }
                        converted
                    }),
            );
            debug!(page, fetched, "Fetched build page");

            match response.pagination.and_then(|p| p.next) {
                Some(next) => path = next.href,
                None => break,
            }
        }

        Ok(builds)
    }
}
