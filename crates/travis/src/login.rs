//! Login exchanges that trade GitHub credentials for a Travis token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use monitor::{AccessToken, CredentialError, IdentityToken, IdentityUserId, LoginExchange};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::http::{HttpMethod, HttpRequest, HttpTransport};

/// Default time allowed for each CLI invocation.
pub const DEFAULT_CLI_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// CLI exchange
// ---------------------------------------------------------------------------

/// Logs in through the `travis` command line client.
///
/// Runs `<program> login -u <user> -g <token>` followed by `<program> token`
/// and reads the token from the second command's output.
#[derive(Debug, Clone)]
pub struct CliLoginExchange {
    program: String,
    timeout: Duration,
}

impl CliLoginExchange {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_CLI_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String, CredentialError> {
        // Argument 0 names the subcommand; later arguments may carry secrets.
        let subcommand = args.first().copied().unwrap_or_default();

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| CredentialError::Login {
            message: format!(
                "`{} {subcommand}` did not finish within {} seconds",
                self.program,
                self.timeout.as_secs()
            ),
        })?
        .map_err(|e| CredentialError::Login {
            message: format!("could not run `{}`: {e}", self.program),
        })?;

        if !output.status.success() {
            return Err(CredentialError::Login {
                message: format!(
                    "`{} {subcommand}` exited with {}",
                    self.program, output.status
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl LoginExchange for CliLoginExchange {
    #[instrument(skip_all, fields(identity_user = %identity_user, program = %self.program))]
    async fn exchange(
        &self,
        identity_user: &IdentityUserId,
        identity_token: &IdentityToken,
    ) -> Result<AccessToken, CredentialError> {
        self.run(&[
            "login",
            "-u",
            identity_user.as_str(),
            "-g",
            identity_token.expose(),
        ])
        .await?;
        debug!("CLI login succeeded, reading token");

        let output = self.run(&["token"]).await?;
        parse_token_output(&output).ok_or(CredentialError::EmptyToken)
    }
}

/// Extracts the token from `travis token` output.
///
/// The CLI prints a sentence such as `Your access token is abc123`; the token
/// is the last whitespace-separated word of the first line.
pub fn parse_token_output(output: &str) -> Option<AccessToken> {
    let first_line = output.lines().next()?;
    let word = first_line.split_whitespace().last()?;
    AccessToken::new(word)
}

// ---------------------------------------------------------------------------
// API exchange
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
}

/// Logs in through the Travis `/auth/github` endpoint.
#[derive(Clone)]
pub struct ApiLoginExchange {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    user_agent: String,
}

impl ApiLoginExchange {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: concat!("ci-monitor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl LoginExchange for ApiLoginExchange {
    #[instrument(skip_all, fields(identity_user = %identity_user))]
    async fn exchange(
        &self,
        identity_user: &IdentityUserId,
        identity_token: &IdentityToken,
    ) -> Result<AccessToken, CredentialError> {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/auth/github", self.base_url))
            .header("User-Agent", self.user_agent.clone())
            .header("Accept", "application/json")
            .json_body(&serde_json::json!({ "github_token": identity_token.expose() }));

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| CredentialError::Login {
                message: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(CredentialError::Login {
                message: format!("Travis refused the GitHub token (HTTP {})", response.status),
            });
        }

        let body: AuthResponse =
            serde_json::from_slice(&response.body).map_err(|e| CredentialError::Login {
                message: format!("undecodable auth response: {e}"),
            })?;

        body.access_token
            .and_then(AccessToken::new)
            .ok_or(CredentialError::EmptyToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;

    fn identity() -> (IdentityUserId, IdentityToken) {
        (
            IdentityUserId::new("octocat").unwrap(),
            IdentityToken::new("gh-secret").unwrap(),
        )
    }

    #[test]
    fn token_is_last_word_of_first_line() {
        let token = parse_token_output("Your access token is abc123\nsecond line ignored\n")
            .expect("token");
        assert_eq!(token.expose(), "abc123");
    }

    #[test]
    fn blank_output_yields_no_token() {
        assert!(parse_token_output("").is_none());
        assert!(parse_token_output("   \nabc").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cli_exchange_reads_token_from_second_invocation() {
        // `echo token` prints "token", so the parsed token is the word itself.
        let (user, secret) = identity();
        let token = CliLoginExchange::new("echo")
            .exchange(&user, &secret)
            .await
            .expect("token");
        assert_eq!(token.expose(), "token");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cli_exchange_reports_failed_login() {
        let (user, secret) = identity();
        let err = CliLoginExchange::new("false")
            .exchange(&user, &secret)
            .await
            .expect_err("login fails");

        assert!(matches!(err, CredentialError::Login { ref message } if message.contains("login")));
        assert!(!err.to_string().contains("gh-secret"));
    }

    #[tokio::test]
    async fn cli_exchange_reports_missing_program() {
        let (user, secret) = identity();
        let err = CliLoginExchange::new("definitely-not-a-travis-binary")
            .exchange(&user, &secret)
            .await
            .expect_err("missing program");

        assert!(matches!(err, CredentialError::Login { .. }));
    }

    #[tokio::test]
    async fn api_exchange_posts_github_token() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            "https://travis.test/auth/github",
            200,
            r#"{"access_token": "travis-abc"}"#,
        );
        let (user, secret) = identity();

        let token = ApiLoginExchange::new(Arc::new(transport.clone()), "https://travis.test")
            .exchange(&user, &secret)
            .await
            .expect("token");

        assert_eq!(token.expose(), "travis-abc");
        let request = &transport.requests()[0];
        assert_eq!(request.body, br#"{"github_token":"gh-secret"}"#.to_vec());
    }

    #[tokio::test]
    async fn api_exchange_without_token_is_empty_token() {
        let transport = MockTransport::new();
        transport.push_response(HttpMethod::Post, "https://travis.test/auth/github", 200, "{}");
        let (user, secret) = identity();

        let err = ApiLoginExchange::new(Arc::new(transport), "https://travis.test")
            .exchange(&user, &secret)
            .await
            .expect_err("empty");

        assert_eq!(err, CredentialError::EmptyToken);
    }

    #[tokio::test]
    async fn api_exchange_rejection_is_login_failure() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            "https://travis.test/auth/github",
            403,
            r#"{"@type": "error", "error_type": "login_required"}"#,
        );
        let (user, secret) = identity();

        let err = ApiLoginExchange::new(Arc::new(transport), "https://travis.test")
            .exchange(&user, &secret)
            .await
            .expect_err("refused");

        assert!(err.to_string().contains("HTTP 403"));
    }
}
