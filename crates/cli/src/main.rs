//! `ci-monitor` command line entry point.
//!
//! Composition root for the workspace:
//!
//! 1. **Load configuration**: [`config::Settings`] layered from file, environment
//!    and flags.
//! 2. **Wire observability**: `tracing-subscriber` with an optional OTLP exporter.
//! 3. **Construct infrastructure**: a [`travis::TravisClient`] over reqwest, the
//!    configured login exchange, and an in-process token cache, injected into
//!    [`orchestrator::ActivationOrchestrator`].
//! 4. **Run one subcommand** and exit.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use listener::{DecodeOutcome, WebhookDecoder};
use monitor::{
    AccessToken, ActivationRequest, IdentityToken, IdentityUserId, LoginExchange, ProviderName,
    RepositoryName, TokenStore, UserName,
};
use orchestrator::{ActivationOrchestrator, CredentialResolver, InMemoryTokenStore};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};
use travis::{ApiLoginExchange, CliLoginExchange, HttpTransport, ReqwestTransport, TravisClient};

use crate::config::{LogFormat, LoginMethod, Settings};

/// Name under which provider tokens are cached.
const PROVIDER: &str = "travis";

#[derive(Parser)]
#[command(name = "ci-monitor")]
#[command(version)]
#[command(about = "Activates Travis CI monitoring for repositories and decodes build notifications")]
#[command(after_long_help = r#"EXAMPLES
    Enable CI for octocat/course on behalf of local user alice:
        $ ci-monitor activate --user alice --github-user octocat course

    List pull request builds of the same repository as JSON:
        $ ci-monitor builds --user alice --github-user octocat course

    Decode a saved webhook body:
        $ ci-monitor decode --event-type pull_request payload.json

ENVIRONMENT VARIABLES
    CI_MONITOR_GITHUB_TOKEN        GitHub token exchanged for a Travis token
    CI_MONITOR_TRAVIS_TOKEN        Existing Travis token; skips the login exchange
    CI_MONITOR__SECTION__KEY       Overrides any configuration key, e.g. CI_MONITOR__LOGIN__METHOD=api
    RUST_LOG                       Overrides telemetry.filter
"#)]
struct Cli {
    /// Configuration file (defaults to ./ci-monitor.toml when present)
    #[arg(long, global = true, env = "CI_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (overrides telemetry.format)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the Travis account and enable CI for a repository
    Activate(RepositoryArgs),
    /// Disable CI for a repository
    Deactivate(RepositoryArgs),
    /// List pull request builds of a repository as JSON
    Builds(RepositoryArgs),
    /// Decode a Travis webhook body (from a file or stdin) into a build event
    Decode {
        /// Event type header value; when absent the body's `type` field is used
        #[arg(long)]
        event_type: Option<String>,

        /// File holding the JSON body; reads stdin when omitted
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct RepositoryArgs {
    /// Local user the operation runs for
    #[arg(long)]
    user: String,

    /// GitHub login; also the repository owner
    #[arg(long)]
    github_user: String,

    /// GitHub token used to log in to Travis (required without --travis-token)
    #[arg(
        long,
        env = "CI_MONITOR_GITHUB_TOKEN",
        hide_env_values = true,
        required_unless_present = "travis_token"
    )]
    github_token: Option<String>,

    /// Travis token to use instead of logging in
    #[arg(long, env = "CI_MONITOR_TRAVIS_TOKEN", hide_env_values = true)]
    travis_token: Option<String>,

    /// Repository name, without owner
    repository: String,
}

impl RepositoryArgs {
    fn to_request(&self) -> anyhow::Result<ActivationRequest> {
        Ok(ActivationRequest {
            user: UserName::new(self.user.clone()).context("--user must not be empty")?,
            repository: RepositoryName::new(self.repository.clone())
                .context("repository name must not be empty")?,
            identity_user: IdentityUserId::new(self.github_user.clone())
                .context("--github-user must not be empty")?,
            identity_token: self
                .github_token
                .clone()
                .map(|token| IdentityToken::new(token).context("GitHub token must not be blank"))
                .transpose()?,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        settings.telemetry.format = format;
    }

    let telemetry = telemetry::init(&settings.telemetry)?;
    match Settings::source_file(cli.config.as_deref()) {
        Some(file) => debug!(file = %file.display(), "Configuration loaded"),
        None => debug!("Configuration loaded from environment and defaults"),
    }

    let result = run(cli.command, &settings).await;
    if let Err(e) = &result {
        let chain = format!("{e:#}");
        error!(error = %chain, "Command failed");
    }

    telemetry.shutdown();
    result
}

async fn run(command: Commands, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::Activate(args) => {
            let request = args.to_request()?;
            let orchestrator = build_orchestrator(settings, &request, &args).await?;
            let report = orchestrator.activate(&request).await?;
            println!(
                "activated {} (travis repository {}) after {} sync poll(s)",
                report.repository.slug, report.repository.id, report.sync_polls
            );
        }
        Commands::Deactivate(args) => {
            let request = args.to_request()?;
            let orchestrator = build_orchestrator(settings, &request, &args).await?;
            let repository = orchestrator.deactivate(&request).await?;
            println!("deactivated {} (active: {})", repository.slug, repository.active);
        }
        Commands::Builds(args) => {
            let request = args.to_request()?;
            let orchestrator = build_orchestrator(settings, &request, &args).await?;
            let builds = orchestrator.pull_request_builds(&request).await?;
            println!("{}", serde_json::to_string_pretty(&builds)?);
        }
        Commands::Decode { event_type, file } => {
            let raw = read_payload(file.as_deref()).await?;
            let decoder = WebhookDecoder::new();
            let outcome = match event_type.as_deref() {
                Some(event_type) => decoder.decode(&raw, event_type)?,
                None => decoder.decode_untyped(&raw)?,
            };
            match outcome {
                DecodeOutcome::Build(event) => {
                    println!("{}", serde_json::to_string_pretty(&event)?);
                }
                DecodeOutcome::Ignored { event_type } => {
                    info!(%event_type, "Event type is not tracked; nothing decoded");
                }
            }
        }
    }
    Ok(())
}

async fn build_orchestrator(
    settings: &Settings,
    request: &ActivationRequest,
    args: &RepositoryArgs,
) -> anyhow::Result<ActivationOrchestrator> {
    let transport: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::with_timeout(settings.provider.request_timeout())
            .context("could not build HTTP client")?,
    );

    let client = TravisClient::new(transport.clone(), settings.provider.base_url.clone())
        .with_user_agent(settings.provider.user_agent.clone())
        .with_max_build_pages(settings.provider.max_build_pages);

    let login: Arc<dyn LoginExchange> = match settings.login.method {
        LoginMethod::Cli => Arc::new(
            CliLoginExchange::new(settings.login.program.clone())
                .with_timeout(std::time::Duration::from_secs(settings.login.timeout_secs)),
        ),
        LoginMethod::Api => Arc::new(
            ApiLoginExchange::new(transport, settings.provider.base_url.clone())
                .with_user_agent(settings.provider.user_agent.clone()),
        ),
    };

    let provider = ProviderName::new(PROVIDER).context("provider name must not be empty")?;
    let store = Arc::new(InMemoryTokenStore::new());
    if let Some(token) = args.travis_token.clone() {
        let token = AccessToken::new(token).context("Travis token must not be blank")?;
        store.put_token(&request.user, &provider, token).await?;
    }

    let credentials = CredentialResolver::new(provider, store, login);
    Ok(ActivationOrchestrator::new(
        Arc::new(client),
        credentials,
        settings.activation.to_activation_config()?,
    ))
}

async fn read_payload(file: Option<&std::path::Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("could not read {}", path.display())),
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("could not read stdin")?;
            Ok(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn activate_arguments_build_a_request() {
        let cli = Cli::try_parse_from([
            "ci-monitor",
            "activate",
            "--user",
            "alice",
            "--github-user",
            "octocat",
            "--github-token",
            "gh-secret",
            "course",
        ])
        .expect("valid arguments");

        let Commands::Activate(args) = cli.command else {
            panic!("expected activate");
        };
        let request = args.to_request().expect("request");
        assert_eq!(request.slug().as_str(), "octocat/course");
        assert_eq!(request.user.as_str(), "alice");
    }

    #[test]
    fn blank_github_token_is_rejected() {
        let cli = Cli::try_parse_from([
            "ci-monitor",
            "builds",
            "--user",
            "alice",
            "--github-user",
            "octocat",
            "--github-token",
            "  ",
            "course",
        ])
        .expect("valid arguments");

        let Commands::Builds(args) = cli.command else {
            panic!("expected builds");
        };
        assert!(args.to_request().is_err());
    }

    #[test]
    fn travis_token_makes_github_token_optional() {
        let cli = Cli::try_parse_from([
            "ci-monitor",
            "deactivate",
            "--user",
            "alice",
            "--github-user",
            "octocat",
            "--travis-token",
            "travis-secret",
            "course",
        ])
        .expect("valid arguments");

        let Commands::Deactivate(args) = cli.command else {
            panic!("expected deactivate");
        };
        let request = args.to_request().expect("request");
        assert!(request.identity_token.is_none());
        assert_eq!(args.travis_token.as_deref(), Some("travis-secret"));
    }

    #[test]
    fn one_of_the_two_tokens_is_required() {
        let result = Cli::try_parse_from([
            "ci-monitor",
            "activate",
            "--user",
            "alice",
            "--github-user",
            "octocat",
            "course",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn decode_accepts_optional_event_type_and_file() {
        let cli = Cli::try_parse_from(["ci-monitor", "decode", "--event-type", "push", "body.json"])
            .expect("valid arguments");

        match cli.command {
            Commands::Decode { event_type, file } => {
                assert_eq!(event_type.as_deref(), Some("push"));
                assert_eq!(file, Some(PathBuf::from("body.json")));
            }
            _ => panic!("expected decode"),
        }
    }
}
