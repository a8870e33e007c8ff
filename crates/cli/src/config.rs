//! Layered configuration for `ci-monitor`.
//!
//! Sources, highest precedence first:
//! 1. CLI flags
//! 2. Environment variables (`CI_MONITOR__SECTION__KEY`, e.g. `CI_MONITOR__LOGIN__METHOD=api`)
//! 3. The file given with `--config`, or `./ci-monitor.toml` when present
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [provider]
//! base_url = "https://api.travis-ci.com"
//! request_timeout_secs = 30
//! user_agent = "ci-monitor"
//! max_build_pages = 5
//!
//! [activation]
//! attempt_limit = 20
//! poll_delay_ms = 3000
//!
//! [login]
//! method = "cli"        # or "api"
//! program = "travis"
//! timeout_secs = 60
//!
//! [telemetry]
//! format = "pretty"     # or "json"
//! filter = "info"
//! otlp_endpoint = "http://localhost:4317"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use orchestrator::{ActivationConfig, DEFAULT_ATTEMPT_LIMIT, DEFAULT_POLL_DELAY};
use serde::Deserialize;

/// Config file picked up from the working directory when `--config` is absent.
pub const LOCAL_CONFIG_FILE: &str = "ci-monitor.toml";

const ENV_PREFIX: &str = "CI_MONITOR";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub activation: ActivationSettings,
    pub login: LoginSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Upper bound on pages followed when listing builds.
    pub max_build_pages: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: travis::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            user_agent: "ci-monitor".to_string(),
            max_build_pages: travis::DEFAULT_MAX_BUILD_PAGES,
        }
    }
}

impl ProviderSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActivationSettings {
    pub attempt_limit: u32,
    pub poll_delay_ms: u64,
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
            poll_delay_ms: DEFAULT_POLL_DELAY.as_millis() as u64,
        }
    }
}

impl ActivationSettings {
    pub fn to_activation_config(&self) -> anyhow::Result<ActivationConfig> {
        ActivationConfig::new(self.attempt_limit, Duration::from_millis(self.poll_delay_ms))
            .context("activation.attempt_limit must be at least 1")
    }
}

/// How a Travis token is obtained when none is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    /// Run the `travis` command line client.
    Cli,
    /// Call the `/auth/github` endpoint.
    Api,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    pub method: LoginMethod,
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            method: LoginMethod::Cli,
            program: "travis".to_string(),
            timeout_secs: travis::DEFAULT_CLI_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub format: LogFormat,
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
    /// OTLP gRPC endpoint; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
            otlp_endpoint: None,
        }
    }
}

impl Settings {
    /// File the settings are read from: `path` when given, otherwise the
    /// local config file if it exists.
    pub fn source_file(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(LOCAL_CONFIG_FILE)).filter(|local| local.exists()),
        }
    }

    /// Loads settings from `path` (required to exist) or the local config
    /// file (optional), overlaid with environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();

        if let Some(file) = Self::source_file(path) {
            builder = builder.add_source(
                File::from(file)
                    .format(FileFormat::Toml)
                    .required(path.is_some()),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder).context("invalid configuration")
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}
