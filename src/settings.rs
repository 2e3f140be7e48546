//! Typed settings with layered precedence (file → environment → CLI).

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::transport::mock::MockResponder;
use crate::transport::{HttpTransport, Transport};

/// Command-line arguments for the `ward` binary.
#[derive(Debug, Parser)]
#[command(name = "ward", version, about = "Hospital patient and dashboard data client")]
pub struct CliArgs {
    /// Optional path to a TOML configuration file.
    #[arg(long = "config-file", env = "WARD_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Where API requests are answered.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Base URL of the API in `http` mode.
    #[arg(long = "api-base-url", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the landing dashboard.
    Dashboard,
    /// List patients, optionally filtered by name, DNI or diagnostic.
    Patients {
        #[arg(long, short, default_value = "")]
        search: String,
    },
    /// Print one patient.
    Patient { id: String },
}

/// Which transport answers API requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fixtures served by the in-process mock responder.
    #[default]
    Mock,
    /// A real HTTP endpoint.
    Http,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    /// Required in [`Mode::Http`].
    pub api_base_url: Option<String>,
    /// Overrides the mock responder's per-route delays.
    pub mock_delay: Option<Duration>,
    pub logging: LoggingSettings,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Loads settings: the optional config file, then `WARD_*` variables, then `cli`.
///
/// # Errors
///
/// Returns an error if a source cannot be read or a value is invalid.
pub fn load(cli: &CliArgs) -> Result<Settings, SettingsError> {
    let mut builder = Config::builder();
    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }
    builder = builder.add_source(Environment::with_prefix("WARD"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_cli_overrides(cli);
    Settings::from_raw(raw)
}

impl Settings {
    /// Builds the transport for the configured mode.
    pub fn transport(&self) -> Arc<dyn Transport> {
        match self.mode {
            Mode::Mock => Arc::new(
                self.mock_delay
                    .map_or_else(MockResponder::new, MockResponder::with_latency),
            ),
            Mode::Http => Arc::new(HttpTransport::new(
                self.api_base_url.clone().unwrap_or_default(),
            )),
        }
    }

    fn from_raw(raw: RawSettings) -> Result<Self, SettingsError> {
        let mode = raw.mode.unwrap_or_default();
        let api_base_url = raw.api_base_url.and_then(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
        if mode == Mode::Http && api_base_url.is_none() {
            return Err(SettingsError::invalid(
                "api_base_url",
                "required in http mode",
            ));
        }

        let level = match raw.log_level {
            Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
                SettingsError::invalid("log_level", format!("failed to parse: {err}"))
            })?,
            None => LevelFilter::INFO,
        };

        Ok(Self {
            mode,
            api_base_url,
            mock_delay: raw.mock_delay_ms.map(Duration::from_millis),
            logging: LoggingSettings {
                level,
                format: raw.log_format.unwrap_or_default(),
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    mode: Option<Mode>,
    api_base_url: Option<String>,
    mock_delay_ms: Option<u64>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
}

impl RawSettings {
    fn apply_cli_overrides(&mut self, cli: &CliArgs) {
        if let Some(mode) = cli.mode {
            self.mode = Some(mode);
        }
        if let Some(url) = cli.api_base_url.as_ref() {
            self.api_base_url = Some(url.clone());
        }
        if let Some(level) = cli.log_level.as_ref() {
            self.log_level = Some(level.clone());
        }
    }
}
