//! Process-wide `tracing` subscriber for the server binary.
//!
//! The subscriber is installed once. Later initialisations, from tests or
//! from an embedder starting a second server, get the handle describing the
//! subscriber that is already live.

use std::io::{self, IsTerminal};

use ice_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::{Subscriber, debug};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Describes the live subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    filter: String,
    format: LogFormat,
}

impl TelemetryHandle {
    /// Filter expression the subscriber was built with.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Record format the subscriber writes.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Rejected expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another subscriber was installed outside this module.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let handle = INSTALLED.get_or_try_init(|| install(config))?;
    if handle.filter != config.log_filter() || handle.format != config.log_format() {
        debug!(
            target: TELEMETRY_TARGET,
            installed_filter = %handle.filter,
            requested_filter = %config.log_filter(),
            "telemetry already installed; keeping the live subscriber"
        );
    }
    Ok(handle.clone())
}

fn install(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;
    let subscriber = build_subscriber(filter, config.log_format());
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(TelemetryHandle {
        filter: config.log_filter().to_owned(),
        format: config.log_format(),
    })
}

/// Thread names are on: worker threads are named after their role
/// (`ice-listener`, `ice-conn-N`, `ice-release-N`, `ice-reaper`).
fn build_subscriber(filter: EnvFilter, format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    }
}
