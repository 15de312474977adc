//! Turns layered settings into a validated configuration with logging live.

use std::sync::Arc;

use ice_config::{Config, ConfigError, SocketPreparationError};
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use crate::health::{HealthReporter, Lifecycle};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Source of the server configuration.
///
/// Closures returning a configuration are loaders too, which keeps tests
/// free of bespoke loader types.
pub trait ConfigLoader: Send + Sync {
    /// Resolves the configuration layers.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

impl<F> ConfigLoader for F
where
    F: Fn() -> Result<Config, Arc<OrthoError>> + Send + Sync,
{
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        self()
    }
}

/// Reads the configuration file, `ICE_*` variables and process arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Why the server could not get ready to start.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A layer could not be read or parsed.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Loader failure.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Every layer parsed but the combination is unusable.
    #[error("invalid configuration: {source}")]
    Invalid {
        /// The violated constraint.
        #[source]
        source: ConfigError,
    },
    /// The log filter or subscriber was rejected.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Subscriber failure.
        #[source]
        source: TelemetryError,
    },
    /// The Unix socket directory could not be created.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Directory creation failure.
        #[source]
        source: SocketPreparationError,
    },
}

/// Output of [`bootstrap_with`].
#[derive(Debug)]
pub struct Bootstrapped {
    config: Config,
    telemetry: TelemetryHandle,
}

impl Bootstrapped {
    /// Validated configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscriber settings live in this process.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }

    /// Hands the configuration over to [`IceServer::start`](crate::IceServer::start).
    #[must_use]
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Loads and checks the configuration, installs logging and prepares the
/// socket directory. The reporter sees the start and the outcome.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.report(Lifecycle::Bootstrapping);
    let prepared = prepare(loader);
    match &prepared {
        Ok(bootstrapped) => reporter.report(Lifecycle::Configured(&bootstrapped.config)),
        Err(error) => reporter.report(Lifecycle::BootstrapFailed(error)),
    }
    prepared
}

fn prepare(loader: &dyn ConfigLoader) -> Result<Bootstrapped, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| BootstrapError::Invalid { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .listen_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;
    Ok(Bootstrapped { config, telemetry })
}
