//! Lifecycle milestones of the server process and where they are reported.

use std::sync::Arc;

use ice_config::{Config, SocketEndpoint};
use tracing::{error, info};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// One step of the server's life, in the order they occur.
#[derive(Debug, Clone, Copy)]
pub enum Lifecycle<'a> {
    /// Configuration loading is about to begin.
    Bootstrapping,
    /// Configuration is valid and telemetry is installed.
    Configured(&'a Config),
    /// Bootstrap stopped; the server will not start.
    BootstrapFailed(&'a BootstrapError),
    /// The listener accepts client connections on this endpoint.
    Listening(&'a SocketEndpoint),
    /// The stop sequence has begun.
    Stopping,
    /// Every component has stopped.
    Stopped,
}

impl Lifecycle<'_> {
    /// Stable event name recorded in the `event` log field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrap_starting",
            Self::Configured(_) => "bootstrap_succeeded",
            Self::BootstrapFailed(_) => "bootstrap_failed",
            Self::Listening(_) => "listener_ready",
            Self::Stopping => "shutdown_started",
            Self::Stopped => "shutdown_completed",
        }
    }
}

/// Receives lifecycle milestones.
pub trait HealthReporter: Send + Sync {
    /// Records one milestone.
    fn report(&self, event: Lifecycle<'_>);
}

impl<T: HealthReporter> HealthReporter for Arc<T> {
    fn report(&self, event: Lifecycle<'_>) {
        (**self).report(event);
    }
}

/// Writes milestones to the `ice-server::health` log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHealthReporter;

impl HealthReporter for LogHealthReporter {
    fn report(&self, event: Lifecycle<'_>) {
        let name = event.name();
        match event {
            Lifecycle::Bootstrapping => {
                info!(target: HEALTH_TARGET, event = name, "loading configuration");
            }
            Lifecycle::Configured(config) => {
                let pool = config.pool();
                info!(
                    target: HEALTH_TARGET,
                    event = name,
                    socket = %config.listen_socket(),
                    rsp_timeout_ms = config.client_rsp_timeout_ms,
                    expire_ms = config.client_expire_ms,
                    pool = %format_args!(
                        "{}..{} queue {}",
                        pool.core_size, pool.max_size, pool.queue_capacity
                    ),
                    "configuration ready"
                );
            }
            Lifecycle::BootstrapFailed(failure) => {
                error!(target: HEALTH_TARGET, event = name, error = %failure, "cannot start");
            }
            Lifecycle::Listening(endpoint) => {
                info!(target: HEALTH_TARGET, event = name, %endpoint, "waiting for clients");
            }
            Lifecycle::Stopping => info!(target: HEALTH_TARGET, event = name, "stopping"),
            Lifecycle::Stopped => info!(target: HEALTH_TARGET, event = name, "stopped"),
        }
    }
}
