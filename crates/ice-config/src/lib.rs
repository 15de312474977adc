//! Shared configuration for the ice control-plane server.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an optional
//! `ice.toml` file (selected with `--config-path` or `ICE_CONFIG_PATH`), then
//! `ICE_*` environment variables, then command-line flags. The resolved
//! [`Config`] drives the client-facing listener, the response timeout used by
//! correlated calls, the release worker pool, stale-client reaping, and the
//! telemetry subscriber.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CLIENT_EXPIRE_MS, DEFAULT_CLIENT_RSP_TIMEOUT_MS, DEFAULT_LOG_FILTER,
    DEFAULT_POOL_CORE_SIZE, DEFAULT_POOL_KEEP_ALIVE_SECONDS, DEFAULT_POOL_MAX_SIZE,
    DEFAULT_POOL_QUEUE_CAPACITY, DEFAULT_REAP_INTERVAL_MS, DEFAULT_TCP_PORT, default_log_filter,
    default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ICE")]
pub struct Config {
    /// Endpoint on which clients connect.
    #[serde(default = "defaults::default_socket_endpoint")]
    pub listen_socket: SocketEndpoint,
    /// Maximum time, in milliseconds, a correlated call waits for a client.
    #[serde(default = "defaults::default_client_rsp_timeout_ms")]
    pub client_rsp_timeout_ms: u64,
    /// Release workers kept alive while idle.
    #[serde(default = "defaults::default_pool_core_size")]
    pub pool_core_size: usize,
    /// Upper bound on release workers once the queue is full.
    #[serde(default = "defaults::default_pool_max_size")]
    pub pool_max_size: usize,
    /// Idle time after which workers above the core size retire.
    #[serde(default = "defaults::default_pool_keep_alive_seconds")]
    pub pool_keep_alive_seconds: u64,
    /// Capacity of the pending release queue.
    #[serde(default = "defaults::default_pool_queue_capacity")]
    pub pool_queue_capacity: usize,
    /// Clients silent for longer than this are reaped.
    #[serde(default = "defaults::default_client_expire_ms")]
    pub client_expire_ms: u64,
    /// Cadence of the stale-client reaper.
    #[serde(default = "defaults::default_reap_interval_ms")]
    pub reap_interval_ms: u64,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log records.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_socket_endpoint(),
            client_rsp_timeout_ms: DEFAULT_CLIENT_RSP_TIMEOUT_MS,
            pool_core_size: DEFAULT_POOL_CORE_SIZE,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            pool_keep_alive_seconds: DEFAULT_POOL_KEEP_ALIVE_SECONDS,
            pool_queue_capacity: DEFAULT_POOL_QUEUE_CAPACITY,
            client_expire_ms: DEFAULT_CLIENT_EXPIRE_MS,
            reap_interval_ms: DEFAULT_REAP_INTERVAL_MS,
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

/// Worker pool parameters for the release fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Workers kept alive while idle.
    pub core_size: usize,
    /// Maximum number of workers.
    pub max_size: usize,
    /// Idle time after which workers above `core_size` exit.
    pub keep_alive: Duration,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Config::default().pool()
    }
}

/// Errors raised when a resolved configuration is internally inconsistent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The pool must be able to run at least one worker.
    #[error("pool_max_size must be at least 1")]
    EmptyPool,
    /// Core size exceeds the maximum worker count.
    #[error("pool_core_size ({core}) exceeds pool_max_size ({max})")]
    CoreExceedsMax { core: usize, max: usize },
    /// The release queue needs room for at least one task.
    #[error("pool_queue_capacity must be at least 1")]
    EmptyQueue,
    /// Correlated calls would time out immediately.
    #[error("client_rsp_timeout_ms must be greater than zero")]
    ZeroTimeout,
    /// The reaper would spin without pause.
    #[error("reap_interval_ms must be greater than zero")]
    ZeroReapInterval,
}

impl Config {
    /// Endpoint on which the server accepts client connections.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Wait budget for a single correlated call.
    #[must_use]
    pub fn client_rsp_timeout(&self) -> Duration {
        Duration::from_millis(self.client_rsp_timeout_ms)
    }

    /// Release pool parameters.
    #[must_use]
    pub fn pool(&self) -> PoolSettings {
        PoolSettings {
            core_size: self.pool_core_size,
            max_size: self.pool_max_size,
            keep_alive: Duration::from_secs(self.pool_keep_alive_seconds),
            queue_capacity: self.pool_queue_capacity,
        }
    }

    /// Silence after which a client is considered stale.
    #[must_use]
    pub fn client_expire(&self) -> Duration {
        Duration::from_millis(self.client_expire_ms)
    }

    /// Interval between reaper sweeps.
    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    /// Log filter expression handed to `tracing-subscriber`.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Selected log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Rejects combinations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_max_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if self.pool_core_size > self.pool_max_size {
            return Err(ConfigError::CoreExceedsMax {
                core: self.pool_core_size,
                max: self.pool_max_size,
            });
        }
        if self.pool_queue_capacity == 0 {
            return Err(ConfigError::EmptyQueue);
        }
        if self.client_rsp_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.reap_interval_ms == 0 {
            return Err(ConfigError::ZeroReapInterval);
        }
        Ok(())
    }
}
