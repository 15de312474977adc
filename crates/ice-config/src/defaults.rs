use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port on which the server accepts client connections.
pub const DEFAULT_TCP_PORT: u16 = 18121;

/// Default log filter expression used by the server binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default wait, in milliseconds, for a client response.
pub const DEFAULT_CLIENT_RSP_TIMEOUT_MS: u64 = 3_000;

/// Default number of release workers kept alive.
pub const DEFAULT_POOL_CORE_SIZE: usize = 4;

/// Default ceiling on release workers.
pub const DEFAULT_POOL_MAX_SIZE: usize = 16;

/// Default idle time before surplus release workers exit.
pub const DEFAULT_POOL_KEEP_ALIVE_SECONDS: u64 = 60;

/// Default release queue capacity.
pub const DEFAULT_POOL_QUEUE_CAPACITY: usize = 60_000;

/// Default silence window after which a client is reaped.
pub const DEFAULT_CLIENT_EXPIRE_MS: u64 = 40_000;

/// Default reaper cadence.
pub const DEFAULT_REAP_INTERVAL_MS: u64 = 10_000;

/// Default log filter expression used by the server binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the server binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default client-facing endpoint.
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("0.0.0.0", DEFAULT_TCP_PORT)
}

pub(crate) fn default_client_rsp_timeout_ms() -> u64 {
    DEFAULT_CLIENT_RSP_TIMEOUT_MS
}

pub(crate) fn default_pool_core_size() -> usize {
    DEFAULT_POOL_CORE_SIZE
}

pub(crate) fn default_pool_max_size() -> usize {
    DEFAULT_POOL_MAX_SIZE
}

pub(crate) fn default_pool_keep_alive_seconds() -> u64 {
    DEFAULT_POOL_KEEP_ALIVE_SECONDS
}

pub(crate) fn default_pool_queue_capacity() -> usize {
    DEFAULT_POOL_QUEUE_CAPACITY
}

pub(crate) fn default_client_expire_ms() -> u64 {
    DEFAULT_CLIENT_EXPIRE_MS
}

pub(crate) fn default_reap_interval_ms() -> u64 {
    DEFAULT_REAP_INTERVAL_MS
}
