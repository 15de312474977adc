//! Errors raised by the client listener.

use std::io;

use camino::Utf8PathBuf;
use ice_config::SocketEndpoint;
use thiserror::Error;

/// Failure to bind or run the client listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host did not resolve to any address.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Configured endpoint.
        endpoint: SocketEndpoint,
        /// Resolver failure.
        #[source]
        source: io::Error,
    },
    /// The socket could not be bound.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// Configured endpoint.
        endpoint: SocketEndpoint,
        /// Bind failure.
        #[source]
        source: io::Error,
    },
    /// Another live server answers on the unix socket path.
    #[error("unix socket {path} is served by another process")]
    UnixInUse {
        /// Occupied path.
        path: Utf8PathBuf,
    },
    /// The unix socket path is taken by something other than a socket.
    #[error("{path} exists and is not a socket")]
    UnixNotSocket {
        /// Occupied path.
        path: Utf8PathBuf,
    },
    /// A dead server's socket file could not be inspected or removed.
    #[error("failed to reclaim stale unix socket {path}: {source}")]
    StaleSocket {
        /// Stale path.
        path: Utf8PathBuf,
        /// Filesystem failure.
        #[source]
        source: io::Error,
    },
    /// Unix endpoints were configured on a platform without them.
    #[error("unix sockets are not supported here: {endpoint}")]
    Unsupported {
        /// Configured endpoint.
        endpoint: SocketEndpoint,
    },
    /// The accept thread could not be started.
    #[error("failed to spawn listener thread: {source}")]
    Spawn {
        /// Spawn failure.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
