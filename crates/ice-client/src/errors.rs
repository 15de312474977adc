//! Errors raised while bringing a client online.

use std::io;

use ice_config::SocketEndpoint;
use ice_protocol::CodecError;
use thiserror::Error;

/// Failure to connect and register with the server.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// No address of the endpoint accepted the connection.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: SocketEndpoint,
        /// Error from the last address tried.
        #[source]
        source: io::Error,
    },
    /// The endpoint kind is not available on this platform.
    #[error("unsupported endpoint {endpoint}")]
    Unsupported {
        /// Endpoint that was requested.
        endpoint: SocketEndpoint,
    },
    /// The connected socket could not be duplicated.
    #[error("failed to clone the server stream: {0}")]
    Stream(#[source] io::Error),
    /// The INIT message could not be written.
    #[error("failed to register with the server: {0}")]
    Register(#[source] CodecError),
    /// A runtime thread could not be started.
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        /// Which thread failed to start.
        thread: &'static str,
        /// Error from the thread builder.
        #[source]
        source: io::Error,
    },
}
