//! Socket transport for client connections.
//!
//! The listener binds the configured endpoint and accepts connections on a
//! background thread. Each connection gets its own reader thread that feeds
//! decoded envelopes to the [`ClientManager`](crate::ClientManager).

mod channel;
mod errors;
mod handler;
mod listener;

pub use self::channel::ServerChannel;
pub use self::errors::ListenerError;
pub use self::handler::{ClientConnectionHandler, ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
