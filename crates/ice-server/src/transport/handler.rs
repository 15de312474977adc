//! Accepted streams and the per-connection reader loop.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use ice_protocol::FrameReader;
use tracing::{debug, warn};

use super::{LISTENER_TARGET, ServerChannel};
use crate::channel::ClientChannel;
use crate::manager::ClientManager;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Stream types accepted by the listener.
#[derive(Debug)]
pub enum ConnectionStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix domain socket connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

/// Applies `$body` to whichever socket backs `$stream`.
macro_rules! on_socket {
    ($stream:expr, $socket:ident => $body:expr) => {
        match $stream {
            ConnectionStream::Tcp($socket) => $body,
            #[cfg(unix)]
            ConnectionStream::Unix($socket) => $body,
        }
    };
}

impl ConnectionStream {
    /// Opens a second handle to the same socket.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(socket) => socket.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(socket) => socket.try_clone().map(Self::Unix),
        }
    }

    /// Closes both halves so a reader blocked on any clone wakes up.
    pub fn shutdown(&self) -> io::Result<()> {
        on_socket!(self, socket => socket.shutdown(Shutdown::Both))
    }

    /// Peer label used in registry and transport logs.
    pub fn peer_label(&self) -> String {
        match self {
            Self::Tcp(socket) => socket
                .peer_addr()
                .map_or_else(|_| "tcp:?".to_owned(), |addr| format!("tcp:{addr}")),
            #[cfg(unix)]
            Self::Unix(_) => "unix".to_owned(),
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        on_socket!(self, socket => socket.read(buf))
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        on_socket!(self, socket => socket.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        on_socket!(self, socket => socket.flush())
    }
}

/// Serves one accepted connection on its own thread.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Runs until the peer goes away or the stream fails.
    fn handle(&self, stream: ConnectionStream);
}

/// Turns each connection into a registered client channel.
#[derive(Debug)]
pub struct ClientConnectionHandler {
    manager: Arc<ClientManager>,
}

impl ClientConnectionHandler {
    /// Routes every connection's traffic to `manager`.
    pub fn new(manager: Arc<ClientManager>) -> Self {
        Self { manager }
    }
}

impl ConnectionHandler for ClientConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let (channel, read_half) = match ServerChannel::open(stream) {
            Ok(opened) => opened,
            Err(error) => {
                warn!(
                    target: LISTENER_TARGET,
                    error = %error,
                    "failed to prepare client connection"
                );
                return;
            }
        };
        let channel = Arc::new(channel);
        let handle: Arc<dyn ClientChannel> = Arc::clone(&channel) as Arc<dyn ClientChannel>;
        debug!(
            target: LISTENER_TARGET,
            channel = %channel.id(),
            peer = channel.peer(),
            "client connected"
        );

        let mut reader = FrameReader::new(read_half);
        loop {
            match reader.read_envelope() {
                Ok(Some(envelope)) => self.manager.handle_inbound(&handle, envelope),
                Ok(None) => break,
                Err(error) if error.is_recoverable() => {
                    warn!(
                        target: LISTENER_TARGET,
                        channel = %channel.id(),
                        error = %error,
                        "skipping undecodable frame"
                    );
                }
                Err(error) => {
                    debug!(
                        target: LISTENER_TARGET,
                        channel = %channel.id(),
                        error = %error,
                        "client connection failed"
                    );
                    break;
                }
            }
        }

        self.manager.connection_closed(channel.id());
        channel.close();
        debug!(
            target: LISTENER_TARGET,
            channel = %channel.id(),
            "client disconnected"
        );
    }
}
