//! Connection runtime: registration, heartbeats and request handling.
//!
//! [`IceClient::connect`] opens one stream to the server and sends `INIT`.
//! Two threads then share the stream. The reader answers server requests
//! through [`ClientService`]; the heartbeat thread sends `SLAP` on a fixed
//! interval. Writes from both go through one locked [`FrameWriter`], so
//! frames never interleave.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use ice_config::SocketEndpoint;
use ice_protocol::{CodecError, Envelope, FrameReader, FrameWriter, Payload};
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::clazz::TypeLoader;
use crate::engine::ClientEngine;
use crate::errors::ConnectError;
use crate::service::ClientService;

#[cfg(test)]
mod tests;

const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// Settings supplied by the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Tenant application.
    pub app: i32,
    /// Identity reported to the server, unique within the app.
    pub address: String,
    /// Server endpoint.
    pub server: SocketEndpoint,
    /// Delay between heartbeats.
    pub heartbeat_interval: Duration,
    /// Upper bound on establishing a TCP connection.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Heartbeat delay used unless overridden.
    pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
    /// TCP connect bound used unless overridden.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Settings for `address` of `app`, talking to `server`, with default
    /// timings.
    pub fn new(app: i32, address: impl Into<String>, server: SocketEndpoint) -> Self {
        Self {
            app,
            address: address.into(),
            server,
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Overrides the heartbeat delay.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Overrides the TCP connect bound.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Stream to the server.
#[derive(Debug)]
pub enum ClientStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix domain socket connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ClientStream {
    /// Connects to `endpoint`, trying each resolved TCP address in turn.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Connect`] when no address accepts, and
    /// [`ConnectError::Unsupported`] for Unix endpoints off Unix.
    pub fn connect(endpoint: &SocketEndpoint, timeout: Duration) -> Result<Self, ConnectError> {
        let failed = |source| ConnectError::Connect {
            endpoint: endpoint.clone(),
            source,
        };
        match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                let mut last_error = None;
                for addr in (host.as_str(), *port).to_socket_addrs().map_err(failed)? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            stream.set_nodelay(true).map_err(failed)?;
                            return Ok(Self::Tcp(stream));
                        }
                        Err(error) => last_error = Some(error),
                    }
                }
                Err(failed(last_error.unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved")
                })))
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => UnixStream::connect(path.as_std_path())
                .map(Self::Unix)
                .map_err(failed),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(ConnectError::Unsupported {
                endpoint: endpoint.clone(),
            }),
        }
    }

    /// Another handle to the same connection.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Shuts down both directions, waking any blocked reader.
    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for ClientStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

type SharedWriter = Arc<Mutex<FrameWriter<ClientStream>>>;

fn send(writer: &SharedWriter, envelope: &Envelope) -> Result<(), CodecError> {
    writer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .write_envelope(envelope)
}

/// A registered client connection.
#[derive(Debug)]
pub struct IceClient {
    app: i32,
    address: String,
    control: ClientStream,
    connected: Arc<AtomicBool>,
    stop: Option<Sender<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl IceClient {
    /// Connects, registers with `INIT`, and starts the reader and heartbeat
    /// threads.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when the server is unreachable, the
    /// registration cannot be written, or a thread cannot be spawned.
    pub fn connect(
        config: ClientConfig,
        engine: Arc<dyn ClientEngine>,
        loader: Arc<dyn TypeLoader>,
    ) -> Result<Self, ConnectError> {
        let ClientConfig {
            app,
            address,
            server,
            heartbeat_interval,
            connect_timeout,
        } = config;
        let stream = ClientStream::connect(&server, connect_timeout)?;
        let control = stream.try_clone().map_err(ConnectError::Stream)?;
        let read_half = stream.try_clone().map_err(ConnectError::Stream)?;
        let writer: SharedWriter = Arc::new(Mutex::new(FrameWriter::new(stream)));

        let init = Envelope::request(
            app,
            Payload::Init {
                address: address.clone(),
            },
        );
        send(&writer, &init).map_err(ConnectError::Register)?;
        info!(target: RUNTIME_TARGET, app, %address, %server, "registered with server");

        let connected = Arc::new(AtomicBool::new(true));
        let mut client = Self {
            app,
            address: address.clone(),
            control,
            connected: Arc::clone(&connected),
            stop: None,
            heartbeat: None,
            reader: None,
        };

        let service = ClientService::new(address.clone(), engine, loader);
        let reader_writer = Arc::clone(&writer);
        client.reader = Some(
            thread::Builder::new()
                .name("ice-client-reader".to_owned())
                .spawn(move || read_loop(read_half, &service, &reader_writer, &connected))
                .map_err(|source| ConnectError::Spawn {
                    thread: "reader",
                    source,
                })?,
        );

        let (stop_tx, stop_rx) = channel::bounded(0);
        let slap = Envelope::request(app, Payload::Slap { address });
        client.heartbeat = Some(
            thread::Builder::new()
                .name("ice-client-heartbeat".to_owned())
                .spawn(move || heartbeat_loop(&stop_rx, heartbeat_interval, &writer, &slap))
                .map_err(|source| ConnectError::Spawn {
                    thread: "heartbeat",
                    source,
                })?,
        );
        client.stop = Some(stop_tx);
        Ok(client)
    }

    /// App id this client registered under.
    pub fn app(&self) -> i32 {
        self.app
    }

    /// Address this client registered as.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns `false` once the server side of the stream has closed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Stops both threads and closes the stream.
    pub fn shutdown(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        drop(self.stop.take());
        if let Err(error) = self.control.shutdown()
            && error.kind() != io::ErrorKind::NotConnected
        {
            warn!(target: RUNTIME_TARGET, %error, "failed to close server stream");
        }
        for handle in [self.heartbeat.take(), self.reader.take()].into_iter().flatten() {
            if handle.join().is_err() {
                warn!(target: RUNTIME_TARGET, "client thread panicked");
            }
        }
    }
}

impl Drop for IceClient {
    fn drop(&mut self) {
        self.halt();
    }
}

fn read_loop(
    stream: ClientStream,
    service: &ClientService,
    writer: &SharedWriter,
    connected: &AtomicBool,
) {
    let mut reader = FrameReader::new(stream);
    loop {
        match reader.read_envelope() {
            Ok(Some(request)) => {
                if let Some(response) = service.handle(&request)
                    && let Err(error) = send(writer, &response)
                {
                    warn!(
                        target: RUNTIME_TARGET,
                        op = %response.op,
                        %error,
                        "failed to answer server"
                    );
                    break;
                }
            }
            Ok(None) => {
                debug!(target: RUNTIME_TARGET, "server closed the stream");
                break;
            }
            Err(error) if error.is_recoverable() => {
                warn!(target: RUNTIME_TARGET, %error, "skipping malformed frame");
            }
            Err(error) => {
                warn!(target: RUNTIME_TARGET, %error, "server stream failed");
                break;
            }
        }
    }
    connected.store(false, Ordering::Release);
    info!(
        target: RUNTIME_TARGET,
        address = service.address(),
        "disconnected from server"
    );
}

fn heartbeat_loop(
    stop: &Receiver<()>,
    interval: Duration,
    writer: &SharedWriter,
    slap: &Envelope,
) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(error) = send(writer, slap) {
                    warn!(target: RUNTIME_TARGET, %error, "heartbeat failed");
                    break;
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
