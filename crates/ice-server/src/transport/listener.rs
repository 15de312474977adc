//! Listener for the client-facing socket.
//!
//! Accepts block. Stopping raises a flag and then opens one throwaway
//! connection to the bound address, so the pending accept returns and the
//! loop sees the flag.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ice_config::SocketEndpoint;
use tracing::{debug, info, warn};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use camino::Utf8Path;
#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Bound {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Bound {
    fn accept(&self) -> io::Result<ConnectionStream> {
        match self {
            Self::Tcp(listener) => {
                let (stream, _) = listener.accept()?;
                stream.set_nodelay(true)?;
                Ok(ConnectionStream::Tcp(stream))
            }
            #[cfg(unix)]
            Self::Unix(listener) => listener
                .accept()
                .map(|(stream, _)| ConnectionStream::Unix(stream)),
        }
    }
}

/// Where a stopping listener sends its wake-up connection.
#[derive(Debug, Clone)]
enum WakeTarget {
    Tcp(SocketAddr),
    #[cfg(unix)]
    Unix(camino::Utf8PathBuf),
}

impl WakeTarget {
    fn poke(&self) {
        let outcome = match self {
            Self::Tcp(addr) => TcpStream::connect_timeout(addr, WAKE_TIMEOUT).map(drop),
            #[cfg(unix)]
            Self::Unix(path) => UnixStream::connect(path.as_std_path()).map(drop),
        };
        if let Err(error) = outcome {
            warn!(target: LISTENER_TARGET, %error, "failed to wake the accept loop");
        }
    }
}

/// Listener bound to the client endpoint, not yet accepting.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    bound: Bound,
}

impl SocketListener {
    /// Binds `endpoint`.
    ///
    /// A unix socket file left behind by a dead server is reclaimed. One that
    /// still answers is reported as [`ListenerError::UnixInUse`].
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let bound = match endpoint {
            SocketEndpoint::Tcp { host, port } => Bound::Tcp(bind_tcp(endpoint, host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => Bound::Unix(bind_unix(endpoint, path)?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::Unsupported {
                    endpoint: endpoint.clone(),
                });
            }
        };
        let endpoint = match (endpoint, &bound) {
            (SocketEndpoint::Tcp { host, .. }, Bound::Tcp(listener)) => {
                match listener.local_addr() {
                    Ok(addr) => SocketEndpoint::tcp(host.clone(), addr.port()),
                    Err(_) => endpoint.clone(),
                }
            }
            _ => endpoint.clone(),
        };
        Ok(Self { endpoint, bound })
    }

    /// Bound TCP address; `None` for unix sockets.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.bound {
            Bound::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Bound::Unix(_) => None,
        }
    }

    /// Endpoint actually bound; a TCP port of `0` is replaced by the port the
    /// kernel assigned.
    pub fn bound_endpoint(&self) -> SocketEndpoint {
        self.endpoint.clone()
    }

    fn wake_target(&self) -> WakeTarget {
        match (&self.bound, &self.endpoint) {
            #[cfg(unix)]
            (Bound::Unix(_), SocketEndpoint::Unix { path }) => WakeTarget::Unix(path.clone()),
            _ => {
                let addr = self
                    .local_addr()
                    .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));
                WakeTarget::Tcp(loopback_for(addr))
            }
        }
    }

    /// Starts accepting on a background thread. Every accepted stream is
    /// handed to `handler` on its own thread.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        let stopping = Arc::new(AtomicBool::new(false));
        let wake = self.wake_target();
        let flag = Arc::clone(&stopping);
        let accept_thread = thread::Builder::new()
            .name("ice-listener".to_owned())
            .spawn(move || self.serve(&flag, &handler))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            stopping,
            wake,
            thread: Some(accept_thread),
        })
    }

    fn serve(self, stopping: &AtomicBool, handler: &Arc<dyn ConnectionHandler>) {
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "client listener active");
        let mut accepted: u64 = 0;
        let mut failing = false;
        loop {
            let outcome = self.bound.accept();
            if stopping.load(Ordering::Acquire) {
                break;
            }
            match outcome {
                Ok(stream) => {
                    failing = false;
                    accepted += 1;
                    let handler = Arc::clone(handler);
                    if let Err(error) = thread::Builder::new()
                        .name(format!("ice-conn-{accepted}"))
                        .spawn(move || handler.handle(stream))
                    {
                        warn!(
                            target: LISTENER_TARGET,
                            %error,
                            "failed to spawn connection thread"
                        );
                    }
                }
                Err(error) => {
                    if !failing {
                        warn!(target: LISTENER_TARGET, %error, "accept failed");
                    }
                    failing = true;
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            accepted,
            "client listener stopped"
        );
        self.release();
    }

    fn release(self) {
        #[cfg(unix)]
        if let SocketEndpoint::Unix { path } = &self.endpoint {
            drop(self.bound);
            if let Err(error) = fs::remove_file(path.as_std_path())
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: LISTENER_TARGET,
                    %error,
                    %path,
                    "failed to remove unix socket file"
                );
            }
        }
    }
}

/// Handle to the accept thread.
#[derive(Debug)]
pub struct ListenerHandle {
    stopping: Arc<AtomicBool>,
    wake: WakeTarget,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stops accepting. Connections already accepted stay open.
    pub fn shutdown(&self) {
        if !self.stopping.swap(true, Ordering::AcqRel) {
            debug!(target: LISTENER_TARGET, "waking the accept loop");
            self.wake.poke();
        }
    }

    /// Waits for the accept thread to exit.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.thread.take() {
            Some(accept_thread) => accept_thread
                .join()
                .map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Unspecified bind addresses are not connectable everywhere; aim the wake-up
/// at loopback instead.
fn loopback_for(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

fn bind_tcp(
    endpoint: &SocketEndpoint,
    host: &str,
    port: u16,
) -> Result<TcpListener, ListenerError> {
    let resolve_failed = |source| ListenerError::Resolve {
        endpoint: endpoint.clone(),
        source,
    };
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(resolve_failed)?
        .next()
        .ok_or_else(|| {
            resolve_failed(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no addresses resolved",
            ))
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.clone(),
        source,
    })
}

#[cfg(unix)]
fn bind_unix(endpoint: &SocketEndpoint, path: &Utf8Path) -> Result<UnixListener, ListenerError> {
    let bind_failed = |source| ListenerError::Bind {
        endpoint: endpoint.clone(),
        source,
    };
    match UnixListener::bind(path.as_std_path()) {
        Ok(listener) => return Ok(listener),
        Err(error) if error.kind() == io::ErrorKind::AddrInUse => {}
        Err(error) => return Err(bind_failed(error)),
    }

    let stale = |source| ListenerError::StaleSocket {
        path: path.to_path_buf(),
        source,
    };
    let metadata = fs::symlink_metadata(path.as_std_path()).map_err(stale)?;
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::UnixNotSocket {
            path: path.to_path_buf(),
        });
    }
    if UnixStream::connect(path.as_std_path()).is_ok() {
        return Err(ListenerError::UnixInUse {
            path: path.to_path_buf(),
        });
    }
    info!(target: LISTENER_TARGET, %path, "reclaiming stale unix socket");
    fs::remove_file(path.as_std_path()).map_err(stale)?;
    UnixListener::bind(path.as_std_path()).map_err(bind_failed)
}
