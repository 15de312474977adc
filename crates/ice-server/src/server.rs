//! Assembles the running server and tears it down in order.

use std::io;
use std::sync::Arc;

use ice_config::{Config, SocketEndpoint};
use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::clock::{Clock, SystemClock};
use crate::health::{HealthReporter, Lifecycle, LogHealthReporter};
use crate::manager::ClientManager;
use crate::reaper::Reaper;
use crate::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::transport::{ClientConnectionHandler, ListenerError, ListenerHandle, SocketListener};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The client listener could not start or stopped abnormally.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// The reaper thread could not start.
    #[error("failed to start reaper: {source}")]
    Reaper {
        /// Spawn failure.
        #[source]
        source: io::Error,
    },
    /// Waiting for a termination signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// A running server: listener, reaper and request facade.
#[derive(Debug)]
pub struct IceServer {
    manager: Arc<ClientManager>,
    listener: Option<ListenerHandle>,
    reaper: Option<Reaper>,
    endpoint: SocketEndpoint,
}

impl IceServer {
    /// Binds the listener and starts the background threads.
    pub fn start(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, ServerError> {
        let manager = Arc::new(ClientManager::new(
            Arc::clone(&clock),
            config.pool(),
            config.client_rsp_timeout(),
        ));
        let listener = SocketListener::bind(config.listen_socket())?;
        let endpoint = listener.bound_endpoint();
        let reaper = Reaper::spawn(
            Arc::clone(manager.registry()),
            clock,
            config.client_expire(),
            config.reap_interval(),
        )
        .map_err(|source| ServerError::Reaper { source })?;
        let handler = Arc::new(ClientConnectionHandler::new(Arc::clone(&manager)));
        let listener = listener.start(handler)?;
        Ok(Self {
            manager,
            listener: Some(listener),
            reaper: Some(reaper),
            endpoint,
        })
    }

    /// Request facade for the embedding application.
    pub fn manager(&self) -> &Arc<ClientManager> {
        &self.manager
    }

    /// Endpoint clients connect to.
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Stops the listener, then the reaper, then refuses pending calls and
    /// drains the release pool.
    pub fn stop(mut self) -> Result<(), ServerError> {
        self.halt()
    }

    fn halt(&mut self) -> Result<(), ServerError> {
        let joined = match self.listener.take() {
            Some(listener) => {
                listener.shutdown();
                listener.join()
            }
            None => Ok(()),
        };
        if let Some(reaper) = self.reaper.take() {
            reaper.stop();
        }
        self.manager.shutdown();
        joined.map_err(ServerError::from)
    }
}

impl Drop for IceServer {
    fn drop(&mut self) {
        if self.listener.is_some() {
            let _ = self.halt();
        }
    }
}

/// Runs the server with production collaborators until a termination
/// signal arrives.
pub fn run_server() -> Result<(), ServerError> {
    run_server_with(&SystemConfigLoader, &LogHealthReporter, &SystemShutdownSignal)
}

/// Runs the server with injected collaborators.
pub fn run_server_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), ServerError> {
    let bootstrapped = bootstrap_with(loader, reporter)?;
    let config = bootstrapped.into_config();
    let server = IceServer::start(&config, Arc::new(SystemClock))?;
    reporter.report(Lifecycle::Listening(server.endpoint()));

    let waited = shutdown.wait();
    reporter.report(Lifecycle::Stopping);
    let in_flight = server.manager().in_flight();
    let stopped = server.stop();
    if in_flight > 0 {
        info!(target: SERVER_TARGET, in_flight, "refused requests still awaiting clients");
    }
    reporter.report(Lifecycle::Stopped);
    waited?;
    stopped
}
