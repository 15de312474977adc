//! What ends [`run_server_with`](crate::run_server_with): an OS signal for
//! the binary, or a [`ShutdownTrigger`] for embedders and tests.

use std::io;

use crossbeam::channel::{self, Receiver, Sender};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level::signal_name;
use thiserror::Error;
use tracing::info;

const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shutdown");

/// Blocks the server's main thread until it should stop.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported while waiting for shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Signal handlers could not be registered.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Registration failure.
        #[source]
        source: io::Error,
    },
}

/// Stops on SIGTERM, SIGINT, SIGQUIT or SIGHUP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(
                target: SHUTDOWN_TARGET,
                signal = signal_name(signal).unwrap_or("unknown"),
                "shutdown signal received"
            );
        }
        Ok(())
    }
}

/// Stops when the paired [`ShutdownTrigger`] fires or is dropped.
#[derive(Debug)]
pub struct TriggeredShutdown {
    fired: Receiver<()>,
}

/// Requests shutdown of the server waiting on its [`TriggeredShutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    fire: Sender<()>,
}

impl TriggeredShutdown {
    /// Creates a signal and the trigger that releases it.
    #[must_use]
    pub fn new() -> (Self, ShutdownTrigger) {
        let (fire, fired) = channel::bounded(1);
        (Self { fired }, ShutdownTrigger { fire })
    }
}

impl ShutdownTrigger {
    /// Releases the waiting server. Firing twice is harmless.
    pub fn fire(&self) {
        if self.fire.try_send(()).is_ok() {
            info!(target: SHUTDOWN_TARGET, "shutdown requested");
        }
    }
}

impl ShutdownSignal for TriggeredShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        // A dropped trigger releases the wait as well.
        let _ = self.fired.recv();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn trigger_fired_before_waiting_is_not_lost() {
        let (signal, trigger) = TriggeredShutdown::new();
        trigger.fire();
        trigger.fire();
        signal.wait().expect("wait returns");
    }

    #[rstest]
    fn trigger_releases_a_blocked_waiter() {
        let (signal, trigger) = TriggeredShutdown::new();
        let waiter = thread::spawn(move || signal.wait());
        thread::sleep(Duration::from_millis(20));
        trigger.fire();
        waiter
            .join()
            .expect("waiter thread")
            .expect("wait returns");
    }

    #[rstest]
    fn dropping_the_trigger_releases_the_waiter() {
        let (signal, trigger) = TriggeredShutdown::new();
        drop(trigger);
        signal.wait().expect("wait returns");
    }
}
