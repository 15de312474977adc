//! Background sweep that drops clients which stopped sending heartbeats.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::registry::ClientRegistry;

const REAPER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reaper");

/// Removes and closes every channel not seen within `expire`. Returns how
/// many were removed.
pub fn sweep(registry: &ClientRegistry, clock: &dyn Clock, expire: Duration) -> usize {
    let expire_ms = u64::try_from(expire.as_millis()).unwrap_or(u64::MAX);
    let cutoff = clock.now_millis().saturating_sub(expire_ms);
    let reaped = registry.reap(cutoff);
    for entry in &reaped {
        entry.channel.close();
    }
    reaped.len()
}

/// Handle to the running reaper thread.
#[derive(Debug)]
pub struct Reaper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Starts sweeping every `interval`.
    pub fn spawn(
        registry: Arc<ClientRegistry>,
        clock: Arc<dyn Clock>,
        expire: Duration,
        interval: Duration,
    ) -> io::Result<Self> {
        let (stop, stopped) = channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("ice-reaper".to_owned())
            .spawn(move || {
                info!(
                    target: REAPER_TARGET,
                    expire_ms = u64::try_from(expire.as_millis()).unwrap_or(u64::MAX),
                    interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                    "reaper started"
                );
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let removed = sweep(&registry, clock.as_ref(), expire);
                            if removed > 0 {
                                debug!(target: REAPER_TARGET, removed, "reaped stale clients");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(target: REAPER_TARGET, "reaper stopped");
            })?;
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stops the sweep and waits for the thread.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(target: REAPER_TARGET, "reaper thread panicked");
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.halt();
    }
}
