//! Bounded worker pool for update fan-out.
//!
//! Submission follows a fixed ladder: start a core worker if fewer than
//! `core_size` are running, else enqueue, else start an extra worker if
//! fewer than `max_size` are running, else run the task on the submitting
//! thread. Extra workers retire after `keep_alive` without work.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use ice_config::PoolSettings;
use tracing::{debug, warn};

const RELEASE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::release");

/// Unit of work run by the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a submitted task ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to a freshly started worker.
    Worker,
    /// Placed on the queue.
    Queued,
    /// Ran to completion on the submitting thread.
    CallerRan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Core,
    Extra,
}

#[derive(Default)]
struct State {
    sender: Option<Sender<Task>>,
    workers: usize,
    handles: Vec<JoinHandle<()>>,
}

struct Shared {
    settings: PoolSettings,
    receiver: Receiver<Task>,
    state: Mutex<State>,
    spawned: AtomicUsize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide pool that runs release tasks.
pub struct ReleasePool {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ReleasePool {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReleasePool")
            .field("settings", &self.shared.settings)
            .field("workers", &self.worker_count())
            .finish_non_exhaustive()
    }
}

impl ReleasePool {
    /// Creates a pool with no running workers.
    pub fn new(settings: PoolSettings) -> Self {
        let (sender, receiver) = channel::bounded(settings.queue_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                settings,
                receiver,
                state: Mutex::new(State {
                    sender: Some(sender),
                    ..State::default()
                }),
                spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// Submits `task`. Never blocks on a full queue; the caller runs the
    /// task instead.
    pub fn execute(&self, task: Task) -> Dispatch {
        let mut state = self.shared.state();
        let Some(sender) = state.sender.clone() else {
            drop(state);
            run_guarded(task);
            return Dispatch::CallerRan;
        };
        let settings = self.shared.settings;

        let task = if state.workers < settings.core_size {
            match self.spawn_worker(&mut state, Role::Core, task) {
                Ok(()) => return Dispatch::Worker,
                Err(task) => task,
            }
        } else {
            task
        };

        let task = match sender.try_send(task) {
            Ok(()) => {
                if state.workers == 0
                    && let Err(idle) = self.spawn_idle_worker(&mut state)
                {
                    warn!(target: RELEASE_TARGET, error = %idle, "failed to start release worker");
                }
                return Dispatch::Queued;
            }
            Err(TrySendError::Full(task) | TrySendError::Disconnected(task)) => task,
        };

        let task = if state.workers < settings.max_size {
            match self.spawn_worker(&mut state, Role::Extra, task) {
                Ok(()) => return Dispatch::Worker,
                Err(task) => task,
            }
        } else {
            task
        };

        drop(state);
        debug!(target: RELEASE_TARGET, "release pool saturated; running on caller");
        run_guarded(task);
        Dispatch::CallerRan
    }

    fn spawn_worker(&self, state: &mut State, role: Role, task: Task) -> Result<(), Task> {
        // The task stays reachable here if the thread fails to start.
        let slot = Arc::new(Mutex::new(Some(task)));
        let handoff = Arc::clone(&slot);
        match self.spawn_thread(state, role, move || take_task(&handoff)) {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(target: RELEASE_TARGET, error = %error, "failed to start release worker");
                take_task(&slot).map_or(Ok(()), Err)
            }
        }
    }

    fn spawn_idle_worker(&self, state: &mut State) -> std::io::Result<()> {
        self.spawn_thread(state, Role::Extra, || None)
    }

    fn spawn_thread(
        &self,
        state: &mut State,
        role: Role,
        first: impl FnOnce() -> Option<Task> + Send + 'static,
    ) -> std::io::Result<()> {
        state.handles.retain(|handle| !handle.is_finished());
        let number = self.shared.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("ice-release-{number}"))
            .spawn(move || worker_loop(&shared, role, first()))?;
        state.workers += 1;
        state.handles.push(handle);
        Ok(())
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.shared.state().workers
    }

    /// Stops accepting queued work, lets workers drain the queue, and waits
    /// for them to exit. Later submissions run on the caller.
    pub fn shutdown(&self) {
        let handles = {
            let mut state = self.shared.state();
            state.sender = None;
            std::mem::take(&mut state.handles)
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!(target: RELEASE_TARGET, "release worker panicked");
            }
        }
    }
}

impl Drop for ReleasePool {
    fn drop(&mut self) {
        self.shared.state().sender = None;
    }
}

fn worker_loop(shared: &Shared, role: Role, first: Option<Task>) {
    if let Some(task) = first {
        run_guarded(task);
    }
    loop {
        let next = match role {
            Role::Core => shared.receiver.recv().ok(),
            Role::Extra => match shared.receiver.recv_timeout(shared.settings.keep_alive) {
                Ok(task) => Some(task),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
            },
        };
        match next {
            Some(task) => run_guarded(task),
            None if retire(shared) => break,
            None => {}
        }
    }
}

/// Deregisters a worker whose wait ended. The last worker stays while work
/// is queued; `execute` only spawns a replacement when it sees no workers.
fn retire(shared: &Shared) -> bool {
    let mut state = shared.state();
    if state.workers == 1 && state.sender.is_some() && !shared.receiver.is_empty() {
        return false;
    }
    state.workers = state.workers.saturating_sub(1);
    true
}

fn take_task(slot: &Mutex<Option<Task>>) -> Option<Task> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

fn run_guarded(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        warn!(target: RELEASE_TARGET, "release task panicked");
    }
}
