//! Request/response correlation over client channels.
//!
//! Every correlated request owns a one-slot rendezvous keyed by its id. The
//! slot is inserted before the request is written and removed by whichever
//! side finishes first: the waiter on timeout, or the reader on response.
//! A response arriving after its waiter gave up finds no slot and is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use ice_protocol::{Envelope, MessageKind, generate_request_id};
use tracing::debug;

use crate::channel::ClientChannel;
use crate::errors::ClientError;

const CORRELATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::correlation");

/// Table of requests awaiting a response.
#[derive(Debug, Default)]
pub struct PendingRequests {
    slots: Mutex<HashMap<String, Sender<Envelope>>>,
    closed: AtomicBool,
}

impl PendingRequests {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Sender<Envelope>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends `request` on `channel` and blocks until the matching response
    /// arrives or `timeout` elapses.
    ///
    /// A missing id is generated and the kind is forced to `REQ`.
    pub fn call(
        &self,
        channel: &dyn ClientChannel,
        mut request: Envelope,
        timeout: Duration,
    ) -> Result<Envelope, ClientError> {
        let id = match request.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_owned(),
            _ => generate_request_id(),
        };
        request.id = Some(id.clone());
        request.kind = MessageKind::Req;

        let (sender, receiver) = channel::bounded(1);
        {
            // `close` sets the flag before draining under this lock.
            let mut slots = self.slots();
            if self.closed.load(Ordering::SeqCst) {
                return Err(ClientError::internal("correlation engine is closed"));
            }
            slots.insert(id.clone(), sender);
        }

        if let Err(source) = channel.send(&request) {
            self.slots().remove(&id);
            return Err(ClientError::Send { id, source });
        }

        let outcome = receiver.recv_timeout(timeout);
        self.slots().remove(&id);
        match outcome {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                debug!(
                    target: CORRELATION_TARGET,
                    id = %id,
                    channel = %channel.id(),
                    op = %request.op,
                    "request timed out"
                );
                Err(ClientError::Timeout { id })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(ClientError::internal(format!("request {id} was cancelled")))
            }
        }
    }

    /// Hands `response` to its waiter. Returns `false` when nobody waits for
    /// that id any more.
    pub fn complete(&self, response: Envelope) -> bool {
        let Some(id) = response.id.clone() else {
            debug!(
                target: CORRELATION_TARGET,
                op = %response.op,
                "dropping response without id"
            );
            return false;
        };
        let Some(slot) = self.slots().remove(&id) else {
            debug!(
                target: CORRELATION_TARGET,
                id = %id,
                op = %response.op,
                "dropping response for unknown request"
            );
            return false;
        };
        slot.try_send(response).is_ok()
    }

    /// Wakes every waiter with an internal error.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.slots().drain().collect();
        if !drained.is_empty() {
            debug!(
                target: CORRELATION_TARGET,
                cancelled = drained.len(),
                "cancelled pending requests"
            );
        }
    }

    /// Refuses further calls and cancels the ones in flight.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel_all();
    }

    /// Number of requests currently waiting.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Returns `true` when no request is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
