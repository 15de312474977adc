//! In-memory [`ClientChannel`] that records what the server sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use ice_protocol::{CodecError, Envelope};

use crate::channel::{ChannelId, ClientChannel};

/// Callback run on every successful send, after the envelope is recorded.
pub type SendHook = Box<dyn Fn(&Envelope) + Send + Sync>;

/// Channel double. Sends are recorded; a hook may answer them.
pub struct RecordingChannel {
    id: ChannelId,
    peer: String,
    sent: Mutex<Vec<Envelope>>,
    closed: AtomicBool,
    failing: AtomicBool,
    hook: Mutex<Option<SendHook>>,
}

impl std::fmt::Debug for RecordingChannel {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RecordingChannel")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId::next(),
            peer: "memory".to_owned(),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            hook: Mutex::new(None),
        })
    }

    /// Upcasts for registry calls.
    pub fn handle(self: &Arc<Self>) -> Arc<dyn ClientChannel> {
        Arc::clone(self) as Arc<dyn ClientChannel>
    }

    pub fn set_hook(&self, hook: SendHook) {
        *self.hook.lock().expect("hook mutex poisoned") = Some(hook);
    }

    /// Makes every following send fail with an IO error.
    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Polls until at least `count` envelopes were sent or two seconds pass.
    pub fn wait_for_sent(&self, count: usize) -> Vec<Envelope> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let sent = self.sent();
            if sent.len() >= count || Instant::now() >= deadline {
                return sent;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl ClientChannel for RecordingChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn peer(&self) -> &str {
        &self.peer
    }

    fn send(&self, envelope: &Envelope) -> Result<(), CodecError> {
        if self.failing.load(Ordering::SeqCst) || self.is_closed() {
            return Err(CodecError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "channel closed",
            )));
        }
        self.sent
            .lock()
            .expect("sent mutex poisoned")
            .push(envelope.clone());
        if let Some(hook) = self.hook.lock().expect("hook mutex poisoned").as_ref() {
            hook(envelope);
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
