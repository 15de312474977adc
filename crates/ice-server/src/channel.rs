//! Handles to connected clients.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ice_protocol::{CodecError, Envelope};

/// Process-unique identity of a client channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocates the next id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "ch-{}", self.0)
    }
}

/// A persistent bidirectional connection to one client.
///
/// Implementations serialize concurrent `send` calls so frames never
/// interleave on the wire.
pub trait ClientChannel: Send + Sync + fmt::Debug {
    /// Identity used as the registry key.
    fn id(&self) -> ChannelId;

    /// Transport-level peer label, used in logs.
    fn peer(&self) -> &str;

    /// Writes one envelope to the client.
    fn send(&self, envelope: &Envelope) -> Result<(), CodecError>;

    /// Closes the underlying transport. Further sends fail.
    fn close(&self);
}
