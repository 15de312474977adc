//! [`ClientChannel`] over an accepted socket.

use std::io;
use std::sync::{Mutex, PoisonError};

use ice_protocol::{CodecError, Envelope, FrameWriter};
use tracing::debug;

use super::{ConnectionStream, LISTENER_TARGET};
use crate::channel::{ChannelId, ClientChannel};

/// Write side of one client connection.
#[derive(Debug)]
pub struct ServerChannel {
    id: ChannelId,
    peer: String,
    writer: Mutex<FrameWriter<ConnectionStream>>,
    control: ConnectionStream,
}

impl ServerChannel {
    /// Splits `stream` into a channel for writing and a handle for the
    /// reader loop.
    pub fn open(stream: ConnectionStream) -> io::Result<(Self, ConnectionStream)> {
        let read_half = stream.try_clone()?;
        let control = stream.try_clone()?;
        let channel = Self {
            id: ChannelId::next(),
            peer: stream.peer_label(),
            writer: Mutex::new(FrameWriter::new(stream)),
            control,
        };
        Ok((channel, read_half))
    }
}

impl ClientChannel for ServerChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn peer(&self) -> &str {
        &self.peer
    }

    fn send(&self, envelope: &Envelope) -> Result<(), CodecError> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_envelope(envelope)
    }

    fn close(&self) {
        // Never takes the writer lock.
        if let Err(error) = self.control.shutdown()
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(
                target: LISTENER_TARGET,
                channel = %self.id,
                error = %error,
                "failed to shut down client stream"
            );
        }
    }
}
