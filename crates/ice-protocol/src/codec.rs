//! Line-delimited JSON framing for envelopes.
//!
//! Each envelope occupies exactly one line. Readers enforce a size limit per
//! frame so a misbehaving peer cannot make the server buffer without bound.

use std::io::{BufRead, BufReader, Read, Write};

use crate::envelope::Envelope;
use crate::errors::CodecError;

/// Upper bound on a single encoded envelope, excluding the newline.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Decodes envelopes from a byte stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: BufReader<R>,
    max_frame: usize,
}

impl<R: Read> FrameReader<R> {
    /// Wraps `reader` using [`MAX_FRAME_BYTES`] as the frame limit.
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_FRAME_BYTES)
    }

    /// Wraps `reader` with a custom frame limit.
    pub fn with_limit(reader: R, max_frame: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame,
        }
    }

    /// Reads the next envelope.
    ///
    /// Blank lines are skipped. Returns `Ok(None)` once the peer closes the
    /// stream; a final frame without a trailing newline is still decoded.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] when a frame exceeds the limit,
    /// [`CodecError::MalformedJson`] or [`CodecError::InvalidStructure`] when a
    /// frame cannot be decoded, and [`CodecError::Io`] when reading fails.
    pub fn read_envelope(&mut self) -> Result<Option<Envelope>, CodecError> {
        loop {
            let Some(frame) = self.read_frame()? else {
                return Ok(None);
            };
            let trimmed = trim_trailing_whitespace(&frame);
            if trimmed.is_empty() {
                continue;
            }
            let envelope: Envelope =
                serde_json::from_slice(trimmed).map_err(CodecError::from_json_error)?;
            envelope.validate()?;
            return Ok(Some(envelope));
        }
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        let mut buffer = Vec::new();
        let limit = u64::try_from(self.max_frame)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buffer)?;
        if read == 0 {
            return Ok(None);
        }
        if !buffer.ends_with(b"\n") && buffer.len() > self.max_frame {
            return Err(CodecError::frame_too_large(buffer.len(), self.max_frame));
        }
        Ok(Some(buffer))
    }
}

/// Encodes envelopes onto a byte stream.
#[derive(Debug)]
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Wraps an output stream.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one envelope as a single line and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing, or flushing fails.
    pub fn write_envelope(&mut self, envelope: &Envelope) -> Result<(), CodecError> {
        let mut line = serde_json::to_vec(envelope)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Borrows the wrapped stream.
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Trims trailing ASCII whitespace from a byte slice.
fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    bytes.get(..end).unwrap_or_default()
}
