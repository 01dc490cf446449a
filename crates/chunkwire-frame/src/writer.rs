use std::io::{ErrorKind, Write};

use tracing::debug;

use crate::error::{FrameError, Result};
use crate::stream::ChunkyStream;

impl<T: Write> ChunkyStream<T> {
    /// Write all of `message` to the transport and flush it.
    ///
    /// Short writes are continued until every byte is accepted. Framing is
    /// the caller's job: append the separator before calling this when the
    /// receiver reads with [`recv_to_separator`](Self::recv_to_separator).
    ///
    /// Returns the number of bytes sent, which is always `message.len()`.
    pub fn send(&mut self, message: &[u8]) -> Result<usize> {
        let span = self.span.clone();
        let _entered = span.enter();

        let mut sent = 0usize;
        while sent < message.len() {
            match self.inner.write(&message[sent..]) {
                Ok(0) => {
                    debug!(sent, total = message.len(), "transport accepted zero bytes");
                    return Err(FrameError::ConnectionBroken);
                }
                Ok(n) => sent += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        self.flush()?;

        if let Some(preview) = self.preview(message) {
            debug!(message = ?preview, "-->");
        }
        Ok(sent)
    }

    /// Flush the underlying transport.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}
