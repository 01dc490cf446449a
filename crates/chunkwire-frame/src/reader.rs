use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use chunkwire_transport::StreamTimeouts;
use tracing::{debug, trace};

use crate::error::{FrameError, Result};
use crate::separator::{find_separator, resume_offset, Separator};
use crate::stream::{ChunkyStream, Escaped};

impl<T: Read> ChunkyStream<T> {
    /// Receive exactly `length` bytes using the transport's current timeout.
    ///
    /// Read-ahead bytes from a previous call count toward `length`. Surplus
    /// bytes stay in the backlog for the next call. If the call fails, the
    /// bytes it already accumulated go back into the backlog, so a retry
    /// resumes where this one stopped.
    pub fn recv_exact(&mut self, length: usize) -> Result<Bytes> {
        self.config.validate()?;
        if length == 0 {
            return Ok(Bytes::new());
        }

        let span = self.span.clone();
        let _entered = span.enter();

        let mut accumulated = self.backlog.take().unwrap_or_default();
        while accumulated.len() < length {
            let want = (length - accumulated.len()).min(self.config.read_chunk_size);
            if let Err(err) = self.read_chunk(&mut accumulated, want) {
                debug!(
                    error = %err,
                    received = accumulated.len(),
                    length,
                    "recv failed, keeping partial message as backlog"
                );
                self.defer(accumulated);
                return Err(err);
            }
        }

        let message = accumulated.split_to(length).freeze();
        self.defer(accumulated);

        if let Some(preview) = self.preview(&message) {
            debug!(message = ?preview, "<--");
        }
        Ok(message)
    }

    /// Receive the bytes preceding the next occurrence of `separator`.
    ///
    /// The separator itself is consumed and discarded; whatever follows it
    /// in the same read stays in the backlog. Only the first occurrence
    /// counts, there is no escaping.
    pub fn recv_to_separator(&mut self, separator: &Separator) -> Result<Bytes> {
        self.config.validate()?;

        let span = self.span.clone();
        let _entered = span.enter();
        debug!(%separator, "recv_to_separator");

        let mut accumulated = BytesMut::new();
        let mut search_from = 0usize;
        loop {
            if let Some(backlog) = self.backlog.take() {
                if self.config.trace_chunks {
                    trace!(chunk = ?Escaped(&backlog), "backlog chunk");
                }
                accumulated.unsplit(backlog);
            } else {
                let want = self.config.read_chunk_size;
                if let Err(err) = self.read_chunk(&mut accumulated, want) {
                    debug!(
                        error = %err,
                        received = accumulated.len(),
                        "recv_to_separator failed, keeping partial message as backlog"
                    );
                    self.defer(accumulated);
                    return Err(err);
                }
            }

            if let Some(index) = find_separator(&accumulated, separator.as_bytes(), search_from) {
                let message = accumulated.split_to(index).freeze();
                accumulated.advance(separator.len());
                if self.config.trace_chunks {
                    trace!(bytes = accumulated.len(), "backlog");
                }
                self.defer(accumulated);

                if let Some(preview) = self.preview(&message) {
                    debug!(message = ?preview, "<--");
                }
                return Ok(message);
            }

            search_from = resume_offset(accumulated.len(), separator.len());
        }
    }

    /// Append one transport read of at most `want` bytes to `accumulated`.
    ///
    /// A zero-byte read means the peer closed the stream.
    fn read_chunk(&mut self, accumulated: &mut BytesMut, want: usize) -> Result<()> {
        let start = accumulated.len();
        accumulated.resize(start + want, 0);

        let outcome = loop {
            match self.inner.read(&mut accumulated[start..]) {
                Ok(read) => break Ok(read),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => break Err(FrameError::from(err)),
            }
        };

        let read = match outcome {
            Ok(read) => read,
            Err(err) => {
                accumulated.truncate(start);
                return Err(err);
            }
        };
        accumulated.truncate(start + read);

        if self.config.trace_chunks {
            trace!(requested = want, chunk = ?Escaped(&accumulated[start..]), "transport read");
        }

        if read == 0 {
            return Err(FrameError::ConnectionBroken);
        }
        Ok(())
    }
}

impl<T: Read + StreamTimeouts> ChunkyStream<T> {
    /// Receive exactly `length` bytes, waiting at most `timeout` for each
    /// transport read (`None` blocks).
    ///
    /// The transport's previous read timeout is restored afterwards. On
    /// [`FrameError::Timeout`] the bytes received so far are kept in the
    /// backlog rather than dropped.
    pub fn recv(&mut self, length: usize, timeout: Option<Duration>) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        if timeout == Some(Duration::ZERO) {
            return Err(FrameError::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let previous = self.inner.read_timeout()?;
        self.inner.set_read_timeout(timeout)?;
        let received = self.recv_exact(length);
        let restored = self.inner.set_read_timeout(previous);

        let message = received?;
        restored?;
        Ok(message)
    }
}
