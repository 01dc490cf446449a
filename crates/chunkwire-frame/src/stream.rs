use std::fmt;

use bytes::{Bytes, BytesMut};
use chunkwire_transport::{Connection, StreamTimeouts};
use tracing::Span;

use crate::config::FrameConfig;
use crate::error::Result;

/// Sends and receives discrete messages over one byte-stream transport.
///
/// The stream exclusively owns its transport and a single backlog buffer
/// holding bytes that were read ahead of the message currently being
/// returned. The backlog is only ever consumed and refilled by the receive
/// operations; callers can inspect its length but never write to it.
///
/// Not meant for concurrent use: give each connection its own instance.
pub struct ChunkyStream<T> {
    pub(crate) inner: T,
    pub(crate) backlog: Option<BytesMut>,
    pub(crate) config: FrameConfig,
    pub(crate) span: Span,
}

impl<T> ChunkyStream<T> {
    /// Wrap a transport with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Wrap a transport with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            backlog: None,
            config,
            span: Span::none(),
        }
    }

    /// Emit all events of this stream inside `span`.
    ///
    /// This is how a caller names the stream in its logs, e.g.
    /// `info_span!("server", peer = %addr)`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Number of read-ahead bytes waiting to be served by the next receive.
    pub fn backlog_len(&self) -> usize {
        self.backlog.as_ref().map_or(0, BytesMut::len)
    }

    /// Current stream configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the stream, returning the transport and any unconsumed
    /// read-ahead bytes.
    pub fn into_parts(self) -> (T, Bytes) {
        let backlog = self.backlog.map(BytesMut::freeze).unwrap_or_default();
        (self.inner, backlog)
    }

    /// Hand read-ahead bytes back to the stream for the next receive.
    pub(crate) fn defer(&mut self, remainder: BytesMut) {
        debug_assert!(self.backlog.is_none(), "backlog replaced before consumed");
        self.backlog = if remainder.is_empty() {
            None
        } else {
            Some(remainder)
        };
    }

    /// Leading bytes of `message` for debug events, if previews are enabled.
    pub(crate) fn preview<'a>(&self, message: &'a [u8]) -> Option<Escaped<'a>> {
        match self.config.log_preview_bytes {
            0 => None,
            n => Some(Escaped(&message[..n.min(message.len())])),
        }
    }
}

impl<T: StreamTimeouts> ChunkyStream<T> {
    /// Wrap a transport and apply the configured read and write timeouts.
    pub fn with_config_timeouts(inner: T, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        inner.set_read_timeout(config.read_timeout)?;
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

impl ChunkyStream<Connection> {
    /// Shut down and close the connection.
    ///
    /// Unconsumed read-ahead bytes are discarded.
    pub fn close(self) -> Result<()> {
        let _entered = self.span.enter();
        if let Some(backlog) = &self.backlog {
            tracing::debug!(bytes = backlog.len(), "discarding backlog on close");
        }
        self.inner.shutdown()?;
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for ChunkyStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkyStream")
            .field("inner", &self.inner)
            .field("backlog_len", &self.backlog_len())
            .field("config", &self.config)
            .finish()
    }
}

/// Renders bytes as an escaped byte-string literal, e.g. `b"ab\x00"`.
pub(crate) struct Escaped<'a>(pub(crate) &'a [u8]);

impl fmt::Debug for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("b\"")?;
        for &byte in self.0 {
            write!(f, "{}", std::ascii::escape_default(byte))?;
        }
        f.write_str("\"")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;
    use crate::error::FrameError;

    #[test]
    fn accessors_and_into_parts() {
        let mut stream = ChunkyStream::new(Cursor::new(Vec::<u8>::new()));

        assert_eq!(stream.backlog_len(), 0);
        assert_eq!(stream.config().read_chunk_size, 4096);
        stream.get_mut().get_mut().extend_from_slice(b"ab");
        assert_eq!(stream.get_ref().get_ref().as_slice(), b"ab");
        assert_eq!(stream.get_ref().position(), 0);

        let (_inner, backlog) = stream.into_parts();
        assert!(backlog.is_empty());
    }

    #[test]
    fn defer_drops_empty_remainder() {
        let mut stream = ChunkyStream::new(Cursor::new(Vec::<u8>::new()));
        stream.defer(BytesMut::new());
        assert!(stream.backlog.is_none());

        stream.defer(BytesMut::from(&b"xy"[..]));
        assert_eq!(stream.backlog_len(), 2);
        let (_, backlog) = stream.into_parts();
        assert_eq!(backlog.as_ref(), b"xy");
    }

    #[test]
    fn escaped_preview_format() {
        let rendered = format!("{:?}", Escaped(b"de\x00\"\n"));
        assert_eq!(rendered, "b\"de\\x00\\\"\\n\"");
    }

    #[test]
    fn preview_respects_config() {
        let stream = ChunkyStream::new(Cursor::new(Vec::<u8>::new()));
        assert!(stream.preview(b"abcdef").is_none());

        let cfg = FrameConfig {
            log_preview_bytes: 3,
            ..FrameConfig::default()
        };
        let stream = ChunkyStream::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        let rendered = format!("{:?}", stream.preview(b"abcdef").unwrap());
        assert_eq!(rendered, "b\"abc\"");
        let rendered = format!("{:?}", stream.preview(b"a").unwrap());
        assert_eq!(rendered, "b\"a\"");
    }

    #[derive(Debug, Default)]
    struct RecordingTimeouts {
        read: Cell<Option<Duration>>,
        write: Cell<Option<Duration>>,
    }

    impl StreamTimeouts for RecordingTimeouts {
        fn read_timeout(&self) -> std::io::Result<Option<Duration>> {
            Ok(self.read.get())
        }

        fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
            self.read.set(timeout);
            Ok(())
        }

        fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
            self.write.set(timeout);
            Ok(())
        }
    }

    #[test]
    fn with_config_timeouts_applies_both_directions() {
        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(20)),
            write_timeout: Some(Duration::from_millis(30)),
            ..FrameConfig::default()
        };
        let stream = ChunkyStream::with_config_timeouts(RecordingTimeouts::default(), cfg).unwrap();

        assert_eq!(stream.get_ref().read.get(), Some(Duration::from_millis(20)));
        assert_eq!(stream.get_ref().write.get(), Some(Duration::from_millis(30)));
    }

    #[test]
    fn with_config_timeouts_rejects_invalid_config() {
        let cfg = FrameConfig {
            read_chunk_size: 0,
            ..FrameConfig::default()
        };
        let err = ChunkyStream::with_config_timeouts(RecordingTimeouts::default(), cfg).unwrap_err();
        assert!(matches!(err, FrameError::InvalidArgument(_)));
    }

    #[test]
    fn close_shuts_down_connection() {
        let server =
            chunkwire_transport::TcpServer::bind_and_listen("127.0.0.1:0", 1, None).unwrap();
        let client = chunkwire_transport::connect(&server.local_addr().to_string(), None).unwrap();
        let (accepted, _) = server.accept().unwrap();

        let stream = ChunkyStream::new(client);
        stream.close().unwrap();

        let mut peer = ChunkyStream::new(accepted);
        let err = peer.recv_exact(1).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionBroken));
    }
}
