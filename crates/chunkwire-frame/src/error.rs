use std::io::ErrorKind;

/// Errors that can occur while sending or receiving messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed or reset the connection before a complete message was
    /// received, or the transport stopped accepting bytes.
    #[error("connection broken")]
    ConnectionBroken,

    /// No data, or not enough data, arrived within the allotted time.
    #[error("timed out waiting for the transport")]
    Timeout,

    /// A caller-supplied argument is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other I/O error reported by the transport.
    #[error("frame I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Error raised while configuring the transport.
    #[error("transport error: {0}")]
    Transport(#[from] chunkwire_transport::TransportError),
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => FrameError::Timeout,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => FrameError::ConnectionBroken,
            _ => FrameError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_failure_kinds() {
        let timeout = FrameError::from(std::io::Error::from(ErrorKind::WouldBlock));
        assert!(matches!(timeout, FrameError::Timeout));

        let timeout = FrameError::from(std::io::Error::from(ErrorKind::TimedOut));
        assert!(matches!(timeout, FrameError::Timeout));

        let broken = FrameError::from(std::io::Error::from(ErrorKind::ConnectionReset));
        assert!(matches!(broken, FrameError::ConnectionBroken));

        let broken = FrameError::from(std::io::Error::from(ErrorKind::BrokenPipe));
        assert!(matches!(broken, FrameError::ConnectionBroken));

        let other = FrameError::from(std::io::Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(other, FrameError::Io(e) if e.kind() == ErrorKind::PermissionDenied));
    }
}
