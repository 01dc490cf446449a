use std::time::Duration;

use crate::error::{FrameError, Result};

/// Upper bound on the bytes requested from the transport per read: 4 KiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Configuration for a [`ChunkyStream`](crate::ChunkyStream).
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum bytes requested per transport read. Default: 4096.
    pub read_chunk_size: usize,
    /// Read timeout applied when wrapping a transport that supports timeouts.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied when wrapping a transport that supports timeouts.
    pub write_timeout: Option<Duration>,
    /// Leading bytes of each sent/received message to include in debug
    /// events. 0 disables the preview.
    pub log_preview_bytes: usize,
    /// Emit a trace event for every transport read.
    pub trace_chunks: bool,
}

impl FrameConfig {
    /// Check that the configuration can drive a stream.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(FrameError::InvalidArgument(
                "read_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_timeout: None,
            write_timeout: None,
            log_preview_bytes: 0,
            trace_chunks: false,
        }
    }
}
