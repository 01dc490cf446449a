use std::fmt;

use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Separator used by the bundled demo: `00 01 02 01 00`.
pub const DEMO_SEPARATOR: [u8; 5] = [0x00, 0x01, 0x02, 0x01, 0x00];

/// A non-empty byte sequence that terminates each message on the wire.
///
/// There is no escaping: payloads must never contain the separator.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Separator(Bytes);

impl Separator {
    /// Create a separator, rejecting the empty sequence.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(FrameError::InvalidArgument(
                "separator must not be empty".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    /// Parse a separator from hex text such as `"0001020100"`.
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim()).map_err(|err| {
            FrameError::InvalidArgument(format!("separator is not valid hex: {err}"))
        })?;
        Self::new(bytes)
    }

    /// The separator used by the bundled demo.
    pub fn demo() -> Self {
        Self(Bytes::from_static(&DEMO_SEPARATOR))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed separator.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `message` followed by the separator, ready to pass to `send`.
    pub fn terminate(&self, message: &[u8]) -> Vec<u8> {
        let mut wire = Vec::with_capacity(message.len() + self.len());
        wire.extend_from_slice(message);
        wire.extend_from_slice(&self.0);
        wire
    }
}

impl AsRef<[u8]> for Separator {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Separator({self})")
    }
}

/// Offset of the first occurrence of `separator` in `haystack` at or after
/// `from`.
pub fn find_separator(haystack: &[u8], separator: &[u8], from: usize) -> Option<usize> {
    if separator.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(separator.len())
        .position(|window| window == separator)
        .map(|pos| from + pos)
}

/// Where the next search must start after `accumulated_len` bytes held no
/// separator.
///
/// The last `separator_len - 1` bytes are searched again because a separator
/// may straddle the boundary between this chunk and the next one.
pub fn resume_offset(accumulated_len: usize, separator_len: usize) -> usize {
    accumulated_len.saturating_sub(separator_len.saturating_sub(1))
}
