//! Message framing over a blocking byte stream.
//!
//! A [`ChunkyStream`] wraps one connected transport and turns its
//! unstructured, possibly fragmented byte stream into discrete messages:
//! - [`ChunkyStream::recv`] returns exactly N bytes
//! - [`ChunkyStream::recv_to_separator`] returns the bytes preceding a
//!   caller-chosen multi-byte [`Separator`]
//! - [`ChunkyStream::send`] writes a whole message, looping on short writes
//!
//! Bytes read past the end of the current message are held back and served
//! first by the next receive call, so nothing is reordered or lost.

pub mod config;
pub mod error;
pub mod reader;
pub mod separator;
pub mod stream;
pub mod writer;

pub use config::{FrameConfig, DEFAULT_READ_CHUNK_SIZE};
pub use error::{FrameError, Result};
pub use separator::{find_separator, resume_offset, Separator, DEMO_SEPARATOR};
pub use stream::ChunkyStream;
