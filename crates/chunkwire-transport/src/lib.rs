//! TCP stream transport for chunkwire.
//!
//! This is the lowest layer of chunkwire: it establishes and accepts
//! connections and hands out [`Connection`] values, which are plain
//! bidirectional byte streams with per-call timeout support. Message
//! framing lives one layer up, in `chunkwire-frame`.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{connect, TcpServer, DEFAULT_HOST, DEFAULT_LISTEN_BACKLOG, DEFAULT_PORT};
pub use traits::{Connection, StreamTimeouts};
