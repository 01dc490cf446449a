//! Separator- and length-framed messages over TCP byte streams.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP connect/listen/accept with timeouts
//! - [`frame`] — [`frame::ChunkyStream`], which turns a fragmented byte
//!   stream into fixed-length or separator-delimited messages
//!
//! ```no_run
//! use chunkwire::frame::{ChunkyStream, Separator};
//! use chunkwire::transport::connect;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sep = Separator::demo();
//! let mut stream = ChunkyStream::new(connect("127.0.0.1:10000", None)?);
//! stream.send(&sep.terminate(b"hello"))?;
//! let reply = stream.recv_to_separator(&sep)?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use chunkwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use chunkwire_frame::*;
}
