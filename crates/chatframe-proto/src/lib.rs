//! Wire protocol for the chatframe chat service.
//!
//! Two layers:
//! - [`frame`]: length-prefixed byte-stream framing over any
//!   `AsyncRead + AsyncWrite` transport.
//! - [`codec`]: the eight request/response messages that travel inside
//!   frame payloads.
//!
//! Neither layer performs its own I/O beyond the async read/write traits;
//! TLS, TCP, and in-memory duplex streams all speak the same framing.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
mod error;
pub mod frame;

pub use codec::{Code, Message, REJECT_SENTINEL};
pub use error::{CodecError, FrameError};
pub use frame::{MAX_FRAME_LEN, recv_frame, send_frame};
