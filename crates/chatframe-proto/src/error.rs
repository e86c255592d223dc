//! Error types for the wire protocol.
//!
//! Mirrors the error kinds named in the protocol's error-handling design:
//! framing failures close the connection without necessarily being logged
//! as errors (a clean EOF mid-frame is routine), while codec failures
//! always indicate a malformed or malicious peer.

use thiserror::Error;

/// Errors raised by the framing layer ([`crate::frame`]).
#[derive(Error, Debug)]
pub enum FrameError {
    /// The peer closed the connection before a complete frame arrived.
    #[error("disconnected before a complete frame was received")]
    Disconnected,

    /// The declared frame length exceeds the configured maximum.
    #[error("frame length {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared length, in bytes.
        size: u32,
        /// Configured ceiling, in bytes.
        max: u32,
    },

    /// Underlying transport I/O failed.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while encoding or decoding a [`crate::codec::Message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload was shorter than the fixed header for its code.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A variable-length tail (name, body) was shorter than its declared length.
    #[error("truncated field: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the declared length promised.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The payload's leading code byte did not match any known message kind.
    #[error("unknown message code: {0}")]
    UnknownCode(u8),

    /// A name or body field was not valid UTF-8.
    #[error("invalid utf-8 in field: {0}")]
    InvalidUtf8(String),
}
