//! Error types for the store and its persistence format.

use thiserror::Error;

/// Errors raised by [`crate::store::Store`] and its persistence helpers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// `add_user` was called with a name that already exists.
    #[error("username already taken")]
    NameTaken,

    /// The on-disk file's HMAC did not match its body under constant-time
    /// comparison. Loading a store with a bad signature is fatal at
    /// startup.
    #[error("state file signature does not match its body")]
    BadSignature,

    /// The state file's body could not be parsed even though its signature
    /// verified (format drift, truncation after signing, etc.).
    #[error("state file body is corrupt: {0}")]
    Corrupt(String),

    /// Failed to read or write the state file.
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the store body.
    #[error("failed to serialize store: {0}")]
    Serialize(String),

    /// Failed to deserialize the store body.
    #[error("failed to deserialize store: {0}")]
    Deserialize(String),
}
