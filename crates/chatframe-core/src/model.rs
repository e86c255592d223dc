//! The two entities the store holds: users and messages.

use serde::{Deserialize, Serialize};

/// A registered user.
///
/// `uid` is a dense positive integer assigned at first insertion (`1, 2,
/// 3, …`); `uid = 0` is reserved for "server" messages and never assigned
/// to a real user. `pw_hash` is the lowercase hex SHA-512 digest of the
/// user's UTF-8 password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Dense, strictly increasing identifier.
    pub uid: u64,
    /// Unique display name.
    pub name: String,
    /// Lowercase hex SHA-512 of the UTF-8 password.
    pub pw_hash: String,
}

/// A posted message.
///
/// `mid` is assigned on append, dense from 1. Messages are append-only;
/// assignment order is the order of successful `add_new_message` calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Dense, strictly increasing identifier.
    pub mid: u64,
    /// Unix seconds at server ingest time, with fractional component.
    pub timestamp: f64,
    /// The posting user's uid. Not cross-checked against `users` by the
    /// store itself; callers are expected to have verified the author
    /// exists.
    pub author_uid: u64,
    /// Message body, UTF-8.
    pub body: String,
}
