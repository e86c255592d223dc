//! Shared user and message store for the chatframe chat service.
//!
//! This crate owns the one piece of state a chatframe server mutates: the
//! list of registered users and the list of posted messages, each guarded
//! by its own lock, with a signed on-disk persistence format. It has no
//! knowledge of the wire protocol ([`chatframe_proto`]) or of networking;
//! callers in `chatframe-server` translate protocol messages into calls on
//! [`Store`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod model;
mod persistence;
mod store;

pub use error::StoreError;
pub use model::{Message, User};
pub use persistence::DEFAULT_SECRET;
pub use store::{hash_password, Store, UNKNOWN_USER};
