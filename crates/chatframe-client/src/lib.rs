//! chatframe-client — the session driver (C6) of the chatframe chat
//! service.
//!
//! Connects over TLS, authenticates, and then multiplexes locally typed
//! lines against periodic history polling on that one connection,
//! surfacing everything it learns to a UI (or any other consumer) through
//! a pair of `tokio::sync::mpsc` channels. This crate owns none of the UI
//! itself: a terminal front end, a test harness, or anything else can
//! drive [`SessionDriver`] by feeding its `inqueue` and draining its
//! `outqueue`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod error;
pub mod transport;

pub use driver::{ChatRecord, SessionDriver};
pub use error::ClientError;
