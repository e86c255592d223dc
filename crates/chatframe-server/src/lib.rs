//! chatframe-server — the session handler (C4) and acceptor (C5) of the
//! chatframe chat service.
//!
//! Accepts TLS connections, dispatches each one through a pure per-session
//! state machine ([`session::Session`]) against a single shared
//! [`chatframe_core::Store`], and persists the store on graceful shutdown.
//! Authentication, history, posting, and username resolution all flow
//! through [`session::Session::handle_message`]; this crate's own code is
//! just the I/O that feeds it frames and writes back its responses.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod acceptor;
mod error;
pub mod session;
pub mod tls;

pub use error::ServerError;
pub use session::{Session, SessionAction};

use std::{net::SocketAddr, path::Path, sync::Arc};

use chatframe_core::Store;
use tokio::net::TcpListener;

/// Binds `addr`, loads (or seeds) the store at `store_path`, and runs the
/// accept loop until a shutdown signal arrives, saving the store before
/// returning.
///
/// # Errors
///
/// Returns [`ServerError`] if the TLS configuration cannot be built, the
/// bind fails, the store cannot be loaded, or the final save fails.
pub async fn run(
    addr: SocketAddr,
    certfile: impl AsRef<Path>,
    keyfile: impl AsRef<Path>,
    store_path: impl AsRef<Path>,
    secret: impl Into<Vec<u8>>,
) -> Result<(), ServerError> {
    let tls_config = tls::load_server_config(certfile, keyfile)?;
    let store = Arc::new(Store::load(store_path, secret)?);

    let listener =
        TcpListener::bind(addr).await.map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(%addr, "listening");

    acceptor::run(listener, tls_config, store).await
}
