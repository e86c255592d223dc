//! Server-side error types.

use thiserror::Error;

/// Errors raised while configuring, starting, or running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The `--certfile`/`--keyfile` pair could not be loaded into a TLS
    /// server configuration.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Binding the listening socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the server tried to bind.
        addr: std::net::SocketAddr,
        /// Underlying bind failure.
        #[source]
        source: std::io::Error,
    },

    /// The wire framing layer failed on a connection.
    #[error(transparent)]
    Frame(#[from] chatframe_proto::FrameError),

    /// A peer sent a message that failed to decode.
    #[error(transparent)]
    Codec(#[from] chatframe_proto::CodecError),

    /// The shared store reported an error. Only reachable at startup
    /// (`Store::load`) or shutdown (`Store::save`) — per-request store
    /// operations in [`crate::session`] never fail.
    #[error(transparent)]
    Store(#[from] chatframe_core::StoreError),

    /// An I/O failure outside the framing layer (e.g. reading cert/key
    /// files, accepting a socket).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
