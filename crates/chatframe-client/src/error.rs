//! Client-side error types.

use thiserror::Error;

/// Errors raised while connecting, authenticating, or driving a session.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The client's TLS configuration could not be built, or the TLS
    /// handshake against the server failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The wire framing layer failed on the connection.
    #[error(transparent)]
    Frame(#[from] chatframe_proto::FrameError),

    /// A response failed to decode.
    #[error(transparent)]
    Codec(#[from] chatframe_proto::CodecError),

    /// The server rejected the `CONNECT_REQUEST` (bad password for an
    /// existing username).
    #[error("authentication rejected")]
    AuthRejected,

    /// The server sent a response of a different kind than the request
    /// that was just sent, or a request code where a response was
    /// expected.
    #[error("unexpected response from server")]
    UnexpectedResponse,

    /// The UI-side channel closed while the driver still had work to do.
    #[error("UI channel disconnected")]
    UiDisconnected,

    /// An I/O failure outside the framing layer.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
