//! Accept loop: one spawned task per accepted connection, all sharing one
//! [`Store`], with graceful shutdown that persists the store before exit.
//!
//! A task-based runtime stands in for thread-per-connection here: the
//! accept loop is a `tokio::select!` between `TcpListener::accept` and
//! `tokio::signal::ctrl_c()`, one spawned task per connection, as long as
//! the per-session state machine and the store's locking discipline are
//! preserved. [`Store`] already does its own internal locking and this
//! loop never holds a lock across an I/O call.

use std::sync::Arc;

use chatframe_core::Store;
use chatframe_proto::{MAX_FRAME_LEN, Message, recv_frame, send_frame};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
use tokio_rustls::{TlsAcceptor, rustls};

use crate::{
    error::ServerError,
    session::{Session, SessionAction},
};

/// Runs the accept loop on `listener`, TLS-wrapping each connection with
/// `tls_config`, until a shutdown signal fires.
///
/// Handlers that are mid-request when shutdown begins are not forcibly
/// aborted — they are simply left to finish or be dropped with the
/// process; no partial writes reach the store since each store operation
/// is already self-contained under its own lock.
///
/// # Errors
///
/// Returns [`ServerError::Store`] if the final `Store::save` fails.
pub async fn run(
    listener: TcpListener,
    tls_config: Arc<rustls::ServerConfig>,
    store: Arc<Store>,
) -> Result<(), ServerError> {
    let acceptor = TlsAcceptor::from(tls_config);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    },
                };

                let acceptor = acceptor.clone();
                let store = Arc::clone(&store);

                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            tracing::info!(%peer, "connection accepted");
                            handle_connection(tls_stream, &store).await;
                            tracing::info!(%peer, "connection closed");
                        },
                        Err(e) => tracing::warn!(%peer, error = %e, "TLS handshake failed"),
                    }
                });
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received, saving store");
                break;
            },
        }
    }

    store.save()?;
    Ok(())
}

/// Drives one connection to completion: receive a frame, decode it,
/// dispatch it through a [`Session`], send back whatever actions it
/// returns, and repeat until the peer disconnects, sends something
/// malformed, or the session itself asks to close.
///
/// Generic over the transport so both the TLS-wrapped production listener
/// and an in-memory duplex stream (used by tests) run the identical
/// dispatch code.
pub async fn handle_connection<S>(mut stream: S, store: &Store)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new();

    loop {
        let payload = match recv_frame(&mut stream, MAX_FRAME_LEN).await {
            Ok(payload) => payload,
            Err(chatframe_proto::FrameError::Disconnected) => return,
            Err(e) => {
                tracing::warn!(error = %e, "transport error, closing connection");
                return;
            },
        };

        let message = match Message::decode(&payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "malformed message, closing connection");
                return;
            },
        };

        let now = current_unix_time();
        let actions = session.handle_message(message, store, now);

        for action in actions {
            match action {
                SessionAction::Send(response) => {
                    let mut buf = Vec::new();
                    response.encode(&mut buf);
                    if let Err(e) = send_frame(&mut stream, &buf).await {
                        tracing::warn!(error = %e, "failed to send response");
                        return;
                    }
                },
                SessionAction::Close { reason } => {
                    tracing::warn!(%reason, "closing connection");
                    return;
                },
            }
        }
    }
}

fn current_unix_time() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use chatframe_core::DEFAULT_SECRET;
    use chatframe_proto::REJECT_SENTINEL;
    use tempfile::tempdir;
    use tokio::io::duplex;

    use super::*;

    async fn send(stream: &mut (impl AsyncWrite + Unpin), msg: &Message) {
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        send_frame(stream, &buf).await.unwrap();
    }

    async fn recv(stream: &mut (impl AsyncRead + Unpin)) -> Message {
        let payload = recv_frame(stream, MAX_FRAME_LEN).await.unwrap();
        Message::decode(&payload).unwrap()
    }

    /// Connect as a new user, post a message, see it confirmed.
    #[tokio::test]
    async fn full_connect_and_post_over_duplex() {
        let dir = tempdir().unwrap();
        let store = Store::load(dir.path().join("state.bin"), DEFAULT_SECRET).unwrap();

        let (mut client, server) = duplex(8192);
        let server_store = Arc::new(store);
        let handle = {
            let store = Arc::clone(&server_store);
            tokio::spawn(async move {
                handle_connection(server, &store).await;
            })
        };

        send(
            &mut client,
            &Message::ConnectRequest { uid: 0, username: "alice".to_string(), password: "pw".to_string() },
        )
        .await;
        let Message::ConnectResponse { uid } = recv(&mut client).await else {
            panic!("expected ConnectResponse");
        };
        assert_ne!(uid, REJECT_SENTINEL);

        send(&mut client, &Message::PostRequest { uid, thread_id: 0, body: "hello".to_string() }).await;
        let Message::PostResponse { mid, .. } = recv(&mut client).await else {
            panic!("expected PostResponse");
        };
        assert_ne!(mid, REJECT_SENTINEL);

        drop(client);
        handle.await.unwrap();
    }

    /// Traffic before a successful CONNECT_REQUEST closes the connection.
    #[tokio::test]
    async fn unauthenticated_request_closes_connection() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::load(dir.path().join("state.bin"), DEFAULT_SECRET).unwrap());

        let (mut client, server) = duplex(8192);
        let handle = tokio::spawn(async move {
            handle_connection(server, &store).await;
        });

        send(&mut client, &Message::MessagesRequest { uid: 0, thread_id: 0, count: 5 }).await;

        let result = recv_frame(&mut client, MAX_FRAME_LEN).await;
        assert!(result.is_err());
        handle.await.unwrap();
    }
}
