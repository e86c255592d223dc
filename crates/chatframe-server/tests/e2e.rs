//! End-to-end scenarios: a real [`chatframe_server`] accept loop, over
//! real TLS, driven by a real [`chatframe_client::SessionDriver`].
//!
//! Certificates are generated with `rcgen`: a self-signed cert for
//! `localhost`, trusted explicitly by the test client rather than via the
//! platform's native root store.

use std::{net::SocketAddr, sync::Arc};

use chatframe_client::{ChatRecord, SessionDriver};
use chatframe_core::{DEFAULT_SECRET, Store};
use rustls_pki_types::ServerName;
use tempfile::tempdir;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_rustls::rustls;

fn self_signed_client_config() -> (Arc<rustls::ServerConfig>, Arc<rustls::ClientConfig>) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = cert.cert.der().clone();
    let key_der = cert.key_pair.serialize_der();

    let key = rustls::pki_types::PrivatePkcs8KeyDer::from(key_der);
    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key.into())
        .unwrap();

    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let client_config = rustls::ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();

    (Arc::new(server_config), Arc::new(client_config))
}

async fn spawn_server(tls_config: Arc<rustls::ServerConfig>) -> (SocketAddr, Arc<Store>) {
    let dir = tempdir().unwrap();
    let store = Arc::new(Store::load(dir.path().join("state.bin"), DEFAULT_SECRET).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store_for_run = Arc::clone(&store);
    tokio::spawn(async move {
        let _ = chatframe_server::acceptor::run(listener, tls_config, store_for_run).await;
    });

    (addr, store)
}

async fn connect_driver(
    addr: SocketAddr,
    client_config: Arc<rustls::ClientConfig>,
    username: &str,
    password: &str,
) -> SessionDriver<tokio_rustls::client::TlsStream<tokio::net::TcpStream>> {
    let server_name = ServerName::try_from("localhost").unwrap();
    let stream = chatframe_client::transport::connect(addr, server_name, client_config).await.unwrap();
    SessionDriver::connect(stream, username, password).await.unwrap()
}

/// A fresh user connects (registering), posts a line, and the
/// confirmed record comes back through the outbound queue.
#[tokio::test]
async fn new_user_connects_and_posts() {
    let (server_tls, client_tls) = self_signed_client_config();
    let (addr, _store) = spawn_server(server_tls).await;

    let mut driver = connect_driver(addr, client_tls, "alice", "pw").await;
    let alice_uid = driver.uid();

    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);
    in_tx.send("hello from alice".to_string()).await.unwrap();
    drop(in_tx);

    driver.run(in_rx, out_tx).await.unwrap();

    let mut confirmed = false;
    while let Some(record) = out_rx.recv().await {
        if let ChatRecord::Message { author_uid, body, .. } = record {
            if author_uid == alice_uid && body == "hello from alice" {
                confirmed = true;
            }
        }
    }
    assert!(confirmed);
}

/// A second user sees the first user's message with their name
/// resolved, delivered during the initial backfill.
#[tokio::test]
async fn second_user_sees_history_with_resolved_name() {
    let (server_tls, client_tls) = self_signed_client_config();
    let (addr, _store) = spawn_server(server_tls).await;

    let mut alice = connect_driver(addr, client_tls.clone(), "alice", "pw").await;
    let alice_uid = alice.uid();
    let (a_in_tx, a_in_rx) = mpsc::channel(8);
    let (a_out_tx, mut a_out_rx) = mpsc::channel(8);
    a_in_tx.send("hi from alice".to_string()).await.unwrap();
    drop(a_in_tx);
    alice.run(a_in_rx, a_out_tx).await.unwrap();
    while a_out_rx.recv().await.is_some() {}

    let mut bob = connect_driver(addr, client_tls, "bob", "pw").await;
    let (b_in_tx, b_in_rx) = mpsc::channel(8);
    let (b_out_tx, mut b_out_rx) = mpsc::channel(8);
    drop(b_in_tx);
    bob.run(b_in_rx, b_out_tx).await.unwrap();

    let mut saw_alice_message = false;
    while let Some(record) = b_out_rx.recv().await {
        if let ChatRecord::Message { author_uid, author_name, body, .. } = record {
            if author_uid == alice_uid && author_name == "alice" && body == "hi from alice" {
                saw_alice_message = true;
            }
        }
    }
    assert!(saw_alice_message);
}

/// A wrong password against an existing username is rejected rather than
/// silently re-registering.
#[tokio::test]
async fn wrong_password_is_rejected() {
    let (server_tls, client_tls) = self_signed_client_config();
    let (addr, _store) = spawn_server(server_tls).await;

    let server_name = ServerName::try_from("localhost").unwrap();
    let stream =
        chatframe_client::transport::connect(addr, server_name.clone(), client_tls.clone()).await.unwrap();
    SessionDriver::connect(stream, "alice", "pw").await.unwrap();

    let stream = chatframe_client::transport::connect(addr, server_name, client_tls).await.unwrap();
    let result = SessionDriver::connect(stream, "alice", "wrong").await;
    assert!(matches!(result, Err(chatframe_client::ClientError::AuthRejected)));
}
