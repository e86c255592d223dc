//! TLS-over-TCP connection setup.
//!
//! Certificate *validation* policy is the default one `rustls` gives a
//! client that trusts the platform's native root store; there is no
//! custom verifier here.

use std::{net::SocketAddr, sync::Arc};

use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::{TlsConnector, client::TlsStream, rustls};

use crate::error::ClientError;

/// Builds a `rustls::ClientConfig` trusting the platform's native root
/// certificate store.
///
/// # Errors
///
/// Returns [`ClientError::Tls`] if no native root certificates could be
/// loaded at all.
pub fn default_client_config() -> Result<Arc<rustls::ClientConfig>, ClientError> {
    let mut roots = rustls::RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for error in loaded.errors {
        tracing::warn!(%error, "skipped an unreadable native certificate");
    }
    for cert in loaded.certs {
        roots
            .add(cert)
            .map_err(|e| ClientError::Tls(format!("invalid native root certificate: {e}")))?;
    }
    if roots.is_empty() {
        return Err(ClientError::Tls("no usable native root certificates found".to_string()));
    }

    let config = rustls::ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
    Ok(Arc::new(config))
}

/// Opens a TCP connection to `addr` and completes a TLS handshake against
/// `server_name`, using `tls_config` for certificate verification.
///
/// # Errors
///
/// Returns [`ClientError::Io`] if the TCP connect fails, or
/// [`ClientError::Tls`] if the TLS handshake fails.
pub async fn connect(
    addr: SocketAddr,
    server_name: ServerName<'static>,
    tls_config: Arc<rustls::ClientConfig>,
) -> Result<TlsStream<TcpStream>, ClientError> {
    let tcp = TcpStream::connect(addr).await?;
    let connector = TlsConnector::from(tls_config);
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| ClientError::Tls(format!("handshake failed: {e}")))
}
