//! Loads a `rustls::ServerConfig` from a PEM certificate chain and private
//! key file, for the `--certfile PATH --keyfile PATH` CLI surface.
//!
//! Certificate/key *loading* is all this module does; certificate
//! validation policy beyond what `rustls` already enforces is out of
//! scope.

use std::{path::Path, sync::Arc};

use tokio_rustls::rustls;

use crate::error::ServerError;

/// Reads a PEM certificate chain and private key from disk and builds a
/// `rustls::ServerConfig` with no client authentication.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if either file cannot be read, or
/// [`ServerError::Tls`] if the PEM contents are not a valid certificate
/// chain / private key pair.
pub fn load_server_config(
    certfile: impl AsRef<Path>,
    keyfile: impl AsRef<Path>,
) -> Result<Arc<rustls::ServerConfig>, ServerError> {
    let cert_bytes = std::fs::read(certfile.as_ref())?;
    let key_bytes = std::fs::read(keyfile.as_ref())?;

    let cert_chain = rustls_pemfile::certs(&mut cert_bytes.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("invalid certificate chain: {e}")))?;

    let key = rustls_pemfile::private_key(&mut key_bytes.as_slice())
        .map_err(|e| ServerError::Tls(format!("invalid private key: {e}")))?
        .ok_or_else(|| ServerError::Tls("no private key found in keyfile".to_string()))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| ServerError::Tls(e.to_string()))?;

    Ok(Arc::new(config))
}
