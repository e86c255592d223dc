//! On-disk state file format: `HMAC-SHA-512(secret, body) || body`.
//!
//! `body` is a CBOR-encoded snapshot of the store's users and messages.
//! This replaces the language-native object serialisation an older
//! implementation might reach for — an explicit, versioned, self-describing
//! format is both safer to load from an untrusted file and more portable.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::{
    error::StoreError,
    model::{Message, User},
};

type HmacSha512 = Hmac<Sha512>;

/// Default HMAC secret used when the caller supplies none.
///
/// A deliberately weak fallback: operators are expected to supply their
/// own secret in any real deployment.
pub const DEFAULT_SECRET: &[u8] = b"password";

const SIGNATURE_LEN: usize = 64;

/// The serialisable snapshot of a [`crate::store::Store`]'s two lists.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredState {
    /// All registered users, in insertion (uid) order.
    pub users: Vec<User>,
    /// All posted messages, in append (mid) order.
    pub messages: Vec<Message>,
}

/// Serialises `state` to CBOR and signs it, producing `signature || body`.
///
/// # Errors
///
/// Returns [`StoreError::Serialize`] if CBOR encoding fails.
#[allow(clippy::expect_used, reason = "HMAC accepts keys of any length")]
pub fn sign(state: &StoredState, secret: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut body = Vec::new();
    ciborium::ser::into_writer(state, &mut body)
        .map_err(|e| StoreError::Serialize(e.to_string()))?;

    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&body);
    let signature = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(SIGNATURE_LEN + body.len());
    out.extend_from_slice(&signature);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Verifies and deserialises a `signature || body` file, as produced by
/// [`sign`].
///
/// # Errors
///
/// - [`StoreError::Corrupt`] if the file is shorter than the signature.
/// - [`StoreError::BadSignature`] if the signature does not match the body
///   under constant-time comparison.
/// - [`StoreError::Deserialize`] if the body is not valid CBOR for
///   [`StoredState`].
#[allow(clippy::expect_used, reason = "HMAC accepts keys of any length")]
pub fn verify(data: &[u8], secret: &[u8]) -> Result<StoredState, StoreError> {
    if data.len() < SIGNATURE_LEN {
        return Err(StoreError::Corrupt("file shorter than signature".to_string()));
    }
    let (signature, body) = data.split_at(SIGNATURE_LEN);

    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(signature).map_err(|_| StoreError::BadSignature)?;

    ciborium::de::from_reader(body).map_err(|e| StoreError::Deserialize(e.to_string()))
}

/// A deterministic bootstrap seed used when no state file exists yet:
/// two users (`admin`, `user`, each with a password equal to their own
/// name) and one welcome message from `admin`, so a fresh server has
/// visible history instead of an empty room.
#[must_use]
pub fn seed_state() -> StoredState {
    let admin_hash = crate::store::hash_password("admin");
    let user_hash = crate::store::hash_password("user");

    StoredState {
        users: vec![
            User { uid: 1, name: "admin".to_string(), pw_hash: admin_hash },
            User { uid: 2, name: "user".to_string(), pw_hash: user_hash },
        ],
        messages: vec![Message {
            mid: 1,
            timestamp: 0.0,
            author_uid: 1,
            body: "welcome to chatframe".to_string(),
        }],
    }
}
