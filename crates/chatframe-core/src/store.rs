//! The shared, lock-guarded collection of users and messages.
//!
//! Two independent mutexes guard the two lists so user operations and
//! message operations can proceed in parallel. A given operation acquires
//! only the lock it needs, and holds it for the minimum scope that
//! preserves the invariant it enforces — `add_user` holds `users` across
//! its existence check and append so uniqueness survives contention.
//! `save` is the one operation that must see a consistent snapshot of both
//! lists together; it acquires both locks, always in the fixed order
//! `users` then `messages`, to avoid deadlocking against any other
//! operation (no other operation ever holds both).

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use sha2::{Digest, Sha512};

use crate::{
    error::StoreError,
    model::{Message, User},
    persistence::{self, StoredState},
};

/// Name returned by [`Store::get_username`] for an unknown uid.
pub const UNKNOWN_USER: &str = "Unknown";

/// Lowercase hex SHA-512 digest of a UTF-8 password.
///
/// Bare SHA-512 is unsuitable for production password storage (no salt, no
/// work factor); a real deployment should substitute a memory-hard KDF
/// (Argon2id, scrypt) here without changing the wire protocol — only this
/// stored field would change.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let digest = Sha512::digest(password.as_bytes());
    hex_lower(&digest)
}

#[allow(clippy::expect_used, reason = "writing to a String cannot fail")]
fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("write to String cannot fail");
    }
    s
}

/// The in-memory users + messages table, with signed persistence.
pub struct Store {
    users: Mutex<Vec<User>>,
    messages: Mutex<Vec<Message>>,
    path: PathBuf,
    secret: Vec<u8>,
}

impl Store {
    /// Loads the store from `path` if it exists, verifying its HMAC
    /// signature against `secret`; otherwise seeds a fresh store (see
    /// [`persistence::seed_state`]).
    ///
    /// # Errors
    ///
    /// - [`StoreError::BadSignature`] if the file exists but its signature
    ///   does not match its body.
    /// - [`StoreError::Corrupt`] / [`StoreError::Deserialize`] if the file
    ///   exists, signs correctly, but its body cannot be parsed.
    /// - [`StoreError::Io`] on any other filesystem failure.
    pub fn load(path: impl AsRef<Path>, secret: impl Into<Vec<u8>>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let secret = secret.into();

        let state = if path.exists() {
            let data = std::fs::read(&path)?;
            persistence::verify(&data, &secret)?
        } else {
            persistence::seed_state()
        };

        Ok(Self {
            users: Mutex::new(state.users),
            messages: Mutex::new(state.messages),
            path,
            secret,
        })
    }

    /// Atomically overwrites the state file with `HMAC(secret, body) ||
    /// body`. Acquires both locks internally, in the fixed order `users`
    /// then `messages`, so the persisted bytes correspond to one
    /// point-in-time state of both lists together. Callers hold no lock
    /// while the write syscall blocks beyond what this method takes
    /// internally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if writing the file fails, or
    /// [`StoreError::Serialize`] if CBOR encoding the snapshot fails.
    pub fn save(&self) -> Result<(), StoreError> {
        let state = {
            let users = self.lock_users();
            let messages = self.lock_messages();
            StoredState { users: users.clone(), messages: messages.clone() }
        };

        let signed = persistence::sign(&state, &self.secret)?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &signed)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// True if a user named `name` already exists.
    #[must_use]
    pub fn username_exists(&self, name: &str) -> bool {
        self.lock_users().iter().any(|u| u.name == name)
    }

    /// Registers a new user, returning the assigned uid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NameTaken`] if `name` is already registered.
    /// The existence check and the append happen under one acquisition of
    /// `users`, so concurrent callers racing on the same name never both
    /// succeed.
    pub fn add_user(&self, name: &str, password: &str) -> Result<u64, StoreError> {
        let mut users = self.lock_users();
        if users.iter().any(|u| u.name == name) {
            return Err(StoreError::NameTaken);
        }
        #[allow(clippy::cast_possible_truncation)]
        let uid = users.len() as u64 + 1;
        users.push(User { uid, name: name.to_string(), pw_hash: hash_password(password) });
        Ok(uid)
    }

    /// Returns the uid of the user named `name` if `password` hashes to
    /// its stored hash, `None` otherwise (unknown name or wrong password).
    #[must_use]
    pub fn check_connection(&self, name: &str, password: &str) -> Option<u64> {
        let hash = hash_password(password);
        self.lock_users().iter().find(|u| u.name == name && u.pw_hash == hash).map(|u| u.uid)
    }

    /// Appends a new message, returning the assigned mid.
    ///
    /// `mid` values are assigned in lock-acquisition order: under any
    /// interleaving of concurrent callers, the returned ids are a
    /// permutation of `1..=N` and the stored order matches id order.
    pub fn add_new_message(&self, timestamp: f64, author_uid: u64, body: &str) -> u64 {
        let mut messages = self.lock_messages();
        #[allow(clippy::cast_possible_truncation)]
        let mid = messages.len() as u64 + 1;
        messages.push(Message { mid, timestamp, author_uid, body: body.to_string() });
        mid
    }

    /// Returns up to the last `n` messages in append order. If fewer than
    /// `n` exist, returns all of them.
    #[must_use]
    pub fn get_last_messages(&self, n: usize) -> Vec<Message> {
        let messages = self.lock_messages();
        let start = messages.len().saturating_sub(n);
        messages[start..].to_vec()
    }

    /// Resolves `uid` to a display name, or [`UNKNOWN_USER`] if no such
    /// user exists.
    #[must_use]
    pub fn get_username(&self, uid: u64) -> String {
        self.lock_users()
            .iter()
            .find(|u| u.uid == uid)
            .map_or_else(|| UNKNOWN_USER.to_string(), |u| u.name.clone())
    }

    /// # Panics
    ///
    /// Panics if the users mutex is poisoned (a prior holder panicked while
    /// holding it). Acceptable: the process is already in an unrecoverable
    /// state at that point.
    #[allow(clippy::expect_used)]
    fn lock_users(&self) -> std::sync::MutexGuard<'_, Vec<User>> {
        self.users.lock().expect("users mutex poisoned")
    }

    /// # Panics
    ///
    /// Panics if the messages mutex is poisoned (a prior holder panicked
    /// while holding it). Acceptable: the process is already in an
    /// unrecoverable state at that point.
    #[allow(clippy::expect_used)]
    fn lock_messages(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.messages.lock().expect("messages mutex poisoned")
    }
}
