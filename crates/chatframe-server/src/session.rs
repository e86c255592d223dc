//! Per-connection state machine: dispatch requests, enforce auth, produce
//! responses.
//!
//! A connection's whole state is "which uid, if any, has authenticated on
//! it". [`Session::handle_message`] is a pure, I/O-free function — it
//! takes one already-decoded [`Message`], mutates the shared [`Store`]
//! when the request calls for it, and returns the [`SessionAction`]s its
//! caller should perform, so the two states (unauthenticated,
//! authenticated) are exercised without any transport in the loop.

use chatframe_core::Store;
use chatframe_proto::{Message, REJECT_SENTINEL};

/// Actions a [`Session`] asks its caller to perform after processing one
/// message.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Send this message to the peer.
    Send(Message),
    /// Close the connection. `reason` is for logging; there is no generic
    /// error frame in the eight-code wire format to send back.
    Close {
        /// Human-readable reason, logged by the caller.
        reason: String,
    },
}

/// Per-connection session state.
///
/// Created fresh on accept, holds one optional authenticated uid for the
/// lifetime of the connection.
#[derive(Debug, Default)]
pub struct Session {
    authenticated_uid: Option<u64>,
}

impl Session {
    /// A new, unauthenticated session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The uid this session has authenticated as, if any.
    #[must_use]
    pub fn authenticated_uid(&self) -> Option<u64> {
        self.authenticated_uid
    }

    /// Decides what to do with one decoded message.
    ///
    /// Before a successful `CONNECT_REQUEST`, every other code closes the
    /// connection. `now` is the ingest timestamp (Unix seconds) recorded
    /// on any message this call appends to the store.
    pub fn handle_message(&mut self, message: Message, store: &Store, now: f64) -> Vec<SessionAction> {
        if self.authenticated_uid.is_none() && !matches!(message, Message::ConnectRequest { .. }) {
            return vec![SessionAction::Close {
                reason: "request received before successful authentication".to_string(),
            }];
        }

        match message {
            Message::ConnectRequest { username, password, .. } => {
                self.handle_connect(&username, &password, store)
            },
            Message::UsersRequest { uid, target_uids } => {
                let users =
                    target_uids.into_iter().map(|target| (target, store.get_username(target))).collect();
                vec![SessionAction::Send(Message::UsersResponse { uid, users })]
            },
            Message::MessagesRequest { uid, thread_id: _, count } => {
                let messages = store
                    .get_last_messages(count as usize)
                    .into_iter()
                    .map(|m| (m.mid, m.timestamp, m.author_uid, m.body))
                    .collect();
                vec![SessionAction::Send(Message::MessagesResponse { uid, messages })]
            },
            Message::PostRequest { uid, thread_id, body } => {
                self.handle_post(uid, thread_id, &body, store, now)
            },
            // A server never receives its own response codes; a peer that
            // sends one is violating the protocol.
            Message::ConnectResponse { .. }
            | Message::UsersResponse { .. }
            | Message::MessagesResponse { .. }
            | Message::PostResponse { .. } => vec![SessionAction::Close {
                reason: "peer sent a response code, expected a request".to_string(),
            }],
        }
    }

    fn handle_connect(&mut self, username: &str, password: &str, store: &Store) -> Vec<SessionAction> {
        if !store.username_exists(username) {
            // Register-on-first-seen: an unknown username in
            // CONNECT_REQUEST is treated as implicit registration. This
            // conflates signup and signin but keeps the wire protocol to
            // a single request code.
            match store.add_user(username, password) {
                Ok(uid) => {
                    self.authenticated_uid = Some(uid);
                    return vec![SessionAction::Send(Message::ConnectResponse { uid })];
                },
                Err(chatframe_core::StoreError::NameTaken) => {
                    // Lost a race: another caller registered this name
                    // between our existence check and our insert attempt.
                    // Fall through and try authenticating against whoever
                    // won.
                },
                Err(_) => return vec![SessionAction::Close { reason: "store error".to_string() }],
            }
        }
        self.authenticate(username, password, store)
    }

    fn authenticate(&mut self, username: &str, password: &str, store: &Store) -> Vec<SessionAction> {
        match store.check_connection(username, password) {
            Some(uid) => {
                self.authenticated_uid = Some(uid);
                vec![SessionAction::Send(Message::ConnectResponse { uid })]
            },
            None => vec![SessionAction::Send(Message::ConnectResponse { uid: REJECT_SENTINEL })],
        }
    }

    fn handle_post(
        &mut self,
        claimed_uid: u64,
        thread_id: u64,
        body: &str,
        store: &Store,
        now: f64,
    ) -> Vec<SessionAction> {
        if Some(claimed_uid) != self.authenticated_uid {
            return vec![SessionAction::Send(Message::PostResponse {
                uid: claimed_uid,
                thread_id,
                mid: REJECT_SENTINEL,
            })];
        }

        let mid = store.add_new_message(now, claimed_uid, body);
        vec![SessionAction::Send(Message::PostResponse { uid: claimed_uid, thread_id, mid })]
    }
}

#[cfg(test)]
mod tests {
    use chatframe_core::DEFAULT_SECRET;
    use tempfile::tempdir;

    use super::*;

    fn fresh_store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let store = Store::load(&path, DEFAULT_SECRET).unwrap();
        (store, dir)
    }

    /// First contact with a new username registers and authenticates.
    #[test]
    fn connect_with_new_username_registers_and_authenticates() {
        let (store, _dir) = fresh_store();
        let mut session = Session::new();

        let actions =
            session.handle_message(
                Message::ConnectRequest { uid: 0, username: "alice".to_string(), password: "pw".to_string() },
                &store,
                0.0,
            );

        assert_eq!(actions.len(), 1);
        let Some(SessionAction::Send(Message::ConnectResponse { uid })) = actions.first().cloned() else {
            panic!("expected ConnectResponse");
        };
        assert_eq!(session.authenticated_uid(), Some(uid));
        assert!(store.username_exists("alice"));
    }

    /// An authenticated session can post, and gets back its own uid.
    #[test]
    fn post_after_connect_appends_message_and_confirms() {
        let (store, _dir) = fresh_store();
        let mut session = Session::new();
        session.handle_message(
            Message::ConnectRequest { uid: 0, username: "alice".to_string(), password: "pw".to_string() },
            &store,
            0.0,
        );
        let uid = session.authenticated_uid().unwrap();

        let actions = session.handle_message(
            Message::PostRequest { uid, thread_id: 0, body: "hello".to_string() },
            &store,
            100.0,
        );

        assert_eq!(
            actions,
            vec![SessionAction::Send(Message::PostResponse { uid, thread_id: 0, mid: 2 })]
        );
    }

    /// A second session resolves the first user's posted message and
    /// name, and "Unknown" for an unrecognised uid.
    #[test]
    fn second_session_reads_history_and_resolves_names() {
        let (store, _dir) = fresh_store();
        let mut alice = Session::new();
        alice.handle_message(
            Message::ConnectRequest { uid: 0, username: "alice".to_string(), password: "pw".to_string() },
            &store,
            0.0,
        );
        let alice_uid = alice.authenticated_uid().unwrap();
        alice.handle_message(
            Message::PostRequest { uid: alice_uid, thread_id: 0, body: "hello".to_string() },
            &store,
            0.0,
        );

        let mut bob = Session::new();
        bob.handle_message(
            Message::ConnectRequest { uid: 0, username: "bob".to_string(), password: "pw".to_string() },
            &store,
            0.0,
        );
        let bob_uid = bob.authenticated_uid().unwrap();

        let actions = bob.handle_message(
            Message::MessagesRequest { uid: bob_uid, thread_id: 0, count: 10 },
            &store,
            0.0,
        );
        let Some(SessionAction::Send(Message::MessagesResponse { messages, .. })) = actions.first().cloned()
        else {
            panic!("expected MessagesResponse");
        };
        assert!(messages.iter().any(|(_, _, author, body)| *author == alice_uid && body == "hello"));

        let actions = bob.handle_message(
            Message::UsersRequest { uid: bob_uid, target_uids: vec![alice_uid, 999] },
            &store,
            0.0,
        );
        assert_eq!(
            actions,
            vec![SessionAction::Send(Message::UsersResponse {
                uid: bob_uid,
                users: vec![(alice_uid, "alice".to_string()), (999, "Unknown".to_string())],
            })]
        );
    }

    /// A claimed uid that doesn't match the session's authenticated uid
    /// is rejected without changing the store.
    #[test]
    fn post_with_mismatched_uid_is_rejected() {
        let (store, _dir) = fresh_store();
        let mut alice = Session::new();
        alice.handle_message(
            Message::ConnectRequest { uid: 0, username: "alice".to_string(), password: "pw".to_string() },
            &store,
            0.0,
        );
        let alice_uid = alice.authenticated_uid().unwrap();

        let mut bob = Session::new();
        bob.handle_message(
            Message::ConnectRequest { uid: 0, username: "bob".to_string(), password: "pw".to_string() },
            &store,
            0.0,
        );

        let before = store.get_last_messages(usize::MAX).len();
        let actions = bob.handle_message(
            Message::PostRequest { uid: alice_uid, thread_id: 0, body: "xxx".to_string() },
            &store,
            0.0,
        );
        assert_eq!(
            actions,
            vec![SessionAction::Send(Message::PostResponse {
                uid: alice_uid,
                thread_id: 0,
                mid: REJECT_SENTINEL,
            })]
        );
        assert_eq!(store.get_last_messages(usize::MAX).len(), before);
    }

    #[test]
    fn wrong_password_for_existing_user_is_rejected() {
        let (store, _dir) = fresh_store();
        let mut session = Session::new();
        session.handle_message(
            Message::ConnectRequest { uid: 0, username: "alice".to_string(), password: "pw".to_string() },
            &store,
            0.0,
        );

        let mut other = Session::new();
        let actions = other.handle_message(
            Message::ConnectRequest { uid: 0, username: "alice".to_string(), password: "wrong".to_string() },
            &store,
            0.0,
        );
        assert_eq!(
            actions,
            vec![SessionAction::Send(Message::ConnectResponse { uid: REJECT_SENTINEL })]
        );
        assert_eq!(other.authenticated_uid(), None);
    }

    #[test]
    fn unauthenticated_session_rejects_non_connect_codes() {
        let (store, _dir) = fresh_store();
        let mut session = Session::new();
        let actions = session.handle_message(
            Message::MessagesRequest { uid: 0, thread_id: 0, count: 10 },
            &store,
            0.0,
        );
        assert!(matches!(actions.as_slice(), [SessionAction::Close { .. }]));
    }
}
