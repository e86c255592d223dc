//! Session driver: the single connection thread that multiplexes posting
//! outbound lines against periodic history polling.
//!
//! A transport task is wired to the rest of the program through
//! `tokio::sync::mpsc` channels. The driver alternates a short,
//! timeout-bounded wait for a locally typed line against a
//! `MESSAGES_REQUEST` poll, and performs one larger history backfill
//! (`count = 64`) immediately after connecting, before entering that
//! alternation with `count = 10` on every later poll.

use std::{collections::HashMap, time::Duration};

use chatframe_proto::{MAX_FRAME_LEN, Message, REJECT_SENTINEL, recv_frame, send_frame};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    time::timeout,
};

use crate::error::ClientError;

/// How long the driver waits for a typed line before it polls for history
/// instead.
const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// How many messages to request on every steady-state poll.
const POLL_COUNT: u8 = 10;

/// How many messages to request once, right after connecting, to backfill
/// history predating this session.
const BACKFILL_COUNT: u8 = 64;

/// A record the driver hands to its UI: either a chat message, an
/// informational note from the driver itself, or an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatRecord {
    /// A chat message authored by some user, resolved to a display name.
    Message {
        /// The message's id, used for idempotent delivery.
        mid: u64,
        /// Unix timestamp the server recorded for this message.
        timestamp: f64,
        /// Author's uid.
        author_uid: u64,
        /// Author's display name, resolved via `USERS_REQUEST` if not
        /// already known.
        author_name: String,
        /// Message body.
        body: String,
    },
    /// An informational line from the driver, not authored by any user.
    Server {
        /// When the note was generated.
        timestamp: f64,
        /// Note text.
        body: String,
    },
    /// An error surfaced to the UI instead of a panic or a dropped
    /// connection.
    Error {
        /// When the error occurred.
        timestamp: f64,
        /// Error text.
        body: String,
    },
}

/// Drives one authenticated connection: posts lines from `inqueue`, polls
/// for new history on a timeout, and pushes [`ChatRecord`]s to `outqueue`.
pub struct SessionDriver<S> {
    stream: S,
    uid: u64,
    known_usernames: HashMap<u64, String>,
    last_delivered_mid: Option<u64>,
}

impl<S> SessionDriver<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Performs `CONNECT_REQUEST` over `stream` and, on success, returns a
    /// driver seeded with the caller's own `(uid, username)`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthRejected`] if the server rejects the
    /// credentials, or a transport/codec error if the connection fails
    /// before a response arrives.
    pub async fn connect(mut stream: S, username: &str, password: &str) -> Result<Self, ClientError> {
        send_request(
            &mut stream,
            &Message::ConnectRequest { uid: 0, username: username.to_string(), password: password.to_string() },
        )
        .await?;

        let response = recv_response(&mut stream).await?;
        let Message::ConnectResponse { uid } = response else {
            return Err(ClientError::UnexpectedResponse);
        };
        if uid == REJECT_SENTINEL {
            return Err(ClientError::AuthRejected);
        }

        let mut known_usernames = HashMap::new();
        known_usernames.insert(uid, username.to_string());

        Ok(Self { stream, uid, known_usernames, last_delivered_mid: None })
    }

    /// The uid this driver authenticated as.
    #[must_use]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Runs the main loop until `inqueue` closes or a transport error
    /// occurs: backfills recent history once, then alternates between
    /// posting a typed line (when one arrives within [`POLL_INTERVAL`]) and
    /// polling for new messages (when it doesn't).
    ///
    /// # Errors
    ///
    /// Returns a transport, codec, or protocol error if the connection
    /// breaks or the server sends something unexpected.
    pub async fn run(
        &mut self,
        mut inqueue: mpsc::Receiver<String>,
        outqueue: mpsc::Sender<ChatRecord>,
    ) -> Result<(), ClientError> {
        self.poll_messages(BACKFILL_COUNT, &outqueue).await?;

        loop {
            match timeout(POLL_INTERVAL, inqueue.recv()).await {
                Ok(Some(line)) => {
                    self.post(&line, &outqueue).await?;
                },
                Ok(None) => return Ok(()),
                Err(_elapsed) => {
                    self.poll_messages(POLL_COUNT, &outqueue).await?;
                },
            }
        }
    }

    async fn post(&mut self, body: &str, outqueue: &mpsc::Sender<ChatRecord>) -> Result<(), ClientError> {
        send_request(&mut self.stream, &Message::PostRequest { uid: self.uid, thread_id: 0, body: body.to_string() })
            .await?;

        let response = recv_response(&mut self.stream).await?;
        let Message::PostResponse { mid, .. } = response else {
            return Err(ClientError::UnexpectedResponse);
        };
        if mid == REJECT_SENTINEL {
            let _ = outqueue
                .send(ChatRecord::Error { timestamp: 0.0, body: "post rejected by server".to_string() })
                .await;
            return Ok(());
        }

        self.last_delivered_mid = Some(self.last_delivered_mid.map_or(mid, |prev| prev.max(mid)));
        let _ = outqueue
            .send(ChatRecord::Message {
                mid,
                timestamp: 0.0,
                author_uid: self.uid,
                author_name: self.known_usernames.get(&self.uid).cloned().unwrap_or_default(),
                body: body.to_string(),
            })
            .await;
        Ok(())
    }

    async fn poll_messages(&mut self, count: u8, outqueue: &mpsc::Sender<ChatRecord>) -> Result<(), ClientError> {
        send_request(&mut self.stream, &Message::MessagesRequest { uid: self.uid, thread_id: 0, count }).await?;

        let response = recv_response(&mut self.stream).await?;
        let Message::MessagesResponse { messages, .. } = response else {
            return Err(ClientError::UnexpectedResponse);
        };

        let fresh: Vec<_> = messages
            .into_iter()
            .filter(|(mid, ..)| self.last_delivered_mid.is_none_or(|last| *mid > last))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        let unknown: Vec<u64> = fresh
            .iter()
            .map(|(_, _, author_uid, _)| *author_uid)
            .filter(|uid| !self.known_usernames.contains_key(uid))
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        if !unknown.is_empty() {
            send_request(&mut self.stream, &Message::UsersRequest { uid: self.uid, target_uids: unknown }).await?;
            let response = recv_response(&mut self.stream).await?;
            let Message::UsersResponse { users, .. } = response else {
                return Err(ClientError::UnexpectedResponse);
            };
            for (uid, name) in users {
                self.known_usernames.insert(uid, name);
            }
        }

        for (mid, timestamp, author_uid, body) in fresh {
            self.last_delivered_mid = Some(self.last_delivered_mid.map_or(mid, |prev| prev.max(mid)));
            let author_name = self.known_usernames.get(&author_uid).cloned().unwrap_or_else(|| "Unknown".to_string());
            if outqueue.send(ChatRecord::Message { mid, timestamp, author_uid, author_name, body }).await.is_err() {
                return Err(ClientError::UiDisconnected);
            }
        }
        Ok(())
    }
}

async fn send_request(stream: &mut (impl AsyncWrite + Unpin), message: &Message) -> Result<(), ClientError> {
    let mut buf = Vec::new();
    message.encode(&mut buf);
    send_frame(stream, &buf).await?;
    Ok(())
}

async fn recv_response(stream: &mut (impl AsyncRead + Unpin)) -> Result<Message, ClientError> {
    let payload = recv_frame(stream, MAX_FRAME_LEN).await?;
    Ok(Message::decode(&payload)?)
}
