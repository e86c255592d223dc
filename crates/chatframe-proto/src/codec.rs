//! The eight protocol messages carried inside frame payloads.
//!
//! All integers are big-endian network order. Strings are UTF-8, not
//! NUL-terminated, with an explicit length prefix. A payload's first byte is
//! always the [`Code`]; everything after it is message-specific.
//!
//! `thread_id` is reserved for a future multi-thread extension. It is
//! carried and echoed on every request/response that has it, but this
//! implementation never dispatches on its value.

use bytes::{Buf, BufMut};

use crate::error::CodecError;

/// Sentinel value used in `uid`/`mid` response fields to signal rejection:
/// a failed login (`CONNECT_RESPONSE`) or an auth-mismatched post
/// (`POST_RESPONSE`). `0` is reserved for the "server" uid and therefore a
/// poor choice for "no value"; `u64::MAX` can never arise from the dense,
/// positive id assignment the store performs.
pub const REJECT_SENTINEL: u64 = u64::MAX;

/// One-byte message discriminant, carried as the first byte of every
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    /// Client requests authentication or registration.
    ConnectRequest = 0,
    /// Server's answer to `ConnectRequest`.
    ConnectResponse = 1,
    /// Client asks the server to resolve usernames for a set of uids.
    UsersRequest = 2,
    /// Server's answer to `UsersRequest`.
    UsersResponse = 3,
    /// Client asks for the most recent messages in a thread.
    MessagesRequest = 4,
    /// Server's answer to `MessagesRequest`.
    MessagesResponse = 5,
    /// Client posts a new message.
    PostRequest = 6,
    /// Server's answer to `PostRequest`.
    PostResponse = 7,
}

impl Code {
    /// Maps a raw wire byte to a [`Code`], or `None` for any value above 7.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::ConnectRequest),
            1 => Some(Self::ConnectResponse),
            2 => Some(Self::UsersRequest),
            3 => Some(Self::UsersResponse),
            4 => Some(Self::MessagesRequest),
            5 => Some(Self::MessagesResponse),
            6 => Some(Self::PostRequest),
            7 => Some(Self::PostResponse),
            _ => None,
        }
    }
}

/// A decoded protocol message. Each variant matches one [`Code`] exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `CONNECT_REQUEST`: `uid` is the caller's claimed id (ignored by the
    /// server on first contact; `0` is conventional), `username`/`password`
    /// are the credentials to register-or-authenticate.
    ConnectRequest { uid: u64, username: String, password: String },
    /// `CONNECT_RESPONSE`: the session's uid, or [`REJECT_SENTINEL`] on
    /// authentication failure.
    ConnectResponse { uid: u64 },
    /// `USERS_REQUEST`: resolve each of `target_uids` to a display name.
    UsersRequest { uid: u64, target_uids: Vec<u64> },
    /// `USERS_RESPONSE`: resolved `(uid, name)` pairs, same order as
    /// requested. Unknown uids carry the name `"Unknown"`.
    UsersResponse { uid: u64, users: Vec<(u64, String)> },
    /// `MESSAGES_REQUEST`: ask for up to `count` of the most recent
    /// messages in `thread_id`.
    MessagesRequest { uid: u64, thread_id: u64, count: u8 },
    /// `MESSAGES_RESPONSE`: up to `count` messages, oldest first, each
    /// `(mid, timestamp, author_uid, body)`.
    MessagesResponse { uid: u64, messages: Vec<(u64, f64, u64, String)> },
    /// `POST_REQUEST`: append `body` to `thread_id` on behalf of `uid`.
    PostRequest { uid: u64, thread_id: u64, body: String },
    /// `POST_RESPONSE`: the assigned `mid`, or [`REJECT_SENTINEL`] if the
    /// claimed uid did not match the session's authenticated uid.
    PostResponse { uid: u64, thread_id: u64, mid: u64 },
}

impl Message {
    /// The [`Code`] this message encodes as.
    #[must_use]
    pub const fn code(&self) -> Code {
        match self {
            Self::ConnectRequest { .. } => Code::ConnectRequest,
            Self::ConnectResponse { .. } => Code::ConnectResponse,
            Self::UsersRequest { .. } => Code::UsersRequest,
            Self::UsersResponse { .. } => Code::UsersResponse,
            Self::MessagesRequest { .. } => Code::MessagesRequest,
            Self::MessagesResponse { .. } => Code::MessagesResponse,
            Self::PostRequest { .. } => Code::PostRequest,
            Self::PostResponse { .. } => Code::PostResponse,
        }
    }

    /// Encodes this message into `dst`, including the leading code byte.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.code() as u8);
        match self {
            Self::ConnectRequest { uid, username, password } => {
                dst.put_u64(*uid);
                #[allow(clippy::cast_possible_truncation)]
                dst.put_u8(username.len() as u8);
                #[allow(clippy::cast_possible_truncation)]
                dst.put_u8(password.len() as u8);
                dst.put_slice(username.as_bytes());
                dst.put_slice(password.as_bytes());
            },
            Self::ConnectResponse { uid } => {
                dst.put_u64(*uid);
            },
            Self::UsersRequest { uid, target_uids } => {
                dst.put_u64(*uid);
                #[allow(clippy::cast_possible_truncation)]
                dst.put_u8(target_uids.len() as u8);
                for target in target_uids {
                    dst.put_u64(*target);
                }
            },
            Self::UsersResponse { uid, users } => {
                dst.put_u64(*uid);
                #[allow(clippy::cast_possible_truncation)]
                dst.put_u8(users.len() as u8);
                for (target_uid, name) in users {
                    dst.put_u64(*target_uid);
                    #[allow(clippy::cast_possible_truncation)]
                    dst.put_u8(name.len() as u8);
                }
                for (_, name) in users {
                    dst.put_slice(name.as_bytes());
                }
            },
            Self::MessagesRequest { uid, thread_id, count } => {
                dst.put_u64(*uid);
                dst.put_u64(*thread_id);
                dst.put_u8(*count);
            },
            Self::MessagesResponse { uid, messages } => {
                dst.put_u64(*uid);
                #[allow(clippy::cast_possible_truncation)]
                dst.put_u8(messages.len() as u8);
                for (mid, ts, author_uid, body) in messages {
                    dst.put_u64(*mid);
                    dst.put_f64(*ts);
                    dst.put_u64(*author_uid);
                    #[allow(clippy::cast_possible_truncation)]
                    dst.put_u16(body.len() as u16);
                }
                for (.., body) in messages {
                    dst.put_slice(body.as_bytes());
                }
            },
            Self::PostRequest { uid, thread_id, body } => {
                dst.put_u64(*uid);
                dst.put_u64(*thread_id);
                #[allow(clippy::cast_possible_truncation)]
                dst.put_u16(body.len() as u16);
                dst.put_slice(body.as_bytes());
            },
            Self::PostResponse { uid, thread_id, mid } => {
                dst.put_u64(*uid);
                dst.put_u64(*thread_id);
                dst.put_u64(*mid);
            },
        }
    }

    /// Decodes a message from a full payload (code byte included).
    ///
    /// # Errors
    ///
    /// - [`CodecError::UnknownCode`] if the leading byte is not `0..=7`.
    /// - [`CodecError::Malformed`] if the payload is shorter than the fixed
    ///   header for its code.
    /// - [`CodecError::Truncated`] if a declared variable-length tail
    ///   (name, body) is shorter than advertised.
    /// - [`CodecError::InvalidUtf8`] if a name or body is not valid UTF-8.
    pub fn decode(mut payload: &[u8]) -> Result<Self, CodecError> {
        if payload.is_empty() {
            return Err(CodecError::Malformed("empty payload".to_string()));
        }
        let code_byte = payload.get_u8();
        let code = Code::from_u8(code_byte).ok_or(CodecError::UnknownCode(code_byte))?;

        match code {
            Code::ConnectRequest => {
                require(&payload, 8 + 1 + 1, "CONNECT_REQUEST header")?;
                let uid = payload.get_u64();
                let nu = payload.get_u8() as usize;
                let np = payload.get_u8() as usize;
                let username = take_string(&mut payload, nu)?;
                let password = take_string(&mut payload, np)?;
                Ok(Self::ConnectRequest { uid, username, password })
            },
            Code::ConnectResponse => {
                require(&payload, 8, "CONNECT_RESPONSE")?;
                Ok(Self::ConnectResponse { uid: payload.get_u64() })
            },
            Code::UsersRequest => {
                require(&payload, 8 + 1, "USERS_REQUEST header")?;
                let uid = payload.get_u64();
                let n = payload.get_u8() as usize;
                require(&payload, n * 8, "USERS_REQUEST targets")?;
                let target_uids = (0..n).map(|_| payload.get_u64()).collect();
                Ok(Self::UsersRequest { uid, target_uids })
            },
            Code::UsersResponse => {
                require(&payload, 8 + 1, "USERS_RESPONSE header")?;
                let uid = payload.get_u64();
                let n = payload.get_u8() as usize;
                require(&payload, n * 9, "USERS_RESPONSE per-user headers")?;
                let headers: Vec<(u64, usize)> =
                    (0..n).map(|_| (payload.get_u64(), payload.get_u8() as usize)).collect();
                let mut users = Vec::with_capacity(n);
                for (target_uid, name_len) in headers {
                    let name = take_string(&mut payload, name_len)?;
                    users.push((target_uid, name));
                }
                Ok(Self::UsersResponse { uid, users })
            },
            Code::MessagesRequest => {
                require(&payload, 8 + 8 + 1, "MESSAGES_REQUEST")?;
                let uid = payload.get_u64();
                let thread_id = payload.get_u64();
                let count = payload.get_u8();
                Ok(Self::MessagesRequest { uid, thread_id, count })
            },
            Code::MessagesResponse => {
                require(&payload, 8 + 1, "MESSAGES_RESPONSE header")?;
                let uid = payload.get_u64();
                let n = payload.get_u8() as usize;
                require(&payload, n * (8 + 8 + 8 + 2), "MESSAGES_RESPONSE per-message headers")?;
                let headers: Vec<(u64, f64, u64, usize)> = (0..n)
                    .map(|_| {
                        (
                            payload.get_u64(),
                            payload.get_f64(),
                            payload.get_u64(),
                            payload.get_u16() as usize,
                        )
                    })
                    .collect();
                let mut messages = Vec::with_capacity(n);
                for (mid, ts, author_uid, body_len) in headers {
                    let body = take_string(&mut payload, body_len)?;
                    messages.push((mid, ts, author_uid, body));
                }
                Ok(Self::MessagesResponse { uid, messages })
            },
            Code::PostRequest => {
                require(&payload, 8 + 8 + 2, "POST_REQUEST header")?;
                let uid = payload.get_u64();
                let thread_id = payload.get_u64();
                let body_len = payload.get_u16() as usize;
                let body = take_string(&mut payload, body_len)?;
                Ok(Self::PostRequest { uid, thread_id, body })
            },
            Code::PostResponse => {
                require(&payload, 8 + 8 + 8, "POST_RESPONSE")?;
                let uid = payload.get_u64();
                let thread_id = payload.get_u64();
                let mid = payload.get_u64();
                Ok(Self::PostResponse { uid, thread_id, mid })
            },
        }
    }
}

fn require(remaining: &[u8], needed: usize, what: &str) -> Result<(), CodecError> {
    if remaining.len() < needed {
        return Err(CodecError::Malformed(format!(
            "{what}: need {needed} bytes, have {}",
            remaining.len()
        )));
    }
    Ok(())
}

fn take_string(buf: &mut &[u8], len: usize) -> Result<String, CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::Truncated { expected: len, actual: buf.remaining() });
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::InvalidUtf8(e.to_string()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn encode_to_vec(msg: &Message) -> Vec<u8> {
        let mut buf = Vec::new();
        msg.encode(&mut buf);
        buf
    }

    #[test]
    fn connect_request_round_trip() {
        let msg = Message::ConnectRequest {
            uid: 0,
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let wire = encode_to_vec(&msg);
        assert_eq!(Message::decode(&wire).unwrap(), msg);
    }

    #[test]
    fn users_response_round_trip_multiple_names() {
        let msg = Message::UsersResponse {
            uid: 2,
            users: vec![(1, "alice".to_string()), (999, "Unknown".to_string())],
        };
        let wire = encode_to_vec(&msg);
        assert_eq!(Message::decode(&wire).unwrap(), msg);
    }

    #[test]
    fn messages_response_round_trip_multiple_bodies() {
        let msg = Message::MessagesResponse {
            uid: 2,
            messages: vec![
                (1, 1_700_000_000.5, 1, "hello".to_string()),
                (2, 1_700_000_001.25, 1, "world".to_string()),
            ],
        };
        let wire = encode_to_vec(&msg);
        assert_eq!(Message::decode(&wire).unwrap(), msg);
    }

    #[test]
    fn post_response_reject_sentinel_round_trips() {
        let msg = Message::PostResponse { uid: 2, thread_id: 0, mid: REJECT_SENTINEL };
        let wire = encode_to_vec(&msg);
        assert_eq!(Message::decode(&wire).unwrap(), msg);
    }

    #[test]
    fn unknown_code_is_rejected() {
        let wire = vec![200u8, 0, 0];
        assert!(matches!(Message::decode(&wire), Err(CodecError::UnknownCode(200))));
    }

    #[test]
    fn empty_payload_is_malformed() {
        assert!(matches!(Message::decode(&[]), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn truncated_header_is_malformed() {
        // CONNECT_RESPONSE needs 8 bytes of uid after the code; give it 2.
        let wire = vec![Code::ConnectResponse as u8, 0, 0];
        assert!(matches!(Message::decode(&wire), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn truncated_body_is_reported() {
        // POST_REQUEST declares a 5-byte body but only 2 are present.
        let mut wire = Vec::new();
        wire.push(Code::PostRequest as u8);
        wire.extend_from_slice(&1u64.to_be_bytes());
        wire.extend_from_slice(&0u64.to_be_bytes());
        wire.extend_from_slice(&5u16.to_be_bytes());
        wire.extend_from_slice(b"hi");
        assert!(matches!(Message::decode(&wire), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn invalid_utf8_body_is_rejected() {
        let mut wire = Vec::new();
        wire.push(Code::PostRequest as u8);
        wire.extend_from_slice(&1u64.to_be_bytes());
        wire.extend_from_slice(&0u64.to_be_bytes());
        wire.extend_from_slice(&2u16.to_be_bytes());
        wire.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(Message::decode(&wire), Err(CodecError::InvalidUtf8(_))));
    }

    fn arb_short_string() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{0,40}"
    }

    proptest! {
        #[test]
        fn connect_request_round_trip_prop(
            uid in any::<u64>(),
            username in arb_short_string(),
            password in arb_short_string(),
        ) {
            let msg = Message::ConnectRequest { uid, username, password };
            let wire = encode_to_vec(&msg);
            prop_assert_eq!(Message::decode(&wire).unwrap(), msg);
        }

        #[test]
        fn post_request_round_trip_prop(
            uid in any::<u64>(),
            thread_id in any::<u64>(),
            body in "[\\PC]{0,200}",
        ) {
            let msg = Message::PostRequest { uid, thread_id, body };
            let wire = encode_to_vec(&msg);
            prop_assert_eq!(Message::decode(&wire).unwrap(), msg);
        }

        #[test]
        fn users_request_round_trip_prop(uid in any::<u64>(), targets in prop::collection::vec(any::<u64>(), 0..20)) {
            let msg = Message::UsersRequest { uid, target_uids: targets };
            let wire = encode_to_vec(&msg);
            prop_assert_eq!(Message::decode(&wire).unwrap(), msg);
        }
    }
}
