//! Length-prefixed byte-stream framing.
//!
//! Every logical message on the wire is prefixed by an unsigned 32-bit
//! big-endian length `L`, followed by exactly `L` payload bytes. `send_frame`
//! writes the length then the payload, looping until every byte lands;
//! `recv_frame` reads the 4-byte length, then reads exactly that many
//! payload bytes, looping over short reads. A clean end-of-stream before a
//! complete frame is obtained is reported as [`FrameError::Disconnected`]
//! rather than as a generic I/O error, since it is the routine way a peer
//! hangs up.
//!
//! # Invariants
//!
//! - `recv_frame` never allocates more than `max_len` bytes for a claimed
//!   payload before validating the length against the caller's ceiling.
//! - `send_frame` rejects payloads over `u32::MAX` at the type level (the
//!   length field is a `u32`); callers additionally pass `max_len` to cap
//!   well below that.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;

/// Default ceiling on frame length, in bytes (16 MiB).
///
/// The protocol's only hard floor is that implementations must not impose a
/// maximum smaller than 65 KiB; 16 MiB is a reasonable cap well above any
/// legitimate chat payload (message bodies are capped at `u16::MAX` bytes
/// by the codec itself) while still bounding worst-case allocation.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Writes `payload` as a single length-prefixed frame, looping until every
/// byte has been written.
///
/// # Errors
///
/// Returns [`FrameError::Io`] if the underlying write fails at any point.
pub async fn send_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame, returning its payload bytes.
///
/// # Errors
///
/// - [`FrameError::Disconnected`] if the stream ends before a complete
///   4-byte length or the declared payload is fully read.
/// - [`FrameError::FrameTooLarge`] if the declared length exceeds `max_len`.
/// - [`FrameError::Io`] on any other I/O failure.
pub async fn recv_frame<R>(reader: &mut R, max_len: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::Disconnected);
        },
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_be_bytes(len_bytes);
    if len > max_len {
        return Err(FrameError::FrameTooLarge { size: len, max: max_len });
    }

    let mut payload = vec![0u8; len as usize];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::Disconnected);
        },
        Err(e) => return Err(FrameError::Io(e)),
    }

    Ok(payload)
}
