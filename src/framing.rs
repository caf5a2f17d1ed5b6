//! Length-prefixed message framing.
//!
//! Every frame is `[u16 le body_len][body_bytes]`, `body_len` excluding
//! the header; this module owns only the frame boundary, serializing
//! the body with `serde_json` via a generic bound on the message type.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{VenueError, VenueResult};

/// Body length is bounded by this; oversized bodies are rejected rather
/// than truncated.
pub const MAX_SERIALIZED_MESSAGE_SIZE: usize = 4096;

const HEADER_LEN: usize = 2;

/// Serializes `msg` as `[u16 le len][body]`.
pub fn frame<M: Serialize>(msg: &M) -> VenueResult<Vec<u8>> {
    let body = serde_json::to_vec(msg)
        .map_err(|e| VenueError::Serialization(format!("encode failed: {e}")))?;
    if body.len() > MAX_SERIALIZED_MESSAGE_SIZE {
        return Err(VenueError::Framing(format!(
            "body {} exceeds max {}",
            body.len(),
            MAX_SERIALIZED_MESSAGE_SIZE
        )));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Scans `buf` for complete frames, invoking `consumer` with each decoded
/// message. Returns the number of bytes consumed — a frame straddling the
/// end of `buf` is left untouched for the next call. On a deserialization
/// failure the error is returned immediately and no further frames in
/// `buf` are processed this call (the caller drops the message and keeps
/// reading — see `session::channel`).
pub fn unframe<M, F>(buf: &[u8], mut consumer: F) -> VenueResult<usize>
where
    M: DeserializeOwned,
    F: FnMut(M),
{
    let mut offset = 0;
    loop {
        if buf.len() - offset < HEADER_LEN {
            break;
        }
        let len = u16::from_le_bytes([buf[offset], buf[offset + 1]]) as usize;
        if len > MAX_SERIALIZED_MESSAGE_SIZE {
            return Err(VenueError::Framing(format!(
                "frame body {len} exceeds max {MAX_SERIALIZED_MESSAGE_SIZE}"
            )));
        }
        let frame_end = offset + HEADER_LEN + len;
        if buf.len() < frame_end {
            break;
        }
        let body = &buf[offset + HEADER_LEN..frame_end];
        let msg: M = serde_json::from_slice(body)
            .map_err(|e| VenueError::Serialization(format!("decode failed: {e}")))?;
        consumer(msg);
        offset = frame_end;
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Msg(u32);

    #[test]
    fn roundtrip_single_message() {
        let bytes = frame(&Msg(42)).unwrap();
        let mut seen = Vec::new();
        let consumed = unframe::<Msg, _>(&bytes, |m| seen.push(m)).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(seen, vec![Msg(42)]);
    }

    #[test]
    fn partial_frame_preserved_for_next_read() {
        let bytes = frame(&Msg(7)).unwrap();
        let (first, second) = bytes.split_at(bytes.len() - 1);

        let mut seen: Vec<Msg> = Vec::new();
        let consumed = unframe::<Msg, _>(first, |m| seen.push(m)).unwrap();
        assert_eq!(consumed, 0);
        assert!(seen.is_empty());

        let mut full = first.to_vec();
        full.extend_from_slice(second);
        let consumed = unframe::<Msg, _>(&full, |m| seen.push(m)).unwrap();
        assert_eq!(consumed, full.len());
        assert_eq!(seen, vec![Msg(7)]);
    }

    #[test]
    fn chunked_feed_matches_single_feed() {
        let mut all_bytes = Vec::new();
        for i in 0..5u32 {
            all_bytes.extend(frame(&Msg(i)).unwrap());
        }

        let mut whole: Vec<Msg> = Vec::new();
        unframe::<Msg, _>(&all_bytes, |m| whole.push(m)).unwrap();

        // Feed byte-by-byte, carrying the unconsumed remainder forward.
        let mut chunked: Vec<Msg> = Vec::new();
        let mut carry: Vec<u8> = Vec::new();
        for &b in &all_bytes {
            carry.push(b);
            let consumed = unframe::<Msg, _>(&carry, |m| chunked.push(m)).unwrap();
            carry.drain(..consumed);
        }
        assert!(carry.is_empty());
        assert_eq!(chunked, whole);
    }

    #[test]
    fn oversized_body_rejected() {
        let huge = vec![0u8; MAX_SERIALIZED_MESSAGE_SIZE + 1];
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_SERIALIZED_MESSAGE_SIZE + 1) as u16).to_le_bytes());
        buf.extend_from_slice(&huge);
        let result = unframe::<Msg, _>(&buf, |_: Msg| {});
        assert!(result.is_err());
    }
}
