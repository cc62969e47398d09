use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::varint::{peek_uvarint, put_uvarint, uvarint_len};

/// Default maximum payload per frame.
///
/// Large writes are split into frames of at most this size so that one
/// channel never holds the shared write path for longer than one frame.
pub const MAX_FRAME_PAYLOAD: usize = 4096;

/// A payload routed to one logical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel number, assigned by index when a connection is split.
    pub channel: u32,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (both header varints + payload).
    pub fn wire_size(&self) -> usize {
        uvarint_len(u64::from(self.channel))
            + uvarint_len(self.payload.len() as u64)
            + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────────────┬──────────────────┐
/// │ Channel          │ Length           │ Payload          │
/// │ (uvarint)        │ (uvarint)        │ (Length bytes)   │
/// └──────────────────┴──────────────────┴──────────────────┘
/// ```
/// There is no end marker; the length field alone delimits the frame.
pub fn encode_frame(channel: u32, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(uvarint_len(u64::from(channel)) + uvarint_len(payload.len() as u64) + payload.len());
    put_uvarint(dst, u64::from(channel));
    put_uvarint(dst, payload.len() as u64);
    dst.put_slice(payload);
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame's bytes from the buffer. A length
/// above `max_payload` is rejected as soon as the header is readable.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some((channel, channel_len)) =
        peek_uvarint(src).map_err(|source| FrameError::Varint {
            field: "channel",
            source,
        })?
    else {
        return Ok(None);
    };
    let channel = u32::try_from(channel).map_err(|_| FrameError::ChannelOverflow(channel))?;

    let Some((length, length_len)) =
        peek_uvarint(&src[channel_len..]).map_err(|source| FrameError::Varint {
            field: "length",
            source,
        })?
    else {
        return Ok(None);
    };
    if length > max_payload as u64 {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }

    let header = channel_len + length_len;
    let length = length as usize;
    if src.len() < header + length {
        return Ok(None);
    }

    src.advance(header);
    let payload = src.split_to(length).freeze();

    Ok(Some(Frame { channel, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: [`MAX_FRAME_PAYLOAD`].
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_FRAME_PAYLOAD,
        }
    }
}
