//! Channel frames for connection multiplexing.
//!
//! Every chunk of logical-connection data travels in a frame made of:
//! - the channel number as an unsigned LEB128 varint
//! - the payload length as an unsigned LEB128 varint
//! - the payload bytes
//!
//! Both integers use their unique minimal encoding, so frame boundaries are
//! determined by the stream alone.

pub mod codec;
pub mod error;
pub mod reader;
pub mod varint;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, MAX_FRAME_PAYLOAD};
pub use error::{FrameError, Result, VarintError};
pub use reader::FrameReader;
pub use writer::FrameWriter;
