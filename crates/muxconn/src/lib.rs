//! Connection multiplexing over a single byte stream.
//!
//! `muxconn` splits one reliable, ordered, bidirectional connection (TCP or a
//! Unix domain socket) into N logical connections, each an ordinary
//! `Read + Write` stream. Both ends split with the same N; frames carry the
//! channel number and a length, both as unsigned varints.
//!
//! # Crate Structure
//!
//! - [`transport`]: physical connections, addresses, listeners
//! - [`frame`]: the channel frame codec
//! - the top-level re-exports of `muxconn-split`: [`split`],
//!   [`split_buffered`], [`split_with_config`] and [`MuxConn`], plus the
//!   one-way [`split_reader`] and [`split_writer`]

/// Re-export transport types.
pub mod transport {
    pub use muxconn_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use muxconn_frame::*;
}

pub use muxconn_split::{
    fatal_violation, split, split_buffered, split_reader, split_reader_with_config,
    split_with_config, split_writer, split_writer_with_config, FatalHook, InboundMode, MuxConfig,
    MuxConn, MuxError, MuxReader, MuxWriter, PartialWrite, ProtocolViolation, Result,
};
