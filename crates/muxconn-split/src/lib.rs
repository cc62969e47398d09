//! Split one byte-stream connection into N logical connections.
//!
//! Both ends call [`split`] (or a variant) with the same `N` and get back
//! `N` [`MuxConn`]s, each usable as an ordinary `Read + Write` stream. Data
//! written on channel `k` on one end is read from channel `k` on the other.
//!
//! A stream that only flows one way (a pipe, child process stdio) can be
//! split on its own with [`split_reader`] or [`split_writer`].
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use std::net::TcpStream;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:7000")?;
//! let mut conns = muxconn_split::split(stream, 2)?;
//!
//! conns[1].write_all(b"hello")?;
//! let mut reply = [0u8; 5];
//! conns[1].read_exact(&mut reply)?;
//! # Ok(())
//! # }
//! ```

mod closer;
pub mod config;
mod conn;
pub mod error;
mod half;
mod pump;
pub mod queue;
pub mod serializer;
mod session;
mod split;

pub use config::{FatalHook, InboundMode, MuxConfig};
pub use conn::MuxConn;
pub use error::{fatal_violation, MuxError, ProtocolViolation, Result};
pub use half::{
    split_reader, split_reader_with_config, split_writer, split_writer_with_config, MuxReader,
    MuxWriter,
};
pub use serializer::PartialWrite;
pub use split::{split, split_buffered, split_with_config};
