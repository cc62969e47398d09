//! Physical connection abstraction for muxconn.
//!
//! Provides the [`Connection`] trait a multiplexing session needs from the
//! stream it splits, implemented for:
//! - TCP streams
//! - Unix domain sockets (Linux/macOS)
//!
//! plus address parsing, a [`Listener`] and [`connect`] for the CLI and
//! tests. This is the lowest layer of muxconn.

pub mod address;
pub mod error;
pub mod listener;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use address::{Address, Endpoint};
pub use error::{Result, TransportError};
pub use listener::{connect, Listener};
pub use traits::{Connection, Stream};

#[cfg(unix)]
pub use uds::UnixSocketListener;
