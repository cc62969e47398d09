use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use muxconn_transport::{Connection, Endpoint};

use crate::error::{MuxError, ProtocolViolation, Result};
use crate::queue::InboundQueue;
use crate::serializer::PartialWrite;
use crate::session::Session;

/// One logical connection carved out of a physical connection.
///
/// Usable from several threads at once through `&MuxConn`: reads drain this
/// channel's inbound queue and writes go through the session's shared,
/// serialized writer.
pub struct MuxConn<C: Connection> {
    channel: u32,
    session: Arc<Session<C>>,
    closed: AtomicBool,
}

impl<C: Connection> MuxConn<C> {
    pub(crate) fn new(channel: u32, session: Arc<Session<C>>) -> Self {
        Self {
            channel,
            session,
            closed: AtomicBool::new(false),
        }
    }

    /// Channel number of this logical connection.
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Number of logical connections the physical connection was split into.
    pub fn channels(&self) -> usize {
        self.session.inbound.channels()
    }

    /// Local endpoint of the physical connection.
    pub fn local_addr(&self) -> &Endpoint {
        &self.session.local
    }

    /// Remote endpoint of the physical connection.
    pub fn peer_addr(&self) -> &Endpoint {
        &self.session.remote
    }

    /// The protocol violation that ended the session, if any.
    pub fn fatal_error(&self) -> Option<&ProtocolViolation> {
        self.session.inbound.fatal_error()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Bytes received for this channel and not yet read.
    pub fn buffered(&self) -> usize {
        self.queue().map_or(0, |queue| queue.buffered())
    }

    /// Send `data` on this channel, reporting exactly how much reached the
    /// physical connection if the write fails part way.
    pub fn send(&self, data: &[u8]) -> std::result::Result<usize, PartialWrite> {
        if self.is_closed() {
            return Err(PartialWrite {
                written: 0,
                error: MuxError::Closed(self.channel).into(),
            });
        }
        self.session.writer.write(self.channel, data)
    }

    /// Read received bytes into `buf`, blocking until data arrives or the
    /// stream ends. `Ok(0)` means end-of-stream.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }
        match self.queue() {
            Some(queue) => queue.read(buf),
            None => Ok(0),
        }
    }

    /// Close this logical connection. Unread data is dropped and data the
    /// peer sends later is discarded. The physical connection is shut down
    /// when the last logical connection of the split closes; that call
    /// reports any shutdown failure. Closing twice is a no-op.
    pub fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(queue) = self.queue() {
            queue.abandon();
        }
        let result = self.session.closer.channel_closed();
        tracing::debug!(
            channel = self.channel,
            open = self.session.closer.open_channels(),
            "logical connection closed"
        );
        result
    }

    /// Not supported: logical connections share one physical stream.
    pub fn set_read_timeout(&self, _timeout: Option<Duration>) -> Result<()> {
        Err(MuxError::DeadlineUnsupported)
    }

    /// Not supported: logical connections share one physical stream.
    pub fn set_write_timeout(&self, _timeout: Option<Duration>) -> Result<()> {
        Err(MuxError::DeadlineUnsupported)
    }

    /// Not supported: logical connections share one physical stream.
    pub fn set_timeout(&self, _timeout: Option<Duration>) -> Result<()> {
        Err(MuxError::DeadlineUnsupported)
    }

    fn queue(&self) -> Option<&dyn InboundQueue> {
        self.session.inbound.queue(self.channel)
    }

    fn write_short(&self, buf: &[u8]) -> io::Result<usize> {
        match self.send(buf) {
            Ok(written) => Ok(written),
            Err(PartialWrite { written, .. }) if written > 0 => Ok(written),
            Err(PartialWrite { error, .. }) => Err(error),
        }
    }
}

impl<C: Connection> Read for MuxConn<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<C: Connection> Read for &MuxConn<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl<C: Connection> Write for MuxConn<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_short(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Connection> Write for &MuxConn<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_short(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Connection> Drop for MuxConn<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(channel = self.channel, error = %err, "closing on drop failed");
        }
    }
}

impl<C: Connection> fmt::Debug for MuxConn<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxConn")
            .field("channel", &self.channel)
            .field("channels", &self.channels())
            .field("local", &self.session.local)
            .field("peer", &self.session.remote)
            .field("closed", &self.is_closed())
            .finish()
    }
}
