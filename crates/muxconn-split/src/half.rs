//! Splitting one direction of a stream: a reader alone or a writer alone.
//!
//! Pipes, child process stdio and other one-way streams cannot be shut down
//! through a [`Connection`](muxconn_transport::Connection). Here the source
//! or sink is owned outright and released by dropping it once every channel
//! has been closed.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::MuxConfig;
use crate::error::{MuxError, ProtocolViolation, Result};
use crate::pump;
use crate::queue::InboundQueue;
use crate::serializer::{PartialWrite, WriteSerializer};
use crate::session::{Demux, Inbound};
use crate::split::last_channel;

struct ReaderSession {
    inbound: Inbound,
    open: AtomicUsize,
}

impl Demux for ReaderSession {
    fn inbound(&self) -> &Inbound {
        &self.inbound
    }

    fn closed_locally(&self) -> bool {
        self.open.load(Ordering::Acquire) == 0
    }

    // The pump stops after a violation, dropping the reader.
    fn tear_down(&self) {}
}

/// Split a frame stream read from `reader` into `n` receive-only channels,
/// using relay queues.
pub fn split_reader<R: Read + Send + 'static>(reader: R, n: usize) -> Result<Vec<MuxReader>> {
    split_reader_with_config(reader, n, MuxConfig::relay())
}

/// Split `reader` into `n` receive-only channels with explicit configuration.
///
/// The pump thread owns `reader` and drops it once every returned
/// [`MuxReader`] is closed and the next frame arrives, or when the stream
/// ends.
pub fn split_reader_with_config<R: Read + Send + 'static>(
    reader: R,
    n: usize,
    config: MuxConfig,
) -> Result<Vec<MuxReader>> {
    let last = last_channel(n)?;
    config.validate()?;

    let session = Arc::new(ReaderSession {
        inbound: Inbound::new(config.inbound, n, config.on_fatal.clone())?,
        open: AtomicUsize::new(n),
    });
    pump::spawn(reader, Arc::clone(&session), config.max_frame_size)?;
    tracing::debug!(channels = n, inbound = ?config.inbound, "reader split");

    Ok((0..=last)
        .map(|channel| MuxReader {
            channel,
            session: Arc::clone(&session),
            closed: AtomicBool::new(false),
        })
        .collect())
}

/// Receive side of one channel of a [`split_reader`].
pub struct MuxReader {
    channel: u32,
    session: Arc<ReaderSession>,
    closed: AtomicBool,
}

impl MuxReader {
    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn channels(&self) -> usize {
        self.session.inbound.channels()
    }

    /// The protocol violation that ended the stream, if any.
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

    /// Read received bytes into `buf`. `Ok(0)` means end-of-stream.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }
        match self.queue() {
            Some(queue) => queue.read(buf),
            None => Ok(0),
        }
    }

    /// Stop receiving on this channel. Frames still arriving for it are
    /// discarded; the other channels keep being served.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(queue) = self.queue() {
            queue.abandon();
        }
        let before = self.session.open.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(channel = self.channel, open = before - 1, "reader closed");
    }

    fn queue(&self) -> Option<&dyn InboundQueue> {
        self.session.inbound.queue(self.channel)
    }
}

impl Read for MuxReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl Read for &MuxReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }
}

impl Drop for MuxReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for MuxReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxReader")
            .field("channel", &self.channel)
            .field("channels", &self.channels())
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct WriterSession<W> {
    writer: WriteSerializer<W>,
    channels: usize,
    open: AtomicUsize,
}

/// Split `writer` into `n` send-only channels framing onto it.
pub fn split_writer<W: Write + Send>(writer: W, n: usize) -> Result<Vec<MuxWriter<W>>> {
    split_writer_with_config(writer, n, MuxConfig::default())
}

/// Split `writer` into `n` send-only channels with explicit configuration.
/// Only `max_frame_size` applies to the send side.
///
/// `writer` is flushed and dropped when the last [`MuxWriter`] is closed.
pub fn split_writer_with_config<W: Write + Send>(
    writer: W,
    n: usize,
    config: MuxConfig,
) -> Result<Vec<MuxWriter<W>>> {
    let last = last_channel(n)?;
    config.validate()?;

    let session = Arc::new(WriterSession {
        writer: WriteSerializer::new(writer, config.max_frame_size),
        channels: n,
        open: AtomicUsize::new(n),
    });
    tracing::debug!(channels = n, max_frame_size = config.max_frame_size, "writer split");

    Ok((0..=last)
        .map(|channel| MuxWriter {
            channel,
            session: Arc::clone(&session),
            closed: AtomicBool::new(false),
        })
        .collect())
}

/// Send side of one channel of a [`split_writer`].
pub struct MuxWriter<W: Write> {
    channel: u32,
    session: Arc<WriterSession<W>>,
    closed: AtomicBool,
}

impl<W: Write> MuxWriter<W> {
    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn channels(&self) -> usize {
        self.session.channels
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send `data` on this channel, reporting how much was framed onto the
    /// underlying writer if the write fails part way.
    pub fn send(&self, data: &[u8]) -> std::result::Result<usize, PartialWrite> {
        if self.is_closed() {
            return Err(PartialWrite {
                written: 0,
                error: MuxError::Closed(self.channel).into(),
            });
        }
        self.session.writer.write(self.channel, data)
    }

    /// Close this channel. Closing the last open channel flushes and drops
    /// the underlying writer and reports a flush failure. Closing twice is a
    /// no-op.
    pub fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let before = self.session.open.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(channel = self.channel, open = before - 1, "writer closed");
        if before == 1 {
            return self.session.writer.close();
        }
        Ok(())
    }

    fn write_short(&self, buf: &[u8]) -> io::Result<usize> {
        match self.send(buf) {
            Ok(written) => Ok(written),
            Err(PartialWrite { written, .. }) if written > 0 => Ok(written),
            Err(PartialWrite { error, .. }) => Err(error),
        }
    }
}

impl<W: Write> Write for MuxWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_short(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Write for &MuxWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_short(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for MuxWriter<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(channel = self.channel, error = %err, "closing on drop failed");
        }
    }
}

impl<W: Write> fmt::Debug for MuxWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxWriter")
            .field("channel", &self.channel)
            .field("channels", &self.session.channels)
            .field("closed", &self.is_closed())
            .finish()
    }
}
