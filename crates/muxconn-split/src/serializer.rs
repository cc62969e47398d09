//! Serialized write path shared by every logical connection of a session.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use muxconn_frame::{FrameConfig, FrameError, FrameWriter};

/// A write that stopped part way through.
///
/// `written` counts the payload bytes whose frames reached the physical
/// connection before `error` occurred.
#[derive(Debug)]
pub struct PartialWrite {
    pub written: usize,
    pub error: io::Error,
}

impl fmt::Display for PartialWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write failed after {} bytes: {}", self.written, self.error)
    }
}

impl std::error::Error for PartialWrite {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// First write failure seen on the physical connection, replayed to every
/// later writer.
#[derive(Debug, Clone)]
struct WriteFailure {
    kind: io::ErrorKind,
    message: String,
}

impl WriteFailure {
    fn to_error(&self) -> io::Error {
        io::Error::new(self.kind, self.message.clone())
    }
}

struct WriterState<W> {
    writer: Option<FrameWriter<W>>,
    failure: Option<WriteFailure>,
}

/// Mutual exclusion around the physical connection's write half.
///
/// Each frame is written under the lock, so bytes of different frames never
/// interleave. A multi-frame write releases the lock between frames, letting
/// other channels' frames slip in between its chunks.
pub struct WriteSerializer<W> {
    state: Mutex<WriterState<W>>,
    max_frame_size: usize,
}

impl<W: Write> WriteSerializer<W> {
    pub fn new(inner: W, max_frame_size: usize) -> Self {
        let config = FrameConfig {
            max_payload_size: max_frame_size,
        };
        Self {
            state: Mutex::new(WriterState {
                writer: Some(FrameWriter::with_config(inner, config)),
                failure: None,
            }),
            max_frame_size,
        }
    }

    /// Send `data` on `channel`, split into frames of at most
    /// `max_frame_size` bytes. An empty `data` sends nothing.
    pub fn write(&self, channel: u32, data: &[u8]) -> Result<usize, PartialWrite> {
        let mut written = 0usize;
        for chunk in data.chunks(self.max_frame_size) {
            if let Err(error) = self.send_frame(channel, chunk) {
                return Err(PartialWrite { written, error });
            }
            written += chunk.len();
        }
        Ok(written)
    }

    /// Whether an earlier write has already failed.
    pub fn has_failed(&self) -> bool {
        self.lock().failure.is_some()
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Flush and drop the underlying writer, which closes pipes and similar
    /// streams. Later writes fail with `NotConnected`. Only the first call
    /// does anything.
    pub fn close(&self) -> io::Result<()> {
        let mut state = self.lock();
        let Some(mut writer) = state.writer.take() else {
            return Ok(());
        };
        if state.failure.is_some() {
            return Ok(());
        }
        state.failure = Some(WriteFailure {
            kind: io::ErrorKind::NotConnected,
            message: "multiplexed writer closed".to_string(),
        });
        writer.flush().map_err(frame_error_to_io)
    }

    fn send_frame(&self, channel: u32, chunk: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if let Some(failure) = &state.failure {
            return Err(failure.to_error());
        }
        let Some(writer) = state.writer.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };

        match writer.send(channel, chunk) {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = frame_error_to_io(err);
                tracing::debug!(channel, error = %err, "write to physical connection failed");
                state.failure = Some(WriteFailure {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriterState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn frame_error_to_io(err: FrameError) -> io::Error {
    match err {
        FrameError::Io(inner) => inner,
        FrameError::ConnectionClosed => io::Error::from(io::ErrorKind::WriteZero),
        other => io::Error::new(io::ErrorKind::InvalidInput, other),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use bytes::BytesMut;
    use muxconn_frame::decode_frame;

    use super::*;

    fn frames(wire: &[u8]) -> Vec<(u32, Vec<u8>)> {
        let mut buf = BytesMut::from(wire);
        let mut out = Vec::new();
        while let Some(frame) = decode_frame(&mut buf, usize::MAX).unwrap() {
            out.push((frame.channel, frame.payload.to_vec()));
        }
        assert!(buf.is_empty(), "trailing bytes on the wire");
        out
    }

    fn wire_of(serializer: WriteSerializer<Cursor<Vec<u8>>>) -> Vec<u8> {
        let state = serializer
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        state.writer.unwrap().into_inner().into_inner()
    }

    #[test]
    fn large_writes_are_chunked() {
        let serializer = WriteSerializer::new(Cursor::new(Vec::new()), 4);
        assert_eq!(serializer.write(2, b"abcdefghij").unwrap(), 10);

        let sent = frames(&wire_of(serializer));
        assert_eq!(
            sent,
            vec![
                (2, b"abcd".to_vec()),
                (2, b"efgh".to_vec()),
                (2, b"ij".to_vec()),
            ]
        );
    }

    #[test]
    fn empty_write_sends_nothing() {
        let serializer = WriteSerializer::new(Cursor::new(Vec::new()), 4096);
        assert_eq!(serializer.write(0, b"").unwrap(), 0);
        assert!(wire_of(serializer).is_empty());
    }

    #[test]
    fn concurrent_writers_never_interleave_frames() {
        const WRITERS: u32 = 8;
        const ROUNDS: usize = 50;

        let serializer = Arc::new(WriteSerializer::new(Cursor::new(Vec::new()), 16));
        let barrier = Arc::new(Barrier::new(WRITERS as usize));

        let handles: Vec<_> = (0..WRITERS)
            .map(|channel| {
                let serializer = Arc::clone(&serializer);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let data = vec![channel as u8; 40];
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        serializer.write(channel, &data).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let serializer = Arc::into_inner(serializer).unwrap();
        let sent = frames(&wire_of(serializer));
        let mut totals = vec![0usize; WRITERS as usize];
        for (channel, payload) in sent {
            assert!(payload.len() <= 16);
            assert!(payload.iter().all(|&b| u32::from(b) == channel));
            totals[channel as usize] += payload.len();
        }
        assert!(totals.iter().all(|&total| total == 40 * ROUNDS));
    }

    #[test]
    fn failure_reports_partial_progress_and_sticks() {
        let serializer = WriteSerializer::new(FailAfter { remaining: 2 }, 3);

        let err = serializer.write(1, b"abcdefghi").unwrap_err();
        assert_eq!(err.written, 6);
        assert_eq!(err.error.kind(), io::ErrorKind::BrokenPipe);
        assert!(serializer.has_failed());

        let err = serializer.write(4, b"x").unwrap_err();
        assert_eq!(err.written, 0);
        assert_eq!(err.error.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn zero_length_write_becomes_write_zero() {
        let serializer = WriteSerializer::new(ZeroWriter, 8);
        let err = serializer.write(0, b"x").unwrap_err();
        assert_eq!(err.error.kind(), io::ErrorKind::WriteZero);
        assert!(err.to_string().starts_with("write failed after 0 bytes"));
    }

    /// Accepts `remaining` frames, then reports a broken pipe.
    struct FailAfter {
        remaining: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.remaining = self.remaining.saturating_sub(1);
            Ok(())
        }
    }

    #[test]
    fn close_flushes_once_and_rejects_later_writes() {
        let serializer = WriteSerializer::new(Cursor::new(Vec::new()), 16);
        serializer.write(3, b"last words").unwrap();
        serializer.close().unwrap();
        serializer.close().unwrap();

        let err = serializer.write(3, b"too late").unwrap_err();
        assert_eq!(err.written, 0);
        assert_eq!(err.error.kind(), io::ErrorKind::NotConnected);
        assert!(serializer.has_failed());
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
