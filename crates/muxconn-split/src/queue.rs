//! Per-channel inbound queues.
//!
//! The receive pump is the only producer and the owning logical connection
//! the only consumer. Two flavours share the [`InboundQueue`] interface:
//! [`RelayQueue`] hands one payload at a time to the reader, and
//! [`BoundedQueue`] buffers up to a fixed number of bytes.

use std::io;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, Bytes, BytesMut};

use crate::config::InboundMode;
use crate::error::{MuxError, ProtocolViolation, Result};

/// Why no more data will be pushed into a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The physical connection closed or could not be decoded.
    Eof,
    /// The peer broke the framing protocol.
    Fatal(ProtocolViolation),
}

impl StreamEnd {
    fn read_result(&self) -> io::Result<usize> {
        match self {
            StreamEnd::Eof => Ok(0),
            StreamEnd::Fatal(violation) => {
                Err(MuxError::ProtocolViolation(violation.clone()).into())
            }
        }
    }
}

/// Outcome of pushing a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload is (or has been) available to the reader.
    Delivered,
    /// The reader closed its logical connection; the payload was dropped.
    Discarded,
}

/// Queue between the receive pump and one logical connection.
pub trait InboundQueue: Send + Sync {
    /// Queue a payload. May block until the reader makes room.
    fn push(&self, payload: Bytes) -> Delivery;

    /// Read queued bytes, blocking while the queue is empty and not ended.
    /// Returns `Ok(0)` at end-of-stream.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Mark the end of the stream. Buffered bytes stay readable. Only the
    /// first call takes effect.
    fn finish(&self, end: StreamEnd);

    /// The reader has gone away: drop buffered bytes, unblock the producer
    /// and discard everything pushed from now on.
    fn abandon(&self);

    /// Bytes currently waiting to be read.
    fn buffered(&self) -> usize;
}

pub(crate) fn for_mode(mode: InboundMode) -> Result<Box<dyn InboundQueue>> {
    Ok(match mode {
        InboundMode::Relay => Box::new(RelayQueue::new()),
        InboundMode::Bounded { capacity } => Box::new(BoundedQueue::new(capacity)?),
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct RelayState {
    slot: Bytes,
    end: Option<StreamEnd>,
    abandoned: bool,
}

/// Single-slot handoff: `push` returns only once the reader has consumed the
/// whole payload (or abandoned the queue).
#[derive(Default)]
pub struct RelayQueue {
    state: Mutex<RelayState>,
    readable: Condvar,
    drained: Condvar,
}

impl RelayQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InboundQueue for RelayQueue {
    fn push(&self, payload: Bytes) -> Delivery {
        if payload.is_empty() {
            return Delivery::Delivered;
        }

        let mut state = lock(&self.state);
        if state.abandoned {
            return Delivery::Discarded;
        }
        state.slot = payload;
        self.readable.notify_all();

        while !state.slot.is_empty() && !state.abandoned {
            state = wait(&self.drained, state);
        }
        if state.abandoned {
            state.slot.clear();
            Delivery::Discarded
        } else {
            Delivery::Delivered
        }
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = lock(&self.state);
        loop {
            if state.abandoned {
                return Ok(0);
            }
            if !state.slot.is_empty() {
                let n = buf.len().min(state.slot.len());
                buf[..n].copy_from_slice(&state.slot[..n]);
                state.slot.advance(n);
                if state.slot.is_empty() {
                    self.drained.notify_all();
                }
                return Ok(n);
            }
            if let Some(end) = &state.end {
                return end.read_result();
            }
            state = wait(&self.readable, state);
        }
    }

    fn finish(&self, end: StreamEnd) {
        let mut state = lock(&self.state);
        if state.end.is_none() {
            state.end = Some(end);
        }
        self.readable.notify_all();
    }

    fn abandon(&self) {
        let mut state = lock(&self.state);
        state.abandoned = true;
        state.slot.clear();
        self.readable.notify_all();
        self.drained.notify_all();
    }

    fn buffered(&self) -> usize {
        lock(&self.state).slot.len()
    }
}

#[derive(Default)]
struct BoundedState {
    buf: BytesMut,
    end: Option<StreamEnd>,
    abandoned: bool,
}

/// Closeable byte buffer holding at most `capacity` bytes. `push` blocks
/// while the buffer is full, copying large payloads in as space frees up.
pub struct BoundedQueue {
    state: Mutex<BoundedState>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl BoundedQueue {
    /// Fails with [`MuxError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MuxError::InvalidCapacity);
        }
        Ok(Self {
            state: Mutex::new(BoundedState {
                buf: BytesMut::with_capacity(capacity.min(64 * 1024)),
                ..BoundedState::default()
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl InboundQueue for BoundedQueue {
    fn push(&self, payload: Bytes) -> Delivery {
        let mut rest = payload.as_ref();
        let mut state = lock(&self.state);

        while !rest.is_empty() {
            while state.buf.len() >= self.capacity && !state.abandoned {
                state = wait(&self.not_full, state);
            }
            if state.abandoned {
                return Delivery::Discarded;
            }
            let n = (self.capacity - state.buf.len()).min(rest.len());
            state.buf.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            self.not_empty.notify_all();
        }
        Delivery::Delivered
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = lock(&self.state);
        loop {
            if state.abandoned {
                return Ok(0);
            }
            if !state.buf.is_empty() {
                let n = buf.len().min(state.buf.len());
                buf[..n].copy_from_slice(&state.buf[..n]);
                state.buf.advance(n);
                self.not_full.notify_all();
                return Ok(n);
            }
            if let Some(end) = &state.end {
                return end.read_result();
            }
            state = wait(&self.not_empty, state);
        }
    }

    fn finish(&self, end: StreamEnd) {
        let mut state = lock(&self.state);
        if state.end.is_none() {
            state.end = Some(end);
        }
        self.not_empty.notify_all();
    }

    fn abandon(&self) {
        let mut state = lock(&self.state);
        state.abandoned = true;
        state.buf.clear();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn buffered(&self) -> usize {
        lock(&self.state).buf.len()
    }
}
