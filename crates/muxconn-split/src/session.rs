use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use muxconn_transport::{Connection, Endpoint};

use crate::closer::CloseCoordinator;
use crate::config::{FatalHook, InboundMode};
use crate::error::{ProtocolViolation, Result};
use crate::queue::{self, InboundQueue, StreamEnd};
use crate::serializer::WriteSerializer;

/// Receive side of a split: one queue per channel plus the fatal slot.
pub(crate) struct Inbound {
    queues: Vec<Box<dyn InboundQueue>>,
    fatal: OnceLock<ProtocolViolation>,
    on_fatal: Option<FatalHook>,
}

impl Inbound {
    pub(crate) fn new(
        mode: InboundMode,
        channels: usize,
        on_fatal: Option<FatalHook>,
    ) -> Result<Self> {
        let queues = (0..channels)
            .map(|_| queue::for_mode(mode))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            queues,
            fatal: OnceLock::new(),
            on_fatal,
        })
    }

    pub(crate) fn channels(&self) -> usize {
        self.queues.len()
    }

    pub(crate) fn queue(&self, channel: u32) -> Option<&dyn InboundQueue> {
        self.queues.get(channel as usize).map(|queue| &**queue)
    }

    pub(crate) fn fatal_error(&self) -> Option<&ProtocolViolation> {
        self.fatal.get()
    }

    pub(crate) fn finish_all(&self, end: StreamEnd) {
        for queue in &self.queues {
            queue.finish(end.clone());
        }
    }

    fn notify(&self, violation: &ProtocolViolation) {
        let Some(hook) = &self.on_fatal else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| hook(violation))).is_err() {
            tracing::error!(channel = violation.channel, "protocol violation hook panicked");
        }
    }
}

/// Whatever the receive pump feeds: it owns an [`Inbound`] and knows how to
/// release the byte source it reads from.
pub(crate) trait Demux: Send + Sync {
    fn inbound(&self) -> &Inbound;

    /// Whether the local side has let go of the source, making read errors
    /// and further frames uninteresting.
    fn closed_locally(&self) -> bool;

    /// Release the source after a protocol violation.
    fn tear_down(&self);

    /// Record a protocol violation and tear the session down. Only the first
    /// violation is kept. The hook runs last, after every reader has been
    /// woken and the source released.
    fn fail(&self, violation: ProtocolViolation) {
        let inbound = self.inbound();
        if inbound.fatal.set(violation.clone()).is_err() {
            return;
        }
        tracing::error!(
            channel = violation.channel,
            channels = violation.channels,
            "protocol violation; tearing down multiplexed session"
        );

        inbound.finish_all(StreamEnd::Fatal(violation.clone()));
        self.tear_down();
        inbound.notify(&violation);
    }
}

/// State shared by every logical connection of one split and by its pump.
pub(crate) struct Session<C> {
    pub(crate) inbound: Inbound,
    pub(crate) writer: WriteSerializer<C>,
    pub(crate) closer: CloseCoordinator<C>,
    pub(crate) local: Endpoint,
    pub(crate) remote: Endpoint,
}

impl<C: Connection> Demux for Session<C> {
    fn inbound(&self) -> &Inbound {
        &self.inbound
    }

    fn closed_locally(&self) -> bool {
        self.closer.is_shut_down()
    }

    fn tear_down(&self) {
        self.closer.shutdown_now();
    }
}
