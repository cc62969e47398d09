use std::fmt;
use std::sync::Arc;

use muxconn_frame::MAX_FRAME_PAYLOAD;

use crate::error::{MuxError, ProtocolViolation, Result};

/// Callback invoked once, on the receive pump thread, when the peer violates
/// the framing protocol. It runs after every channel has been ended and the
/// physical connection shut down, so it may abort the process; a panic is
/// caught and logged.
pub type FatalHook = Arc<dyn Fn(&ProtocolViolation) + Send + Sync>;

/// How received payloads are queued for each logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMode {
    /// Hand each payload straight to the reader; the pump waits until it has
    /// been read. Lowest memory and latency, but a channel nobody reads
    /// blocks delivery on every channel.
    Relay,
    /// Buffer up to `capacity` bytes per channel so that one slow reader only
    /// stalls the pump once its own buffer is full.
    Bounded { capacity: usize },
}

/// Configuration for a multiplexing session.
#[derive(Clone)]
pub struct MuxConfig {
    /// Maximum payload per frame. Both ends must agree. Default: 4096.
    pub max_frame_size: usize,
    /// Inbound queue flavour. Default: [`InboundMode::Relay`].
    pub inbound: InboundMode,
    /// Optional protocol-violation callback.
    pub on_fatal: Option<FatalHook>,
}

impl MuxConfig {
    /// Relay queues with the default frame size.
    pub fn relay() -> Self {
        Self::default()
    }

    /// Bounded queues of `capacity` bytes with the default frame size.
    pub fn buffered(capacity: usize) -> Self {
        Self {
            inbound: InboundMode::Bounded { capacity },
            ..Self::default()
        }
    }

    /// Override the maximum frame payload.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Install a protocol-violation callback.
    pub fn with_fatal_hook(
        mut self,
        hook: impl Fn(&ProtocolViolation) + Send + Sync + 'static,
    ) -> Self {
        self.on_fatal = Some(Arc::new(hook));
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(MuxError::InvalidFrameSize);
        }
        if let InboundMode::Bounded { capacity: 0 } = self.inbound {
            return Err(MuxError::InvalidCapacity);
        }
        Ok(())
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_PAYLOAD,
            inbound: InboundMode::Relay,
            on_fatal: None,
        }
    }
}

impl fmt::Debug for MuxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxConfig")
            .field("max_frame_size", &self.max_frame_size)
            .field("inbound", &self.inbound)
            .field("on_fatal", &self.on_fatal.is_some())
            .finish()
    }
}
