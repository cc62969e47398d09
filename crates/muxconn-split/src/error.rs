use std::io;

/// A frame arrived for a channel the local side never created.
///
/// The stream's framing can no longer be trusted after this, so the session
/// is torn down rather than resynchronised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("frame for channel {channel} but the connection was split into {channels}")]
pub struct ProtocolViolation {
    pub channel: u32,
    pub channels: usize,
}

/// Errors that can occur while splitting or using a multiplexed connection.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// `split` was asked for zero channels, or more than a `u32` can number.
    #[error("invalid number of connections to split into: {0}")]
    InvalidChannelCount(usize),

    /// Buffered queues need room for at least one byte.
    #[error("inbound buffer capacity must be greater than zero")]
    InvalidCapacity,

    /// Frames need room for at least one payload byte.
    #[error("maximum frame size must be greater than zero")]
    InvalidFrameSize,

    /// Per-channel timeouts cannot be mapped onto the shared connection.
    #[error("logical connections do not implement deadlines")]
    DeadlineUnsupported,

    /// The logical connection was closed locally.
    #[error("logical connection {0} is closed")]
    Closed(u32),

    /// The peer sent a frame for a channel outside `[0, N)`.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] muxconn_frame::FrameError),

    /// I/O error on the physical connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MuxError {
    /// Whether the session that produced this error is unrecoverable because
    /// the peer broke the framing protocol.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MuxError::ProtocolViolation(_))
    }
}

impl From<MuxError> for io::Error {
    fn from(err: MuxError) -> Self {
        let kind = match err {
            MuxError::Io(inner) => return inner,
            MuxError::InvalidChannelCount(_)
            | MuxError::InvalidCapacity
            | MuxError::InvalidFrameSize => io::ErrorKind::InvalidInput,
            MuxError::DeadlineUnsupported => io::ErrorKind::Unsupported,
            MuxError::Closed(_) => io::ErrorKind::NotConnected,
            MuxError::ProtocolViolation(_) => io::ErrorKind::InvalidData,
            MuxError::Frame(_) => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

/// Recover the protocol violation carried by an error returned from a
/// logical connection's `read`.
pub fn fatal_violation(err: &io::Error) -> Option<&ProtocolViolation> {
    match err.get_ref()?.downcast_ref::<MuxError>()? {
        MuxError::ProtocolViolation(violation) => Some(violation),
        _ => None,
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
