/// Errors that can occur while decoding an unsigned varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarintError {
    /// More than 64 bits of value, or more than 10 bytes.
    #[error("varint overflows 64 bits")]
    Overflow,

    /// A multi-byte encoding whose final byte is zero.
    #[error("varint is not minimally encoded")]
    NonCanonical,
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A header field is not a valid canonical varint.
    #[error("invalid {field} field: {source}")]
    Varint {
        field: &'static str,
        source: VarintError,
    },

    /// The channel number does not fit in 32 bits.
    #[error("channel number {0} out of range")]
    ChannelOverflow(u64),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended, cleanly or in the middle of a frame.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether this error means the peer or the local side closed the stream,
    /// as opposed to the stream carrying malformed data.
    pub fn is_closed(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            FrameError::ConnectionClosed => true,
            FrameError::Io(err) => matches!(
                err.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
