use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use muxconn_transport::Connection;

/// Shuts the physical connection down once every logical connection has
/// been closed, or immediately on fatal teardown.
pub(crate) struct CloseCoordinator<C> {
    remaining: AtomicUsize,
    shut_down: AtomicBool,
    conn: C,
}

impl<C: Connection> CloseCoordinator<C> {
    pub(crate) fn new(conn: C, channels: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(channels),
            shut_down: AtomicBool::new(false),
            conn,
        }
    }

    /// Count one logical connection as closed. Each channel calls this at
    /// most once. The last call reports the physical shutdown result.
    pub(crate) fn channel_closed(&self) -> io::Result<()> {
        let before = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "more closes than channels");
        if before == 1 {
            return self.shutdown("all logical connections closed");
        }
        Ok(())
    }

    /// Tear the physical connection down regardless of open channels.
    pub(crate) fn shutdown_now(&self) {
        if let Err(err) = self.shutdown("fatal session error") {
            tracing::warn!(error = %err, "physical connection shutdown failed");
        }
    }

    pub(crate) fn open_channels(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn shutdown(&self, reason: &'static str) -> io::Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.conn.shutdown() {
            Ok(()) => {
                tracing::debug!(reason, "physical connection shut down");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotConnected => {
                tracing::debug!(reason, "physical connection already disconnected");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn shuts_down_after_last_channel() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        let closer = CloseCoordinator::new(local, 3);

        closer.channel_closed().unwrap();
        closer.channel_closed().unwrap();
        assert!(!closer.is_shut_down());
        assert_eq!(closer.open_channels(), 1);

        closer.channel_closed().unwrap();
        assert!(closer.is_shut_down());

        let mut buf = [0u8; 1];
        assert_eq!(remote.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn shutdown_now_is_idempotent() {
        let (local, _remote) = UnixStream::pair().unwrap();
        let closer = CloseCoordinator::new(local, 2);

        closer.shutdown_now();
        closer.shutdown_now();
        closer.channel_closed().unwrap();
        closer.channel_closed().unwrap();
        assert!(closer.is_shut_down());
        assert_eq!(closer.open_channels(), 0);
    }
}
