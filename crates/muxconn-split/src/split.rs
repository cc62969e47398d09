use std::sync::Arc;

use muxconn_transport::Connection;

use crate::closer::CloseCoordinator;
use crate::config::MuxConfig;
use crate::conn::MuxConn;
use crate::error::{MuxError, Result};
use crate::pump;
use crate::serializer::WriteSerializer;
use crate::session::{Inbound, Session};

/// Split `conn` into `n` logical connections numbered `0..n`, using relay
/// queues.
///
/// Both ends must split with the same `n`. A channel whose data is never read
/// blocks delivery on all channels; use [`split_buffered`] when readers may
/// lag behind.
pub fn split<C: Connection>(conn: C, n: usize) -> Result<Vec<MuxConn<C>>> {
    split_with_config(conn, n, MuxConfig::relay())
}

/// Split `conn` into `n` logical connections, each buffering up to
/// `capacity` received bytes.
pub fn split_buffered<C: Connection>(
    conn: C,
    n: usize,
    capacity: usize,
) -> Result<Vec<MuxConn<C>>> {
    split_with_config(conn, n, MuxConfig::buffered(capacity))
}

/// Split `conn` into `n` logical connections with explicit configuration.
///
/// Takes ownership of the physical connection: after this call it is only
/// read by the session's receive pump and only written through the returned
/// logical connections.
pub fn split_with_config<C: Connection>(
    conn: C,
    n: usize,
    config: MuxConfig,
) -> Result<Vec<MuxConn<C>>> {
    let last = last_channel(n)?;
    config.validate()?;

    let local = conn.local_endpoint()?;
    let remote = conn.remote_endpoint()?;
    let reader = conn.try_clone()?;
    let closer = CloseCoordinator::new(conn.try_clone()?, n);
    let writer = WriteSerializer::new(conn, config.max_frame_size);

    let session = Arc::new(Session {
        inbound: Inbound::new(config.inbound, n, config.on_fatal.clone())?,
        writer,
        closer,
        local,
        remote,
    });

    pump::spawn(reader, Arc::clone(&session), config.max_frame_size)?;
    tracing::debug!(
        channels = n,
        inbound = ?config.inbound,
        max_frame_size = config.max_frame_size,
        local = %session.local,
        peer = %session.remote,
        "connection split"
    );

    Ok((0..=last)
        .map(|channel| MuxConn::new(channel, Arc::clone(&session)))
        .collect())
}

/// Highest channel number of an `n`-way split.
pub(crate) fn last_channel(n: usize) -> Result<u32> {
    n.checked_sub(1)
        .and_then(|last| u32::try_from(last).ok())
        .ok_or(MuxError::InvalidChannelCount(n))
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn zero_channels_rejected() {
        let (a, _b) = UnixStream::pair().unwrap();
        let err = split(a, 0).unwrap_err();
        assert!(matches!(err, MuxError::InvalidChannelCount(0)));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn channel_count_beyond_u32_rejected() {
        let (a, _b) = UnixStream::pair().unwrap();
        let n = u32::MAX as usize + 2;
        let err = split(a, n).unwrap_err();
        assert!(matches!(err, MuxError::InvalidChannelCount(got) if got == n));
    }

    #[test]
    fn zero_capacity_rejected() {
        let (a, _b) = UnixStream::pair().unwrap();
        assert!(matches!(
            split_buffered(a, 2, 0),
            Err(MuxError::InvalidCapacity)
        ));
    }

    #[test]
    fn channels_are_numbered_in_order() {
        let (a, _b) = UnixStream::pair().unwrap();
        let conns = split(a, 4).unwrap();
        let numbers: Vec<u32> = conns.iter().map(MuxConn::channel).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
        assert!(conns.iter().all(|c| c.channels() == 4));
    }

    #[test]
    fn single_channel_roundtrip() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut left = split(a, 1).unwrap().remove(0);
        let mut right = split(b, 1).unwrap().remove(0);

        left.write_all(b"solo").unwrap();
        let mut buf = [0u8; 4];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"solo");
    }

    #[test]
    fn deadlines_are_unsupported() {
        let (a, _b) = UnixStream::pair().unwrap();
        let conns = split(a, 1).unwrap();
        let timeout = Some(std::time::Duration::from_secs(1));

        assert!(matches!(
            conns[0].set_read_timeout(timeout),
            Err(MuxError::DeadlineUnsupported)
        ));
        assert!(conns[0].set_write_timeout(None).is_err());
        assert!(conns[0].set_timeout(timeout).is_err());
    }

    #[test]
    fn closed_connection_rejects_writes() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut conns = split(a, 2).unwrap();
        conns[0].close().unwrap();
        conns[0].close().unwrap();

        let err = conns[0].write(b"late").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);

        let mut buf = [0u8; 4];
        assert_eq!(conns[0].read(&mut buf).unwrap(), 0);
        assert!(conns[0].is_closed());
        assert!(!conns[1].is_closed());
    }
}
