use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::address::{Address, Endpoint};
use crate::error::{Result, TransportError};
use crate::traits::Stream;

/// Listens for physical connections on a TCP or Unix domain socket address.
pub struct Listener {
    inner: ListenerInner,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(crate::uds::UnixSocketListener),
}

impl Listener {
    /// Bind to `address`.
    pub fn bind(address: &Address) -> Result<Self> {
        let inner = match address {
            Address::Tcp(addr) => {
                let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
                info!(addr = %addr, "listening on tcp");
                ListenerInner::Tcp(listener)
            }
            #[cfg(unix)]
            Address::Unix(path) => ListenerInner::Unix(crate::uds::UnixSocketListener::bind(path)?),
            #[cfg(not(unix))]
            Address::Unix(_) => return Err(TransportError::UnixUnsupported),
        };
        Ok(Self { inner })
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Stream> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                debug!(%peer, "accepted tcp connection");
                Ok(Stream::from_tcp(stream))
            }
            #[cfg(unix)]
            ListenerInner::Unix(listener) => Ok(Stream::from_unix(listener.accept()?)),
        }
    }

    /// Accept the next connection, polling every `interval` and giving up with
    /// `Ok(None)` once `keep_going` returns false. Lets a signal handler stop
    /// a server that is waiting for its first peer.
    pub fn accept_while(
        &self,
        keep_going: impl Fn() -> bool,
        interval: Duration,
    ) -> Result<Option<Stream>> {
        self.set_nonblocking(true)?;
        let accepted = loop {
            if !keep_going() {
                debug!("stopped waiting for connections");
                break Ok(None);
            }
            match self.accept() {
                Ok(stream) => break Ok(Some(stream)),
                Err(TransportError::Accept(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) =>
                {
                    thread::sleep(interval);
                }
                Err(err) => break Err(err),
            }
        };
        self.set_nonblocking(false)?;
        accepted
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            ListenerInner::Tcp(listener) => listener.set_nonblocking(nonblocking)?,
            #[cfg(unix)]
            ListenerInner::Unix(listener) => listener.set_nonblocking(nonblocking)?,
        }
        Ok(())
    }

    /// The bound address, with the actual port filled in for `:0` binds.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match &self.inner {
            ListenerInner::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?)),
            #[cfg(unix)]
            ListenerInner::Unix(listener) => {
                Ok(Endpoint::Unix(Some(listener.path().to_path_buf())))
            }
        }
    }
}

/// Connect to `address` (blocking).
pub fn connect(address: &Address) -> Result<Stream> {
    match address {
        Address::Tcp(addr) => {
            let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;
            stream.set_nodelay(true)?;
            debug!(addr = %addr, "connected over tcp");
            Ok(Stream::from_tcp(stream))
        }
        #[cfg(unix)]
        Address::Unix(path) => Ok(Stream::from_unix(crate::uds::UnixSocketListener::connect(
            path,
        )?)),
        #[cfg(not(unix))]
        Address::Unix(_) => Err(TransportError::UnixUnsupported),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::traits::Connection;

    #[test]
    fn tcp_bind_accept_connect() {
        let listener = Listener::bind(&"tcp://127.0.0.1:0".parse().unwrap()).unwrap();
        let Endpoint::Tcp(bound) = listener.local_endpoint().unwrap() else {
            panic!("expected tcp endpoint");
        };

        let client = std::thread::spawn(move || {
            let mut stream = connect(&Address::Tcp(bound.to_string())).unwrap();
            stream.write_all(b"over tcp").unwrap();
            stream
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 8];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"over tcp");

        let client = client.join().unwrap();
        assert_eq!(
            client.remote_endpoint().unwrap(),
            server.local_endpoint().unwrap()
        );
    }

    #[test]
    #[cfg(unix)]
    fn unix_bind_accept_connect() {
        let dir = std::env::temp_dir().join(format!("muxconn-listener-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let address = Address::Unix(dir.join("l.sock"));

        let listener = Listener::bind(&address).unwrap();
        assert_eq!(
            listener.local_endpoint().unwrap(),
            Endpoint::Unix(Some(dir.join("l.sock")))
        );

        let client_address = address.clone();
        let client = std::thread::spawn(move || {
            let mut stream = connect(&client_address).unwrap();
            stream.write_all(b"uds").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"uds");
        client.join().unwrap();

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn accept_while_gives_up_when_stopped() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let listener = Listener::bind(&"tcp://127.0.0.1:0".parse().unwrap()).unwrap();
        let polls = AtomicUsize::new(0);
        let accepted = listener
            .accept_while(
                || polls.fetch_add(1, Ordering::SeqCst) < 3,
                Duration::from_millis(10),
            )
            .unwrap();

        assert!(accepted.is_none());
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn accept_while_hands_back_a_blocking_stream() {
        let listener = Listener::bind(&"tcp://127.0.0.1:0".parse().unwrap()).unwrap();
        let Endpoint::Tcp(bound) = listener.local_endpoint().unwrap() else {
            panic!("expected tcp endpoint");
        };

        let client = std::thread::spawn(move || {
            let mut stream = connect(&Address::Tcp(bound.to_string())).unwrap();
            std::thread::sleep(Duration::from_millis(50));
            stream.write_all(b"late").unwrap();
            stream
        });

        let mut server = listener
            .accept_while(|| true, Duration::from_millis(5))
            .unwrap()
            .expect("client connects");
        // A non-blocking stream would fail with WouldBlock before "late" lands.
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"late");
        drop(client.join().unwrap());
    }

    #[test]
    fn connect_refused_reports_address() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = connect(&Address::Tcp(format!("127.0.0.1:{port}"))).unwrap_err();
        assert!(matches!(err, TransportError::Connect { ref addr, .. } if addr.ends_with(&port.to_string())));
    }
}
