use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::address::Endpoint;

/// A physical, bidirectional byte-stream connection that can be shared by a
/// multiplexing session.
///
/// The session needs three independent handles to the same stream: one for
/// the receive pump, one for the serialized write path and one to shut the
/// stream down from any thread. `try_clone` must therefore return a handle
/// to the *same* underlying stream, and `shutdown` on any handle must unblock
/// reads and writes on every other handle.
pub trait Connection: Read + Write + Send + Sync + Sized + 'static {
    /// Create another handle to the same underlying stream.
    fn try_clone(&self) -> io::Result<Self>;

    /// Local endpoint identity.
    fn local_endpoint(&self) -> io::Result<Endpoint>;

    /// Remote endpoint identity.
    fn remote_endpoint(&self) -> io::Result<Endpoint>;

    /// Shut down both directions of the stream.
    fn shutdown(&self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn local_endpoint(&self) -> io::Result<Endpoint> {
        self.local_addr().map(Endpoint::Tcp)
    }

    fn remote_endpoint(&self) -> io::Result<Endpoint> {
        self.peer_addr().map(Endpoint::Tcp)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(unix)]
impl Connection for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> io::Result<Self> {
        std::os::unix::net::UnixStream::try_clone(self)
    }

    fn local_endpoint(&self) -> io::Result<Endpoint> {
        let addr = self.local_addr()?;
        Ok(Endpoint::Unix(addr.as_pathname().map(Into::into)))
    }

    fn remote_endpoint(&self) -> io::Result<Endpoint> {
        let addr = self.peer_addr()?;
        Ok(Endpoint::Unix(addr.as_pathname().map(Into::into)))
    }

    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both)
    }
}

/// A connected stream over whichever transport the address selected.
///
/// This is the type returned by [`Listener::accept`](crate::Listener::accept)
/// and [`connect`](crate::connect).
pub struct Stream {
    inner: StreamInner,
}

enum StreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Stream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: StreamInner::Tcp(stream),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: StreamInner::Unix(stream),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            StreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            StreamInner::Unix(_) => "unix-domain-socket",
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            StreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl Connection for Stream {
    fn try_clone(&self) -> io::Result<Self> {
        Ok(match &self.inner {
            StreamInner::Tcp(stream) => Self::from_tcp(stream.try_clone()?),
            #[cfg(unix)]
            StreamInner::Unix(stream) => Self::from_unix(stream.try_clone()?),
        })
    }

    fn local_endpoint(&self) -> io::Result<Endpoint> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.local_endpoint(),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.local_endpoint(),
        }
    }

    fn remote_endpoint(&self) -> io::Result<Endpoint> {
        match &self.inner {
            StreamInner::Tcp(stream) => stream.remote_endpoint(),
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.remote_endpoint(),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match &self.inner {
            StreamInner::Tcp(stream) => Connection::shutdown(stream),
            #[cfg(unix)]
            StreamInner::Unix(stream) => Connection::shutdown(stream),
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("type", &self.transport_name())
            .finish()
    }
}
