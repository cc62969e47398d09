//! Addresses used to bind/connect, and endpoint identities reported by
//! established connections.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Where to bind or connect a physical connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `tcp://host:port`, or a bare `host:port`.
    Tcp(String),
    /// `unix:///path/to.sock`, or a bare absolute path.
    Unix(PathBuf),
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidAddress(s.to_string());

        if let Some(rest) = s.strip_prefix("tcp://") {
            if rest.is_empty() || !rest.contains(':') {
                return Err(invalid());
            }
            return Ok(Self::Tcp(rest.to_string()));
        }
        if let Some(rest) = s.strip_prefix("unix://") {
            if rest.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Unix(PathBuf::from(rest)));
        }
        if s.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(s)));
        }
        if s.contains(':') && !s.contains("://") {
            return Ok(Self::Tcp(s.to_string()));
        }
        Err(invalid())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(addr) => write!(f, "tcp://{addr}"),
            Address::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// The identity of one side of an established connection.
///
/// All logical connections split from one physical connection report the
/// same pair of endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(SocketAddr),
    /// `None` for unnamed sockets (e.g. the client side, or `socketpair`).
    Unix(Option<PathBuf>),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{addr}"),
            Endpoint::Unix(Some(path)) => write!(f, "{}", path.display()),
            Endpoint::Unix(None) => write!(f, "(unnamed)"),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::Tcp(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schemes() {
        assert_eq!(
            "tcp://127.0.0.1:9000".parse::<Address>().unwrap(),
            Address::Tcp("127.0.0.1:9000".to_string())
        );
        assert_eq!(
            "unix:///tmp/mux.sock".parse::<Address>().unwrap(),
            Address::Unix(PathBuf::from("/tmp/mux.sock"))
        );
    }

    #[test]
    fn parses_bare_forms() {
        assert_eq!(
            "localhost:80".parse::<Address>().unwrap(),
            Address::Tcp("localhost:80".to_string())
        );
        assert_eq!(
            "/run/mux.sock".parse::<Address>().unwrap(),
            Address::Unix(PathBuf::from("/run/mux.sock"))
        );
    }

    #[test]
    fn rejects_garbage() {
        for input in ["", "tcp://", "tcp://nohost", "unix://", "http://x:1", "relative.sock"] {
            let result = input.parse::<Address>();
            assert!(
                matches!(result, Err(TransportError::InvalidAddress(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_roundtrips() {
        for input in ["tcp://127.0.0.1:1", "unix:///tmp/a.sock"] {
            let addr: Address = input.parse().unwrap();
            assert_eq!(addr.to_string(), input);
        }
    }

    #[test]
    fn endpoint_display() {
        let ep = Endpoint::from("127.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(ep.to_string(), "127.0.0.1:4000");
        assert_eq!(Endpoint::Unix(None).to_string(), "(unnamed)");
    }
}
