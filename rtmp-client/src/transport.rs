//! Blocking adapter over the TCP stream a connection runs on.
//!
//! The chunk and handshake layers only ever need three things from the
//! transport: read exactly N bytes, read whatever is available, and write a
//! whole buffer. Everything else (timeouts beyond connect, TLS, proxies) is
//! out of scope for this crate.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream ended in the middle of an exact-count read. Framing state
    /// cannot be recovered after this, the connection is unusable.
    #[error("Connection closed before {expected} requested bytes could be read")]
    Truncated { expected: usize },

    /// The peer closed the stream at a read boundary.
    #[error("Connection closed by peer")]
    Closed,

    #[error("Could not resolve {host}:{port} to any socket address")]
    AddressResolution { host: String, port: u16 },

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// A connected bidirectional byte stream.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Dials `host:port`, trying each resolved address until one connects
    /// within the timeout.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpTransport, TransportError> {
        let mut last_error = None;
        for address in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&address, timeout) {
                Ok(stream) => {
                    debug!(%address, "connected");
                    return Ok(TcpTransport { stream });
                }
                Err(error) => last_error = Some(error),
            }
        }

        match last_error {
            Some(error) => Err(TransportError::Io(error)),
            None => Err(TransportError::AddressResolution {
                host: host.to_string(),
                port,
            }),
        }
    }

    /// Wraps an already-connected stream, for hosts that manage their own
    /// sockets.
    pub fn from_stream(stream: TcpStream) -> TcpTransport {
        TcpTransport { stream }
    }

    /// Blocks until the buffer is completely filled. Short reads from the
    /// socket are retried internally; only end-of-stream cuts a read short,
    /// and that surfaces as `Truncated`.
    pub fn read_exact(&mut self, buffer: &mut [u8]) -> Result<(), TransportError> {
        match self.stream.read_exact(buffer) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                Err(TransportError::Truncated {
                    expected: buffer.len(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    /// One blocking read of up to `buffer.len()` bytes. Returns the number of
    /// bytes read; zero means the peer closed the stream.
    pub fn read_some(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.stream.read(buffer)?)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        Ok(self.stream.write_all(bytes)?)
    }

    /// Clones the underlying socket so reading and writing can be driven from
    /// separate halves. Each half must stay exclusive to its direction.
    pub fn try_clone(&self) -> Result<TcpTransport, TransportError> {
        Ok(TcpTransport {
            stream: self.stream.try_clone()?,
        })
    }
}
