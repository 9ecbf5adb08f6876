use std::io;
use thiserror::Error;

/// Errors that can abort the opening handshake. None of these are
/// recoverable; the connection must be torn down and redialed.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The peer's version byte was something other than 3.
    #[error("Peer answered with protocol version {actual}, only version 3 is spoken here")]
    VersionMismatch { actual: u8 },

    /// The tail of the peer's final packet did not echo the random bytes we
    /// sent, so the peer either mangled them or is not talking this protocol.
    #[error("Peer did not echo our handshake random bytes back unchanged")]
    NonceMismatch,

    /// More bytes were pushed into a handshake that already finished.
    #[error("Handshake has already completed")]
    AlreadyCompleted,

    #[error("{0}")]
    Io(#[from] io::Error),
}
