use thiserror::Error;

use crate::codec::{ChunkDecodeError, ChunkEncodeError};
use crate::handshake::HandshakeError;
use crate::transport::TransportError;

/// Every way a client connection can fail, composed from the layer errors.
///
/// Encoding errors leave the connection usable (the message simply was not
/// sent); everything else means the connection must be dropped.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Only rtmp:// urls are supported, got a {scheme}:// url")]
    UnsupportedScheme { scheme: String },

    #[error("Url '{url}' does not name a host to connect to")]
    MissingHost { url: String },

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Handshake(#[from] HandshakeError),

    #[error("{0}")]
    ChunkDecode(#[from] ChunkDecodeError),

    #[error("{0}")]
    ChunkEncode(#[from] ChunkEncodeError),
}
