use std::io;
use thiserror::Error;

/// Errors raised while turning received chunk bytes back into messages.
///
/// A chunk stream has no resynchronization points, so every variant here
/// (other than a rejected setting) means framing alignment is lost and the
/// connection must be abandoned.
#[derive(Debug, Error)]
pub enum ChunkDecodeError {
    /// Formats 1 through 3 only make sense as a diff against an earlier
    /// message on the same chunk stream id.
    #[error("Received a format {fmt} chunk on chunk stream {csid} before any format 0 chunk")]
    NoPreviousChunkOnStream { csid: u32, fmt: u8 },

    /// The max chunk size is carried in 31 bits on the wire, so nothing
    /// above 2147483647 can ever be in effect.
    #[error("Requested an invalid max chunk size of {chunk_size}, must be between 1 and 2147483647")]
    InvalidMaxChunkSize { chunk_size: usize },

    /// A message header declared a length above the configured ceiling.
    /// Reassembly buffers grow to the declared length, so this is the line
    /// of defense against a peer declaring absurd sizes.
    #[error("Message on chunk stream {csid} declares {declared} bytes, above the {maximum} byte ceiling")]
    MessageTooLarge {
        csid: u32,
        declared: u32,
        maximum: u32,
    },

    #[error("{0}")]
    Io(#[from] io::Error),
}
