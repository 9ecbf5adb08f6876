use std::io;
use thiserror::Error;

/// Errors raised while producing chunk bytes for an outgoing message.
///
/// These are caller mistakes rather than wire corruption: nothing has been
/// half-written when one is returned, so the connection stays usable and the
/// caller may fix the message and try again.
#[derive(Debug, Error)]
pub enum ChunkEncodeError {
    /// Chunk stream ids 0 and 1 are escape codes in the basic header and can
    /// never name an actual stream.
    #[error("Chunk stream ids 0 and 1 are reserved by the basic header encoding (got {csid})")]
    ReservedChunkStreamId { csid: u32 },

    /// The three-byte basic header tops out at id 65599.
    #[error("Chunk stream id {csid} cannot be encoded, the basic header only reaches 65599")]
    ChunkStreamIdOutOfRange { csid: u32 },

    /// The timestamp (or delta) to send and the extended flag disagree:
    /// either the value needs the 4-byte escape and the flag is off, or the
    /// flag is on for a value the 24-bit field could carry.
    #[error("Timestamp value {value} is inconsistent with extended flag set to {extended}")]
    ExtendedFlagInconsistent { value: u32, extended: bool },

    /// Message lengths travel in a 24-bit field; payloads above 16777215
    /// bytes cannot be framed no matter how they are chunked.
    #[error("Message of {size} bytes is over the largest framable size of 16777215 bytes")]
    MessageTooLong { size: usize },

    #[error("Requested an invalid max chunk size of {chunk_size}, must be between 1 and 2147483647")]
    InvalidMaxChunkSize { chunk_size: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}
