use std::cmp::min;
use std::io::{Cursor, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use crate::codec::ChunkEncodeError;
use crate::message::Message;

const INITIAL_MAX_CHUNK_SIZE: usize = 128;
const MAX_CHUNK_SIZE_SETTING: usize = 2147483647;
const MAX_MESSAGE_LENGTH: usize = 16777215;
const EXTENDED_TIMESTAMP_ESCAPE: u32 = 16777215;
const MAX_CHUNK_STREAM_ID: u32 = 65599;

/// The wire bytes for one serialized message, ready to hand to the transport
/// in a single ordered write.
#[derive(Debug, PartialEq)]
pub struct Packet {
    pub bytes: Vec<u8>,
}

/// Splits outgoing messages into chunks under the current max chunk size.
///
/// Every message is framed as one format 0 chunk carrying the full header
/// and the first slice of payload, followed by format 3 continuations until
/// the payload runs out. The format 0 chunk fully re-specifies the message,
/// so nothing the receiver inherited earlier can leak into it; the
/// compressed formats 1 and 2 are never produced.
///
/// Chunks of one message must reach the peer in order and without other
/// chunks spliced between them, so all writes for a connection have to go
/// through a single encoder and a single writer.
pub struct ChunkEncoder {
    max_chunk_size: usize,
}

impl ChunkEncoder {
    pub fn new() -> ChunkEncoder {
        ChunkEncoder {
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE,
        }
    }

    /// Adjusts the max chunk size used for subsequent messages. Announcing
    /// the change to the peer (a type 1 control message) is the caller's
    /// responsibility and must happen before bytes at the new size go out.
    pub fn set_max_chunk_size(&mut self, new_size: usize) -> Result<(), ChunkEncodeError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE_SETTING {
            return Err(ChunkEncodeError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Produces the full chunk sequence for one message on the given chunk
    /// stream id.
    ///
    /// The message's `extended` flag must agree with what its timestamp
    /// actually requires; a disagreement is refused rather than silently
    /// corrected, since whichever side is wrong would misframe the stream.
    ///
    /// On error nothing has been emitted and no state has changed, so the
    /// caller may drop or fix the message and keep using the encoder.
    pub fn serialize(
        &mut self,
        message: &Message,
        chunk_stream_id: u32,
    ) -> Result<Packet, ChunkEncodeError> {
        if message.data.len() > MAX_MESSAGE_LENGTH {
            return Err(ChunkEncodeError::MessageTooLong {
                size: message.data.len(),
            });
        }

        if message.extended != (message.timestamp.value >= EXTENDED_TIMESTAMP_ESCAPE) {
            return Err(ChunkEncodeError::ExtendedFlagInconsistent {
                value: message.timestamp.value,
                extended: message.extended,
            });
        }

        let mut bytes = Cursor::new(Vec::new());

        let mut offset = 0;
        let mut format = 0_u8;
        loop {
            let end = min(offset + self.max_chunk_size, message.data.len());
            write_chunk(
                &mut bytes,
                format,
                chunk_stream_id,
                message,
                &message.data[offset..end],
            )?;

            offset = end;
            format = 3;
            if offset >= message.data.len() {
                break;
            }
        }

        Ok(Packet {
            bytes: bytes.into_inner(),
        })
    }
}

/// Writes a single chunk: basic header, the header fields the format calls
/// for, the extended timestamp when the escape is in play, then the payload
/// slice.
fn write_chunk(
    bytes: &mut Cursor<Vec<u8>>,
    format: u8,
    csid: u32,
    message: &Message,
    payload: &[u8],
) -> Result<(), ChunkEncodeError> {
    // Format 0 chunks send the absolute time; continuations repeat it in
    // the extended field when the escape is active.
    let timestamp_value = message.timestamp.value;

    add_basic_header(bytes, format, csid)?;
    add_timestamp(bytes, format, timestamp_value)?;
    add_message_length_and_type(bytes, format, message.data.len() as u32, message.type_id)?;
    add_message_stream_id(bytes, format, message.message_stream_id)?;
    add_extended_timestamp(bytes, message.extended, timestamp_value)?;
    bytes.write_all(payload)?;

    Ok(())
}

fn add_basic_header(
    bytes: &mut Cursor<Vec<u8>>,
    format: u8,
    csid: u32,
) -> Result<(), ChunkEncodeError> {
    if csid <= 1 {
        return Err(ChunkEncodeError::ReservedChunkStreamId { csid });
    }

    if csid > MAX_CHUNK_STREAM_ID {
        return Err(ChunkEncodeError::ChunkStreamIdOutOfRange { csid });
    }

    let format_mask = format << 6;
    if csid <= 63 {
        bytes.write_u8(format_mask | csid as u8)?;
    } else if csid <= 319 {
        bytes.write_u8(format_mask)?;
        bytes.write_u8((csid - 64) as u8)?;
    } else {
        bytes.write_u8(format_mask | 1)?;
        bytes.write_u8(((csid - 64) & 0xFF) as u8)?;
        bytes.write_u8(((csid - 64) >> 8) as u8)?;
    }

    Ok(())
}

fn add_timestamp(
    bytes: &mut Cursor<Vec<u8>>,
    format: u8,
    timestamp_value: u32,
) -> Result<(), ChunkEncodeError> {
    if format == 3 {
        return Ok(());
    }

    let capped_value = min(timestamp_value, EXTENDED_TIMESTAMP_ESCAPE);
    bytes.write_u24::<BigEndian>(capped_value)?;
    Ok(())
}

fn add_message_length_and_type(
    bytes: &mut Cursor<Vec<u8>>,
    format: u8,
    length: u32,
    type_id: u8,
) -> Result<(), ChunkEncodeError> {
    if format >= 2 {
        return Ok(());
    }

    bytes.write_u24::<BigEndian>(length)?;
    bytes.write_u8(type_id)?;
    Ok(())
}

fn add_message_stream_id(
    bytes: &mut Cursor<Vec<u8>>,
    format: u8,
    stream_id: u32,
) -> Result<(), ChunkEncodeError> {
    if format != 0 {
        return Ok(());
    }

    // little-endian, unlike every other field on the wire
    bytes.write_u32::<LittleEndian>(stream_id)?;
    Ok(())
}

fn add_extended_timestamp(
    bytes: &mut Cursor<Vec<u8>>,
    extended: bool,
    timestamp_value: u32,
) -> Result<(), ChunkEncodeError> {
    if !extended {
        return Ok(());
    }

    bytes.write_u32::<BigEndian>(timestamp_value)?;
    Ok(())
}
