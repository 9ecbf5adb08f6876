use std::cmp::min;
use std::collections::HashMap;
use std::io::Cursor;
use std::mem;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytes::BytesMut;

use super::stream_state::StreamState;
use crate::codec::ChunkDecodeError;
use crate::message::Message;

const INITIAL_MAX_CHUNK_SIZE: usize = 128;
const MAX_CHUNK_SIZE_SETTING: usize = 2147483647;
const EXTENDED_TIMESTAMP_ESCAPE: u32 = 16777215;

/// Messages cannot declare more than a 24-bit length, so nothing larger can
/// ever legitimately arrive.
const DEFAULT_MAX_MESSAGE_SIZE: u32 = 16777215;

/// Turns the inbound chunk byte stream back into whole messages.
///
/// Compressed chunk headers are diffs against the previous message on the
/// same chunk stream id, so every byte received on a connection must pass
/// through the same `ChunkDecoder` in order. The decoder keeps one state
/// record per chunk stream id and reassembles each stream's in-flight
/// message independently, which allows peers to interleave chunks of
/// different streams mid-message.
///
/// Partially received messages stay internal; only complete messages are
/// handed out.
pub struct ChunkDecoder {
    max_chunk_size: usize,
    max_message_size: u32,
    current_fmt: u8,
    current_csid: u32,
    current_timestamp_field: u32,
    current_stream: StreamState,
    current_stage: ParseStage,
    buffer: BytesMut,
    previous_streams: HashMap<u32, StreamState>,
}

enum ParseStage {
    BasicHeader,
    TimestampField,
    MessageLength,
    MessageTypeId,
    MessageStreamId,
    ExtendedTimestamp,
    MessagePayload,
}

#[derive(Eq, PartialEq, Debug)]
enum ParseStageResult {
    Success,
    NotEnoughBytes,
}

impl ChunkDecoder {
    /// Creates a decoder expecting the protocol's initial 128 byte max chunk
    /// size.
    pub fn new() -> ChunkDecoder {
        ChunkDecoder {
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            current_fmt: 0,
            current_csid: 0,
            current_timestamp_field: 0,
            current_stream: StreamState::new(),
            current_stage: ParseStage::BasicHeader,
            buffer: BytesMut::with_capacity(4096),
            previous_streams: HashMap::new(),
        }
    }

    /// Attempts to read one complete message out of the passed in bytes.
    ///
    /// Bytes that do not yet form a complete message are buffered internally
    /// and `Ok(None)` is returned, so the same bytes must never be passed in
    /// twice. When one call's bytes contain more than one message, only the
    /// first is returned; callers should keep calling with an empty slice
    /// until `None` comes back to drain the rest.
    ///
    /// If the peer announces a new chunk size (a type 1 control message),
    /// [`set_max_chunk_size`](ChunkDecoder::set_max_chunk_size) must be
    /// called before the next chunk at the new size is fed in, otherwise the
    /// decoder will misframe the stream.
    pub fn get_next_message(
        &mut self,
        bytes: &[u8],
    ) -> Result<Option<Message>, ChunkDecodeError> {
        self.buffer.extend_from_slice(bytes);

        loop {
            let mut complete_message = None;
            let result = match self.current_stage {
                ParseStage::BasicHeader => self.read_basic_header()?,
                ParseStage::TimestampField => self.read_timestamp_field()?,
                ParseStage::MessageLength => self.read_message_length()?,
                ParseStage::MessageTypeId => self.read_message_type_id()?,
                ParseStage::MessageStreamId => self.read_message_stream_id()?,
                ParseStage::ExtendedTimestamp => self.read_extended_timestamp()?,
                ParseStage::MessagePayload => self.read_message_data(&mut complete_message)?,
            };

            if result == ParseStageResult::NotEnoughBytes || complete_message.is_some() {
                return Ok(complete_message);
            }
        }
    }

    /// Adjusts the max chunk size the peer will be sending from now on.
    pub fn set_max_chunk_size(&mut self, new_size: usize) -> Result<(), ChunkDecodeError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE_SETTING {
            return Err(ChunkDecodeError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Lowers (or raises, up to the wire maximum) the ceiling on declared
    /// message lengths. Reassembly buffers grow to the declared length, so
    /// hosts on a tight memory budget should set this before reading.
    pub fn set_max_message_size(&mut self, new_size: u32) {
        self.max_message_size = min(new_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    fn read_basic_header(&mut self) -> Result<ParseStageResult, ChunkDecodeError> {
        if self.buffer.is_empty() {
            return Ok(ParseStageResult::NotEnoughBytes);
        }

        let first_byte = self.buffer[0];
        let fmt = first_byte >> 6;
        let (csid, header_size) = match first_byte & 0x3F {
            0 => {
                if self.buffer.len() < 2 {
                    return Ok(ParseStageResult::NotEnoughBytes);
                }

                (self.buffer[1] as u32 + 64, 2)
            }

            1 => {
                if self.buffer.len() < 3 {
                    return Ok(ParseStageResult::NotEnoughBytes);
                }

                // second byte is the low byte on the wire
                (
                    self.buffer[1] as u32 + 64 + ((self.buffer[2] as u32) << 8),
                    3,
                )
            }

            value => (value as u32, 1),
        };

        // Everything not re-sent by this chunk's format is inherited from the
        // last message on the same chunk stream, including any partially
        // accumulated payload.
        self.current_stream = match self.previous_streams.remove(&csid) {
            Some(state) => state,
            None if fmt == 0 => StreamState::new(),
            None => return Err(ChunkDecodeError::NoPreviousChunkOnStream { csid, fmt }),
        };

        let _ = self.buffer.split_to(header_size);
        self.current_fmt = fmt;
        self.current_csid = csid;
        self.current_stage = ParseStage::TimestampField;
        Ok(ParseStageResult::Success)
    }

    fn read_timestamp_field(&mut self) -> Result<ParseStageResult, ChunkDecodeError> {
        if self.current_fmt == 3 {
            // No field of its own; the inherited extended flag decides
            // whether a 4 byte timestamp still has to be consumed below.
            self.current_stage = ParseStage::MessageLength;
            return Ok(ParseStageResult::Success);
        }

        if self.buffer.len() < 3 {
            return Ok(ParseStageResult::NotEnoughBytes);
        }

        let field;
        {
            let bytes = self.buffer.split_to(3);
            let mut cursor = Cursor::new(bytes);
            field = cursor.read_u24::<BigEndian>()?;
        }

        self.current_timestamp_field = field;
        self.current_stream.extended = field == EXTENDED_TIMESTAMP_ESCAPE;
        self.current_stage = ParseStage::MessageLength;
        Ok(ParseStageResult::Success)
    }

    fn read_message_length(&mut self) -> Result<ParseStageResult, ChunkDecodeError> {
        if self.current_fmt >= 2 {
            self.current_stage = ParseStage::MessageTypeId;
            return Ok(ParseStageResult::Success);
        }

        if self.buffer.len() < 3 {
            return Ok(ParseStageResult::NotEnoughBytes);
        }

        let length;
        {
            let bytes = self.buffer.split_to(3);
            let mut cursor = Cursor::new(bytes);
            length = cursor.read_u24::<BigEndian>()?;
        }

        if length > self.max_message_size {
            return Err(ChunkDecodeError::MessageTooLarge {
                csid: self.current_csid,
                declared: length,
                maximum: self.max_message_size,
            });
        }

        self.current_stream.message_length = length;
        self.current_stage = ParseStage::MessageTypeId;
        Ok(ParseStageResult::Success)
    }

    fn read_message_type_id(&mut self) -> Result<ParseStageResult, ChunkDecodeError> {
        if self.current_fmt >= 2 {
            self.current_stage = ParseStage::MessageStreamId;
            return Ok(ParseStageResult::Success);
        }

        if self.buffer.is_empty() {
            return Ok(ParseStageResult::NotEnoughBytes);
        }

        self.current_stream.message_type_id = self.buffer[0];
        let _ = self.buffer.split_to(1);
        self.current_stage = ParseStage::MessageStreamId;
        Ok(ParseStageResult::Success)
    }

    fn read_message_stream_id(&mut self) -> Result<ParseStageResult, ChunkDecodeError> {
        if self.current_fmt != 0 {
            self.current_stage = ParseStage::ExtendedTimestamp;
            return Ok(ParseStageResult::Success);
        }

        if self.buffer.len() < 4 {
            return Ok(ParseStageResult::NotEnoughBytes);
        }

        let stream_id;
        {
            let bytes = self.buffer.split_to(4);
            let mut cursor = Cursor::new(bytes);

            // The one little-endian field in the whole protocol.
            stream_id = cursor.read_u32::<LittleEndian>()?;
        }

        self.current_stream.message_stream_id = stream_id;
        self.current_stage = ParseStage::ExtendedTimestamp;
        Ok(ParseStageResult::Success)
    }

    fn read_extended_timestamp(&mut self) -> Result<ParseStageResult, ChunkDecodeError> {
        if !self.current_stream.extended {
            self.apply_timestamp(self.current_timestamp_field);
            self.current_stage = ParseStage::MessagePayload;
            return Ok(ParseStageResult::Success);
        }

        if self.buffer.len() < 4 {
            return Ok(ParseStageResult::NotEnoughBytes);
        }

        let value;
        {
            let bytes = self.buffer.split_to(4);
            let mut cursor = Cursor::new(bytes);
            value = cursor.read_u32::<BigEndian>()?;
        }

        self.apply_timestamp(value);
        self.current_stage = ParseStage::MessagePayload;
        Ok(ParseStageResult::Success)
    }

    fn apply_timestamp(&mut self, wire_value: u32) {
        match self.current_fmt {
            // Absolute time, and the accumulating delta starts over.
            0 => {
                self.current_stream.timestamp.set(wire_value);
                self.current_stream.timestamp_delta = 0;
            }

            // No field on the wire: the previous delta is applied again.
            // When the stream is in extended mode a 4 byte field was still
            // consumed above, but its value is not what advances the clock.
            3 => {
                let delta = self.current_stream.timestamp_delta;
                self.current_stream.timestamp = self.current_stream.timestamp + delta;
            }

            _ => {
                self.current_stream.timestamp_delta = wire_value;
                self.current_stream.timestamp = self.current_stream.timestamp + wire_value;
            }
        }
    }

    fn read_message_data(
        &mut self,
        message_to_return: &mut Option<Message>,
    ) -> Result<ParseStageResult, ChunkDecodeError> {
        let length = self.current_stream.message_length as usize;
        let accumulated = self.current_stream.partial_data.len();
        let remaining = length.saturating_sub(accumulated);
        let to_read = min(remaining, self.max_chunk_size);

        if self.buffer.len() < to_read {
            return Ok(ParseStageResult::NotEnoughBytes);
        }

        if accumulated == 0 && length > 0 {
            self.current_stream.partial_data.reserve(length);
        }

        let bytes = self.buffer.split_to(to_read);
        self.current_stream.partial_data.extend_from_slice(&bytes[..]);

        if self.current_stream.partial_data.len() == length {
            let data = mem::replace(&mut self.current_stream.partial_data, BytesMut::new());
            let timestamp = self.current_stream.timestamp;
            *message_to_return = Some(Message {
                timestamp,
                type_id: self.current_stream.message_type_id,
                message_stream_id: self.current_stream.message_stream_id,
                extended: timestamp.value >= EXTENDED_TIMESTAMP_ESCAPE,
                data: data.freeze(),
            });
        }

        // The chunk is done; its stream state becomes the inheritance context
        // for whatever arrives on this chunk stream next.
        let state = mem::replace(&mut self.current_stream, StreamState::new());
        self.previous_streams.insert(self.current_csid, state);
        self.current_stage = ParseStage::BasicHeader;
        Ok(ParseStageResult::Success)
    }
}
