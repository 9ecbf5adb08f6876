use bytes::BytesMut;

use crate::time::RtmpTimestamp;

/// Everything the codec remembers about one chunk stream id between chunks.
///
/// Compressed header formats inherit any field the wire omits from the last
/// message seen on the same chunk stream, so this record is both the decode
/// context and, while a message is still arriving, the reassembly buffer for
/// its payload.
#[derive(Debug)]
pub struct StreamState {
    pub timestamp: RtmpTimestamp,
    pub timestamp_delta: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,

    /// Whether the last explicit 24-bit timestamp field on this stream was
    /// the 0xFFFFFF escape. Format 3 chunks carry no timestamp field of
    /// their own and inherit this, which decides whether a 4-byte extended
    /// timestamp must be consumed for them.
    pub extended: bool,

    /// Payload bytes accumulated for the in-flight message. Emptied when a
    /// message completes; header fields above stay behind as context.
    pub partial_data: BytesMut,
}

impl StreamState {
    pub fn new() -> StreamState {
        StreamState {
            timestamp: RtmpTimestamp::new(0),
            timestamp_delta: 0,
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
            extended: false,
            partial_data: BytesMut::new(),
        }
    }
}
