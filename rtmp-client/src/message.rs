use bytes::Bytes;

use crate::time::RtmpTimestamp;

/// A whole application message, as delivered by reassembly or handed to
/// fragmentation.
///
/// The chunk layer treats the payload as opaque bytes; interpreting command,
/// control, audio, or video bodies is the caller's concern. The wire-only
/// bookkeeping that travels alongside a message in transit (declared length,
/// timestamp delta) lives in the codec's per-chunk-stream state, not here.
#[derive(PartialEq, Debug, Clone)]
pub struct Message {
    pub timestamp: RtmpTimestamp,
    pub type_id: u8,
    pub message_stream_id: u32,

    /// Whether the timestamp needs the 4-byte extended form on the wire,
    /// true exactly when `timestamp` is at or above 0xFFFFFF. The flag
    /// travels with the message rather than being derived silently: the
    /// encoder refuses a message whose flag and timestamp disagree instead
    /// of guessing which one the caller meant.
    pub extended: bool,

    pub data: Bytes,
}

impl Message {
    pub fn new() -> Message {
        Message {
            timestamp: RtmpTimestamp::new(0),
            type_id: 0,
            message_stream_id: 0,
            extended: false,
            data: Bytes::new(),
        }
    }
}
