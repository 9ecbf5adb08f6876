//! The chunk layer: framing whole messages onto the wire and back.
//!
//! One encoder and one decoder per connection, each owning the per-chunk-
//! stream context that the compressed header formats diff against.

mod decode_errors;
mod decoder;
mod encode_errors;
mod encoder;
mod stream_state;

pub use self::decode_errors::ChunkDecodeError;
pub use self::decoder::ChunkDecoder;
pub use self::encode_errors::ChunkEncodeError;
pub use self::encoder::{ChunkEncoder, Packet};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::time::RtmpTimestamp;
    use bytes::Bytes;

    fn round_trip(messages: &[Message], chunk_size: Option<usize>) -> Vec<Message> {
        let mut encoder = ChunkEncoder::new();
        let mut decoder = ChunkDecoder::new();
        if let Some(size) = chunk_size {
            encoder.set_max_chunk_size(size).unwrap();
            decoder.set_max_chunk_size(size).unwrap();
        }

        let mut results = Vec::new();
        for message in messages {
            let packet = encoder.serialize(message, 5).unwrap();
            let decoded = decoder.get_next_message(&packet.bytes).unwrap().unwrap();
            results.push(decoded);
        }

        results
    }

    #[test]
    fn messages_survive_a_round_trip() {
        let inputs = vec![
            Message {
                timestamp: RtmpTimestamp::new(55),
                message_stream_id: 1,
                type_id: 15,
                extended: false,
                data: Bytes::from(vec![1_u8, 2, 3, 4, 5, 6]),
            },
            Message {
                timestamp: RtmpTimestamp::new(65),
                message_stream_id: 1,
                type_id: 15,
                extended: false,
                data: Bytes::from(vec![8_u8, 9, 10]),
            },
            Message {
                timestamp: RtmpTimestamp::new(75),
                message_stream_id: 1,
                type_id: 15,
                extended: false,
                data: Bytes::from(vec![1_u8, 2, 3]),
            },
        ];

        let outputs = round_trip(&inputs, None);
        assert_eq!(outputs, inputs);
    }

    #[test]
    fn messages_with_decreasing_time_survive_a_round_trip() {
        let inputs = vec![
            Message {
                timestamp: RtmpTimestamp::new(65),
                message_stream_id: 1,
                type_id: 15,
                extended: false,
                data: Bytes::from(vec![1_u8, 2, 3, 4, 5, 6]),
            },
            Message {
                timestamp: RtmpTimestamp::new(55),
                message_stream_id: 1,
                type_id: 15,
                extended: false,
                data: Bytes::from(vec![8_u8, 9, 10]),
            },
        ];

        let outputs = round_trip(&inputs, None);
        assert_eq!(outputs, inputs);
    }

    #[test]
    fn fragmented_message_survives_a_round_trip() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[11_u8; 75]);
        payload.extend_from_slice(&[22_u8; 25]);

        let inputs = vec![Message {
            timestamp: RtmpTimestamp::new(72),
            message_stream_id: 12,
            type_id: 50,
            extended: false,
            data: Bytes::from(payload),
        }];

        let outputs = round_trip(&inputs, Some(25));
        assert_eq!(outputs, inputs);
    }

    #[test]
    fn extended_timestamp_messages_survive_a_round_trip() {
        let inputs = vec![
            Message {
                timestamp: RtmpTimestamp::new(16777215),
                message_stream_id: 1,
                type_id: 9,
                extended: true,
                data: Bytes::from(vec![1_u8; 40]),
            },
            Message {
                timestamp: RtmpTimestamp::new(16777900),
                message_stream_id: 1,
                type_id: 9,
                extended: true,
                data: Bytes::from(vec![2_u8; 40]),
            },
            // back under the escape threshold on the same chunk stream
            Message {
                timestamp: RtmpTimestamp::new(90),
                message_stream_id: 1,
                type_id: 9,
                extended: false,
                data: Bytes::from(vec![3_u8; 40]),
            },
        ];

        let outputs = round_trip(&inputs, Some(16));
        assert_eq!(outputs, inputs);
    }

    #[test]
    fn empty_message_survives_a_round_trip() {
        let inputs = vec![Message {
            timestamp: RtmpTimestamp::new(10),
            message_stream_id: 3,
            type_id: 4,
            extended: false,
            data: Bytes::new(),
        }];

        let outputs = round_trip(&inputs, None);
        assert_eq!(outputs, inputs);
    }

    #[test]
    fn chunk_size_can_change_between_messages_when_both_sides_agree() {
        let message = |timestamp: u32, fill: u8| Message {
            timestamp: RtmpTimestamp::new(timestamp),
            message_stream_id: 1,
            type_id: 9,
            extended: false,
            data: Bytes::from(vec![fill; 300]),
        };

        let mut encoder = ChunkEncoder::new();
        let mut decoder = ChunkDecoder::new();

        let packet = encoder.serialize(&message(10, 1), 5).unwrap();
        let output1 = decoder.get_next_message(&packet.bytes).unwrap().unwrap();

        encoder.set_max_chunk_size(4096).unwrap();
        decoder.set_max_chunk_size(4096).unwrap();

        let packet = encoder.serialize(&message(20, 2), 5).unwrap();
        let output2 = decoder.get_next_message(&packet.bytes).unwrap().unwrap();

        assert_eq!(output1, message(10, 1));
        assert_eq!(output2, message(20, 2));
    }
}
