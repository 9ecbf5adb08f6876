//! The host-facing connection object.
//!
//! An [`RtmpClient`] ties the pieces together for the common blocking case:
//! dial the url, run the handshake, then exchange whole messages while the
//! host interprets their bodies. Both directions borrow the client mutably,
//! which statically enforces the one-reader-one-writer rule the chunk
//! framing depends on; hosts that want concurrent reading and writing must
//! serialize their writes behind a queue of their own.

mod errors;


pub use self::errors::ClientError;

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::codec::{ChunkDecoder, ChunkEncoder};
use crate::handshake::{Handshake, HandshakeProcessResult};
use crate::message::Message;
use crate::transport::{TcpTransport, TransportError};

const DEFAULT_PORT: u16 = 1935;
const READ_BUFFER_SIZE: usize = 4096;

pub struct RtmpClient {
    transport: TcpTransport,
    encoder: ChunkEncoder,
    decoder: ChunkDecoder,
    early_message: Option<Message>,
    handshake_completed: bool,
}

impl RtmpClient {
    /// Dials the server named by an `rtmp://host[:port]/...` url. Everything
    /// past host and port (application path, stream key) is meaningful only
    /// to the command layer above and is ignored here.
    pub fn connect(url: &str, timeout: Duration) -> Result<RtmpClient, ClientError> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() != "rtmp" {
            return Err(ClientError::UnsupportedScheme {
                scheme: parsed.scheme().to_string(),
            });
        }

        let host = parsed.host_str().ok_or_else(|| ClientError::MissingHost {
            url: url.to_string(),
        })?;
        let port = parsed.port().unwrap_or(DEFAULT_PORT);

        debug!(host, port, "connecting");
        let transport = TcpTransport::connect(host, port, timeout)?;

        Ok(RtmpClient::from_transport(transport))
    }

    /// Builds a client over an already-connected transport, for hosts that
    /// manage their own sockets.
    pub fn from_transport(transport: TcpTransport) -> RtmpClient {
        RtmpClient {
            transport,
            encoder: ChunkEncoder::new(),
            decoder: ChunkDecoder::new(),
            early_message: None,
            handshake_completed: false,
        }
    }

    /// Runs the opening handshake to completion. Must be called exactly once,
    /// before any messages are sent or received. Any chunk bytes the server
    /// sends on the heels of its final handshake packet are retained for
    /// [`receive_message`](RtmpClient::receive_message).
    pub fn handshake(&mut self) -> Result<(), ClientError> {
        let mut handshake = Handshake::new();
        let c0 = handshake.generate_outbound_c0()?;
        self.transport.write_all(&c0)?;

        let mut read_buffer = [0_u8; READ_BUFFER_SIZE];
        loop {
            let byte_count = self.transport.read_some(&mut read_buffer)?;
            if byte_count == 0 {
                return Err(TransportError::Closed.into());
            }

            match handshake.process_bytes(&read_buffer[..byte_count])? {
                HandshakeProcessResult::InProgress { response_bytes } => {
                    if !response_bytes.is_empty() {
                        self.transport.write_all(&response_bytes)?;
                    }
                }

                HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                } => {
                    if !response_bytes.is_empty() {
                        self.transport.write_all(&response_bytes)?;
                    }

                    if !remaining_bytes.is_empty() {
                        self.early_message = self.decoder.get_next_message(&remaining_bytes)?;
                    }

                    debug!("handshake completed");
                    self.handshake_completed = true;
                    return Ok(());
                }
            }
        }
    }

    /// Fragments one whole message onto the wire on the given chunk stream
    /// id. An `Err` carrying a [`ChunkEncodeError`](crate::codec::ChunkEncodeError)
    /// means nothing was written and the connection is still usable.
    pub fn send_message(
        &mut self,
        message: &Message,
        chunk_stream_id: u32,
    ) -> Result<(), ClientError> {
        let packet = self.encoder.serialize(message, chunk_stream_id)?;
        self.transport.write_all(&packet.bytes)?;
        Ok(())
    }

    /// Blocks until the next complete message has been reassembled.
    pub fn receive_message(&mut self) -> Result<Message, ClientError> {
        if let Some(message) = self.early_message.take() {
            return Ok(message);
        }

        if let Some(message) = self.decoder.get_next_message(&[])? {
            return Ok(message);
        }

        let mut read_buffer = [0_u8; READ_BUFFER_SIZE];
        loop {
            let byte_count = self.transport.read_some(&mut read_buffer)?;
            if byte_count == 0 {
                return Err(TransportError::Closed.into());
            }

            if let Some(message) = self.decoder.get_next_message(&read_buffer[..byte_count])? {
                return Ok(message);
            }
        }
    }

    /// Adjusts the max chunk size for outgoing messages. Announcing the
    /// change to the peer beforehand is the host's responsibility.
    pub fn set_send_chunk_size(&mut self, size: usize) -> Result<(), ClientError> {
        debug!(size, "send chunk size changed");
        self.encoder.set_max_chunk_size(size)?;
        Ok(())
    }

    /// Adjusts the max chunk size expected on incoming chunks, typically
    /// after the host has seen the peer's SetChunkSize control message.
    pub fn set_receive_chunk_size(&mut self, size: usize) -> Result<(), ClientError> {
        debug!(size, "receive chunk size changed");
        self.decoder.set_max_chunk_size(size)?;
        Ok(())
    }

    /// Caps how large a declared incoming message may be before the
    /// connection is failed instead of buffered.
    pub fn set_max_message_size(&mut self, size: u32) {
        self.decoder.set_max_message_size(size);
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.handshake_completed
    }
}
