//! The opening handshake, client role.
//!
//! Before any chunk traffic, both peers exchange a version byte and two
//! 1536 byte packets whose bulk is a random nonce. The exchange is strictly
//! linear from the client's point of view: send C0, read S0 (version check),
//! send C1, read S1, answer with C2 (S1 echoed with our timing spliced in),
//! read S2 and verify it carries our C1 nonce back unchanged.
//!
//! The state machine is sans-I/O: callers write the bytes this module hands
//! out and feed received bytes into [`Handshake::process_bytes`], which makes
//! it usable from blocking loops, mio-style readiness loops, or tests without
//! a socket anywhere in sight. Only C0 is produced up front; C1 comes back
//! as the response to S0 and C2 as the response to S1, so the linear order
//! holds no matter how the peer's bytes are sliced.

mod errors;

pub use self::errors::HandshakeError;

use std::io::{Cursor, Write};
use std::time::Instant;

use byteorder::{BigEndian, WriteBytesExt};
use rand::RngCore;
use tracing::debug;

const PROTOCOL_VERSION: u8 = 3;
const RANDOM_DATA_SIZE: usize = 1528;
const PACKET_SIZE: usize = 8 + RANDOM_DATA_SIZE;

#[derive(Eq, PartialEq, Debug, Clone)]
enum Stage {
    NeedToSendC0,
    WaitingForS0,
    WaitingForS1,
    WaitingForS2,
    Complete,
}

/// The outcome of feeding received bytes into the handshake.
#[derive(PartialEq, Eq, Debug)]
pub enum HandshakeProcessResult {
    /// More packets are still expected. Any response bytes must be written
    /// to the peer before reading again.
    InProgress { response_bytes: Vec<u8> },

    /// The exchange finished. `remaining_bytes` holds whatever the peer sent
    /// past the end of S2 (usually the start of chunk traffic) and must be
    /// handed to the chunk decoder.
    Completed {
        response_bytes: Vec<u8>,
        remaining_bytes: Vec<u8>,
    },
}

pub struct Handshake {
    current_stage: Stage,
    my_random: [u8; RANDOM_DATA_SIZE],
    buffer: Vec<u8>,
    c1_sent_at: Instant,
}

impl Handshake {
    pub fn new() -> Handshake {
        let mut my_random = [0_u8; RANDOM_DATA_SIZE];
        rand::thread_rng().fill_bytes(&mut my_random);

        Handshake {
            current_stage: Stage::NeedToSendC0,
            my_random,
            buffer: Vec::new(),
            c1_sent_at: Instant::now(),
        }
    }

    /// Produces C0, the bare version byte. C1 is not produced here: it is
    /// only emitted (as a `process_bytes` response) once the peer's S0 has
    /// arrived and carried an acceptable version.
    pub fn generate_outbound_c0(&mut self) -> Result<Vec<u8>, HandshakeError> {
        self.current_stage = Stage::WaitingForS0;
        debug!("handshake: c0 generated");

        Ok(vec![PROTOCOL_VERSION])
    }

    /// Consumes bytes received from the peer, advancing through as many
    /// stages as the buffered data allows.
    pub fn process_bytes(
        &mut self,
        data: &[u8],
    ) -> Result<HandshakeProcessResult, HandshakeError> {
        self.buffer.extend_from_slice(data);

        let mut response_bytes = Vec::new();
        loop {
            let starting_stage = self.current_stage.clone();
            let stage_response = match self.current_stage {
                Stage::NeedToSendC0 => self.generate_outbound_c0()?,
                Stage::WaitingForS0 => self.parse_s0()?,
                Stage::WaitingForS1 => self.parse_s1()?,
                Stage::WaitingForS2 => self.parse_s2()?,
                Stage::Complete => return Err(HandshakeError::AlreadyCompleted),
            };

            response_bytes.extend(stage_response);

            if self.current_stage == Stage::Complete {
                let remaining_bytes = self.buffer.split_off(0);
                return Ok(HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                });
            }

            if self.current_stage == starting_stage {
                // Not enough buffered bytes for this stage, wait for more
                return Ok(HandshakeProcessResult::InProgress { response_bytes });
            }
        }
    }

    fn parse_s0(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }

        let version = self.buffer.remove(0);
        if version != PROTOCOL_VERSION {
            return Err(HandshakeError::VersionMismatch { actual: version });
        }

        debug!(version, "handshake: s0 accepted");
        self.current_stage = Stage::WaitingForS1;
        self.generate_outbound_c1()
    }

    /// C1: a zeroed timestamp, four zero bytes, and the 1528 byte nonce. The
    /// moment of generation is recorded so C2 can carry the elapsed time
    /// between C1 going out and S1 arriving.
    fn generate_outbound_c1(&mut self) -> Result<Vec<u8>, HandshakeError> {
        let mut bytes = Cursor::new(Vec::with_capacity(PACKET_SIZE));
        bytes.write_u32::<BigEndian>(0)?;
        bytes.write_u32::<BigEndian>(0)?;
        bytes.write_all(&self.my_random)?;

        self.c1_sent_at = Instant::now();
        debug!("handshake: c1 generated");
        Ok(bytes.into_inner())
    }

    fn parse_s1(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.buffer.len() < PACKET_SIZE {
            return Ok(Vec::new());
        }

        let s1: Vec<u8> = self.buffer.drain(..PACKET_SIZE).collect();
        let elapsed_micros = self.c1_sent_at.elapsed().as_micros() as u32;

        // C2: the peer's timestamp echoed, the time S1 took to arrive, and
        // the peer's random bytes returned verbatim.
        let mut response = Cursor::new(Vec::with_capacity(PACKET_SIZE));
        response.write_all(&s1[0..4])?;
        response.write_u32::<BigEndian>(elapsed_micros)?;
        response.write_all(&s1[8..])?;

        debug!(elapsed_micros, "handshake: s1 received, c2 generated");
        self.current_stage = Stage::WaitingForS2;
        Ok(response.into_inner())
    }

    fn parse_s2(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.buffer.len() < PACKET_SIZE {
            return Ok(Vec::new());
        }

        let s2: Vec<u8> = self.buffer.drain(..PACKET_SIZE).collect();
        if s2[8..] != self.my_random[..] {
            return Err(HandshakeError::NonceMismatch);
        }

        debug!("handshake: s2 verified, handshake complete");
        self.current_stage = Stage::Complete;
        Ok(Vec::new())
    }
}
