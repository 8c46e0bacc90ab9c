//! Client side of the simple (non-digest) RTMP handshake.
//!
//! The client sends C0 (the version byte) and C1 (a 1536 byte packet), waits for the
//! server's S0, S1 and S2, then echoes S1 back as C2.  Nothing here touches a socket; the
//! caller decides how the bytes travel, which also allows sending a bad version on purpose
//! via `ClientHandshake::with_version()`.

mod errors;

pub use self::errors::HandshakeError;

use byteorder::{BigEndian, ReadBytesExt};
use rand::Rng;
use std::io::{Cursor, Read};

/// The only RTMP version a compliant peer accepts in C0/S0
pub const RTMP_VERSION: u8 = 3;

pub const RANDOM_DATA_SIZE: usize = 1528;

/// Size of C1, C2, S1 and S2
pub const PACKET_SIZE: usize = 8 + RANDOM_DATA_SIZE;

/// S0 + S1 + S2
pub const SERVER_RESPONSE_SIZE: usize = 1 + PACKET_SIZE + PACKET_SIZE;

/// A 1536 byte handshake packet (C1/S1/C2/S2 layout)
#[derive(Clone)]
pub struct HandshakePacket {
    pub time: u32,
    pub zero: u32,
    pub random: [u8; RANDOM_DATA_SIZE],
}

impl HandshakePacket {
    /// Creates a C1 packet with a zero time, zeroed second field and random payload
    pub fn new_c1() -> HandshakePacket {
        HandshakePacket {
            time: 0,
            zero: 0,
            random: create_random_data(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PACKET_SIZE);
        bytes.extend_from_slice(&self.time.to_be_bytes());
        bytes.extend_from_slice(&self.zero.to_be_bytes());
        bytes.extend_from_slice(&self.random);
        bytes
    }

    /// Reads a packet from exactly `PACKET_SIZE` bytes
    pub fn parse(bytes: &[u8]) -> Result<HandshakePacket, HandshakeError> {
        if bytes.len() < PACKET_SIZE {
            return Err(HandshakeError::IncompleteResponse {
                expected: PACKET_SIZE,
                received: bytes.len(),
            });
        }

        let mut cursor = Cursor::new(&bytes[..PACKET_SIZE]);
        let mut random = [0_u8; RANDOM_DATA_SIZE];

        let time = cursor.read_u32::<BigEndian>()?;
        let zero = cursor.read_u32::<BigEndian>()?;
        cursor.read_exact(&mut random)?;

        Ok(HandshakePacket { time, zero, random })
    }
}

/// Produces the client's packets for a single handshake attempt
pub struct ClientHandshake {
    version: u8,
    c1: HandshakePacket,
}

impl ClientHandshake {
    /// Creates a handshake that announces RTMP version 3
    pub fn new() -> ClientHandshake {
        ClientHandshake::with_version(RTMP_VERSION)
    }

    /// Creates a handshake whose C0 carries an arbitrary version byte
    pub fn with_version(version: u8) -> ClientHandshake {
        ClientHandshake {
            version,
            c1: HandshakePacket::new_c1(),
        }
    }

    pub fn c1(&self) -> &HandshakePacket {
        &self.c1
    }

    /// C0 followed by C1, ready to be written in one go
    pub fn generate_outbound_c0_and_c1(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + PACKET_SIZE);
        bytes.push(self.version);
        bytes.extend(self.c1.to_bytes());
        bytes
    }

    /// Takes the server's S0, S1 and S2 (exactly `SERVER_RESPONSE_SIZE` bytes) and returns
    /// the C2 packet, which is S1 echoed back unchanged.
    pub fn process_server_response(&self, response: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        if response.len() < SERVER_RESPONSE_SIZE {
            return Err(HandshakeError::IncompleteResponse {
                expected: SERVER_RESPONSE_SIZE,
                received: response.len(),
            });
        }

        if response[0] != RTMP_VERSION {
            return Err(HandshakeError::BadVersionId {
                version: response[0],
            });
        }

        Ok(response[1..1 + PACKET_SIZE].to_vec())
    }
}

impl Default for ClientHandshake {
    fn default() -> Self {
        ClientHandshake::new()
    }
}

/// C1 as sent by a well behaved client (version byte not included)
pub fn encode_c1() -> Vec<u8> {
    HandshakePacket::new_c1().to_bytes()
}

fn create_random_data() -> [u8; RANDOM_DATA_SIZE] {
    let mut random_data = [0_u8; RANDOM_DATA_SIZE];
    rand::thread_rng().fill(&mut random_data[..]);
    random_data
}
