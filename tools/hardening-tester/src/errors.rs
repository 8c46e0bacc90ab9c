use rhs_amf0::Amf0SerializationError;
use rhs_rtmp::chunk_io::ChunkSerializationError;
use rhs_rtmp::messages::MessageSerializationError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Everything that can go wrong while a scenario drives the target
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The TCP connection could not be established
    #[error("Could not connect to {address}: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The server did not answer C0 and C1 with a complete, valid S0/S1/S2 in time
    #[error("Handshake with {address} did not complete")]
    Handshake { address: SocketAddr },

    /// The peer reset or closed the connection while we were sending or receiving
    #[error("Connection closed by peer: {0}")]
    Connection(#[source] io::Error),

    #[error("AMF0 encoding failed: {0}")]
    Amf0Encoding(#[from] Amf0SerializationError),

    #[error("Chunk encoding failed: {0}")]
    ChunkEncoding(#[from] ChunkSerializationError),

    #[error("Message encoding failed: {0}")]
    MessageEncoding(#[from] MessageSerializationError),

    #[error("{operation} did not complete within {timeout:?}")]
    TimeoutExceeded {
        operation: &'static str,
        timeout: Duration,
    },
}

impl ProbeError {
    /// True when the error means the target closed the connection on us, which several
    /// scenarios count as the expected outcome
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProbeError::Connection(_))
    }
}

/// Errors that stop the whole run
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Cannot connect to {address}: {source}")]
    TargetUnreachable {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Could not prepare the protocol client: {0}")]
    Client(#[from] ProbeError),
}
