use std::io;
use thiserror::Error;

/// Errors that can occur while processing the server's side of the handshake
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The server's S0 packet did not carry RTMP version 3
    #[error("Server responded with RTMP version {version} instead of 3")]
    BadVersionId { version: u8 },

    /// Fewer bytes than S0, S1 and S2 require were handed over
    #[error("Expected {expected} handshake bytes from the server but only {received} were available")]
    IncompleteResponse { expected: usize, received: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}
