use std::io;
use thiserror::Error;

/// Errors that can occur while turning a message into RTMP chunks
#[derive(Debug, Error)]
pub enum ChunkSerializationError {
    /// Chunk stream ids 0 and 1 are reserved as basic header markers, and the three byte basic
    /// header form cannot express anything above 65599
    #[error("Chunk stream id {csid} cannot be encoded, only ids between 2 and 65599 are valid")]
    InvalidChunkStreamId { csid: u32 },

    /// A chunk size of zero would never make progress through the payload
    #[error("Messages cannot be split into chunks of size 0")]
    InvalidChunkSize,

    #[error("{0}")]
    Io(#[from] io::Error),
}
