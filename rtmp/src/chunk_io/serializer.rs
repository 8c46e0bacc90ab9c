use super::chunk_header::ChunkHeader;
use super::ChunkSerializationError;
use crate::messages::MessagePayload;
use std::cmp::min;

pub const DEFAULT_MAX_CHUNK_SIZE: u32 = 128;

/// Builds a type 0 chunk header for a message of `length` bytes
pub fn encode_chunk_header(
    csid: u32,
    type_id: u8,
    length: u32,
    message_stream_id: u32,
    timestamp: u32,
) -> Result<Vec<u8>, ChunkSerializationError> {
    ChunkHeader::full(csid, type_id, length, message_stream_id, timestamp).to_bytes()
}

/// Builds a type 3 (continuation) chunk header, which is only the basic header
pub fn encode_type3_header(csid: u32) -> Result<Vec<u8>, ChunkSerializationError> {
    ChunkHeader::continuation(csid).to_bytes()
}

/// Splits RTMP message payloads into chunks.
///
/// Unlike a full RTMP peer no header compression is attempted: the first chunk of every message
/// carries a type 0 header with the complete message length, and each following chunk is
/// preceded by a type 3 header on the same chunk stream.  That keeps every message independent,
/// so the same serializer can be reused across connections.
#[derive(Debug, Clone)]
pub struct ChunkSerializer {
    max_chunk_size: u32,
}

impl ChunkSerializer {
    pub fn new() -> ChunkSerializer {
        ChunkSerializer {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }

    /// Creates a serializer that emits chunks of at most `max_chunk_size` payload bytes.  The peer
    /// has to be told about any size other than 128 with a `SetChunkSize` message first.
    pub fn with_chunk_size(max_chunk_size: u32) -> Result<ChunkSerializer, ChunkSerializationError> {
        if max_chunk_size == 0 {
            return Err(ChunkSerializationError::InvalidChunkSize);
        }

        Ok(ChunkSerializer { max_chunk_size })
    }

    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Turns a message payload into the bytes of one or more chunks on `csid`
    pub fn serialize(
        &self,
        csid: u32,
        message: &MessagePayload,
    ) -> Result<Vec<u8>, ChunkSerializationError> {
        let chunk_size = self.max_chunk_size as usize;
        let data = &message.data[..];
        let chunk_count = (data.len() + chunk_size - 1) / chunk_size;

        let first_header = ChunkHeader::full(
            csid,
            message.type_id,
            data.len() as u32,
            message.message_stream_id,
            message.timestamp,
        );

        let continuation = encode_type3_header(csid)?;
        let mut bytes = Vec::with_capacity(
            data.len() + 14 + chunk_count.saturating_sub(1) * continuation.len(),
        );

        first_header.write_to(&mut bytes)?;

        let mut offset = 0;
        while offset < data.len() {
            if offset > 0 {
                bytes.extend_from_slice(&continuation);
            }

            let end = min(offset + chunk_size, data.len());
            bytes.extend_from_slice(&data[offset..end]);
            offset = end;
        }

        Ok(bytes)
    }
}

impl Default for ChunkSerializer {
    fn default() -> Self {
        ChunkSerializer::new()
    }
}
