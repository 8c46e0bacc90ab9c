//! Encoding of RTMP chunks.
//!
//! Only the two header formats needed to carry a message are produced: a type 0 (full) header
//! in front of the first chunk and type 3 (continuation) headers in front of every later chunk
//! of the same message.

mod chunk_header;
mod serialization_errors;
mod serializer;

pub use self::chunk_header::{
    basic_header_length, ChunkHeader, ChunkHeaderFormat, MAX_CHUNK_STREAM_ID,
    MIN_CHUNK_STREAM_ID,
};
pub use self::serialization_errors::ChunkSerializationError;
pub use self::serializer::{
    encode_chunk_header, encode_type3_header, ChunkSerializer, DEFAULT_MAX_CHUNK_SIZE,
};
