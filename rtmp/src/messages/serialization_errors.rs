use rhs_amf0::Amf0SerializationError;
use std::io;
use thiserror::Error;

/// Enumeration that represents the various errors that may occur while trying to
/// serialize a RTMP message into a raw RTMP payload.
#[derive(Debug, Error)]
pub enum MessageSerializationError {
    /// The values provided could not be serialized into valid AMF0 encoded data
    #[error("The values provided could not be serialized into valid AMF0 encoded data: {0}")]
    Amf0SerializationError(#[from] Amf0SerializationError),

    #[error("An IO error occurred while writing the output: {0}")]
    Io(#[from] io::Error),
}
