use std::{io, string};
use thiserror::Error;

/// Errors that can occur while decoding AMF0 bytes
#[derive(Debug, Error)]
pub enum Amf0DeserializationError {
    #[error("Encountered unknown marker {marker}")]
    UnknownMarker { marker: u8 },

    #[error("Unexpected empty object property name")]
    UnexpectedEmptyObjectPropertyName,

    #[error("Hit end of the byte buffer but was expecting more data")]
    UnexpectedEof,

    /// Objects were nested deeper than the decoder was allowed to follow
    #[error("Objects are nested deeper than the allowed {max_depth} levels")]
    NestingTooDeep { max_depth: usize },

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    FromUtf8Error(#[from] string::FromUtf8Error),
}

/// Errors that can occur while encoding values into AMF0
#[derive(Debug, Error)]
pub enum Amf0SerializationError {
    #[error("String length of {length} is greater than 65,535")]
    StringTooLong { length: usize },

    #[error("Object property name length of {length} is greater than 65,535")]
    PropertyNameTooLong { length: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}
