//! This module contains functionality to deserialize values from bytes
//! that were encoded via the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)
//!
//! Object nesting is bounded so hostile input can't recurse the decoder into a stack overflow.

use crate::errors::Amf0DeserializationError;
use crate::markers;
use crate::Amf0Value;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

/// Deepest object nesting `deserialize()` will follow
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Reads every AMF0 value from the stream, refusing objects nested deeper than
/// `DEFAULT_MAX_DEPTH`
pub fn deserialize<R: Read>(bytes: &mut R) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    deserialize_with_max_depth(bytes, DEFAULT_MAX_DEPTH)
}

/// Reads every AMF0 value from the stream, refusing objects nested deeper than `max_depth`
pub fn deserialize_with_max_depth<R: Read>(
    bytes: &mut R,
    max_depth: usize,
) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    let mut results = vec![];

    while let Some(value) = read_next_value(bytes, 0, max_depth)? {
        results.push(value);
    }

    Ok(results)
}

fn read_next_value<R: Read>(
    bytes: &mut R,
    depth: usize,
    max_depth: usize,
) -> Result<Option<Amf0Value>, Amf0DeserializationError> {
    let mut buffer: [u8; 1] = [0];
    let bytes_read = bytes.read(&mut buffer)?;

    if bytes_read == 0 {
        return Ok(None);
    }

    match buffer[0] {
        markers::NULL_MARKER => Ok(Some(Amf0Value::Null)),
        markers::NUMBER_MARKER => parse_number(bytes).map(Some),
        markers::STRING_MARKER => parse_string(bytes).map(Some),
        markers::OBJECT_MARKER => parse_object(bytes, depth + 1, max_depth).map(Some),
        marker => Err(Amf0DeserializationError::UnknownMarker { marker }),
    }
}

fn parse_number<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let number = bytes.read_f64::<BigEndian>()?;
    Ok(Amf0Value::Number(number))
}

fn parse_string<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let length = bytes.read_u16::<BigEndian>()?;
    let mut buffer: Vec<u8> = vec![0_u8; length as usize];
    bytes.read_exact(&mut buffer)?;

    let value = String::from_utf8(buffer)?;
    Ok(Amf0Value::Utf8String(value))
}

fn parse_object<R: Read>(
    bytes: &mut R,
    depth: usize,
    max_depth: usize,
) -> Result<Amf0Value, Amf0DeserializationError> {
    if depth > max_depth {
        return Err(Amf0DeserializationError::NestingTooDeep { max_depth });
    }

    let mut properties = Vec::new();
    while let Some(property) = parse_object_property(bytes, depth, max_depth)? {
        properties.push(property);
    }

    Ok(Amf0Value::Object(properties))
}

fn parse_object_property<R: Read>(
    bytes: &mut R,
    depth: usize,
    max_depth: usize,
) -> Result<Option<(String, Amf0Value)>, Amf0DeserializationError> {
    let label_length = bytes.read_u16::<BigEndian>()?;
    if label_length == 0 {
        // Next byte should be the end of object marker
        let byte = bytes.read_u8()?;
        if byte != markers::OBJECT_END_MARKER {
            return Err(Amf0DeserializationError::UnexpectedEmptyObjectPropertyName);
        }

        return Ok(None);
    }

    let mut label_buffer = vec![0; label_length as usize];
    bytes.read_exact(&mut label_buffer)?;
    let label = String::from_utf8(label_buffer)?;

    match read_next_value(bytes, depth, max_depth)? {
        None => Err(Amf0DeserializationError::UnexpectedEof),
        Some(value) => Ok(Some((label, value))),
    }
}
