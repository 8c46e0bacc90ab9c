//! Module contains functionality for serializing values into bytes based on the AMF0
//! specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)

use crate::errors::Amf0SerializationError;
use crate::markers;
use crate::Amf0Value;
use byteorder::{BigEndian, WriteBytesExt};

/// Key used for every level of the objects produced by `encode_nested_object()`
const NESTED_OBJECT_KEY: &str = "a";

/// Serializes values into an amf0 encoded vector of bytes
pub fn serialize(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = vec![];
    for value in values {
        serialize_value(value, &mut bytes)?;
    }

    Ok(bytes)
}

/// Encodes a single string value (marker, 16 bit length and the utf-8 bytes)
pub fn encode_string(value: &str) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = Vec::with_capacity(value.len() + 3);
    serialize_string(value, &mut bytes)?;
    Ok(bytes)
}

/// Encodes a single number value (marker followed by a big endian IEEE-754 double)
pub fn encode_number(value: f64) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = Vec::with_capacity(9);
    serialize_number(value, &mut bytes)?;
    Ok(bytes)
}

pub fn encode_null() -> Vec<u8> {
    vec![markers::NULL_MARKER]
}

/// Encodes an anonymous object whose properties are written in the order given
pub fn encode_object<K: AsRef<str>>(
    properties: &[(K, Amf0Value)],
) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = vec![];
    serialize_object(
        properties.iter().map(|(name, value)| (name.as_ref(), value)),
        &mut bytes,
    )?;

    Ok(bytes)
}

/// Encodes `depth` objects nested inside each other, each holding a single `"a"` property,
/// with a null at the innermost level.  A depth of 0 produces just the null.
///
/// The bytes are laid out exactly as if each level was wrapped around the previous one
/// starting from the innermost, but without recursing, so very deep payloads are cheap to
/// build.
pub fn encode_nested_object(depth: usize) -> Result<Vec<u8>, Amf0SerializationError> {
    let level_overhead = 1 + 2 + NESTED_OBJECT_KEY.len() + 3;
    let mut bytes = Vec::with_capacity(depth * level_overhead + 1);

    for _ in 0..depth {
        bytes.push(markers::OBJECT_MARKER);
        serialize_property_name_unchecked(NESTED_OBJECT_KEY, &mut bytes)?;
    }

    bytes.push(markers::NULL_MARKER);

    for _ in 0..depth {
        serialize_object_end(&mut bytes)?;
    }

    Ok(bytes)
}

fn serialize_value(value: &Amf0Value, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    match *value {
        Amf0Value::Null => Ok(bytes.push(markers::NULL_MARKER)),
        Amf0Value::Number(val) => serialize_number(val, bytes),
        Amf0Value::Utf8String(ref val) => serialize_string(val, bytes),
        Amf0Value::Object(ref properties) => serialize_object(
            properties.iter().map(|(name, value)| (name.as_str(), value)),
            bytes,
        ),
    }
}

fn serialize_number(value: f64, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::NUMBER_MARKER);
    bytes.write_f64::<BigEndian>(value)?;
    Ok(())
}

fn serialize_string(value: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if value.len() > (u16::max_value() as usize) {
        return Err(Amf0SerializationError::StringTooLong {
            length: value.len(),
        });
    }

    bytes.push(markers::STRING_MARKER);
    bytes.write_u16::<BigEndian>(value.len() as u16)?;
    bytes.extend(value.as_bytes());
    Ok(())
}

fn serialize_object<'a, I>(properties: I, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError>
where
    I: Iterator<Item = (&'a str, &'a Amf0Value)>,
{
    bytes.push(markers::OBJECT_MARKER);

    for (name, value) in properties {
        if name.len() > (u16::max_value() as usize) {
            return Err(Amf0SerializationError::PropertyNameTooLong { length: name.len() });
        }

        serialize_property_name_unchecked(name, bytes)?;
        serialize_value(value, bytes)?;
    }

    serialize_object_end(bytes)
}

fn serialize_property_name_unchecked(
    name: &str,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.write_u16::<BigEndian>(name.len() as u16)?;
    bytes.extend(name.as_bytes());
    Ok(())
}

fn serialize_object_end(bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    bytes.write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)?;
    bytes.push(markers::OBJECT_END_MARKER);
    Ok(())
}
