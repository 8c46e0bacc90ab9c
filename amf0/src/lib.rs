//! This crate encodes values into the Adobe AMF0 format as described in
//! <https://wwwimages2.adobe.com/content/dam/acom/en/devnet/pdf/amf0-file-format-specification.pdf>
//!
//! Only the subset of AMF0 that RTMP command messages need is supported: numbers, strings,
//! null and anonymous objects.  Object properties keep their insertion order, so the bytes
//! produced for a given input are always the same.
//!
//! A bounded decoder is included so encoded payloads can be checked structurally.
//!
//! # Examples
//! ```
//! use std::io::Cursor;
//! use rhs_amf0::{Amf0Value, serialize, deserialize};
//!
//! let input = vec![
//!     Amf0Value::Utf8String("connect".to_string()),
//!     Amf0Value::Number(1.0),
//!     Amf0Value::Object(vec![
//!         ("app".to_string(), Amf0Value::Utf8String("live".to_string())),
//!     ]),
//! ];
//!
//! let serialized_data = serialize(&input).unwrap();
//!
//! let mut serialized_cursor = Cursor::new(serialized_data);
//! let results = deserialize(&mut serialized_cursor).unwrap();
//!
//! assert_eq!(input, results);
//! ```

mod deserialization;
mod errors;
mod serialization;

pub use crate::deserialization::{deserialize, deserialize_with_max_depth, DEFAULT_MAX_DEPTH};
pub use crate::errors::{Amf0DeserializationError, Amf0SerializationError};
pub use crate::serialization::{
    encode_nested_object, encode_null, encode_number, encode_object, encode_string, serialize,
};

/// An Enum representing the AMF0 value types this crate can produce
#[derive(PartialEq, Debug, Clone)]
pub enum Amf0Value {
    Number(f64),
    Utf8String(String),
    Null,

    /// An anonymous object.  Properties are written in the order they appear here.
    Object(Vec<(String, Amf0Value)>),
}

impl Amf0Value {
    /// Returns how many objects are nested inside each other at the deepest point of this
    /// value.  Scalars have a depth of 0 and an empty object has a depth of 1.
    pub fn nesting_depth(&self) -> usize {
        match self {
            Amf0Value::Object(properties) => {
                1 + properties
                    .iter()
                    .map(|(_, value)| value.nesting_depth())
                    .max()
                    .unwrap_or(0)
            }

            _ => 0,
        }
    }
}

mod markers {
    pub const NUMBER_MARKER: u8 = 0;
    pub const STRING_MARKER: u8 = 2;
    pub const OBJECT_MARKER: u8 = 3;
    pub const NULL_MARKER: u8 = 5;
    pub const OBJECT_END_MARKER: u8 = 9;
    pub const UTF_8_EMPTY_MARKER: u16 = 0;
}
