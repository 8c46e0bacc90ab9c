use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

use crate::messages::MessageSerializationError;

/// The size goes out unchecked so that zero and values with the high bit set can be sent.
pub fn serialize(size: u32) -> Result<Bytes, MessageSerializationError> {
    let mut cursor = Cursor::new(Vec::new());
    cursor.write_u32::<BigEndian>(size)?;

    let bytes = Bytes::from(cursor.into_inner());
    Ok(bytes)
}
