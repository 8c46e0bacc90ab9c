use bytes::Bytes;
use rhs_amf0::{self, Amf0Value};

use crate::messages::MessageSerializationError;

pub fn serialize(
    command_name: String,
    transaction_id: f64,
    command_object: Amf0Value,
    mut additional_arguments: Vec<Amf0Value>,
) -> Result<Bytes, MessageSerializationError> {
    let mut values = vec![
        Amf0Value::Utf8String(command_name),
        Amf0Value::Number(transaction_id),
        command_object,
    ];

    values.append(&mut additional_arguments);
    let bytes = rhs_amf0::serialize(&values)?;

    Ok(Bytes::from(bytes))
}
