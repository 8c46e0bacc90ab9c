/*!
This module contains the RTMP message types a publishing client needs to send, as well as
functionality for serializing these messages into payloads.

`MessagePayload`s have auxiliary data about an RTMP message, such as what message stream it is
meant for, the timestamp for the message and what type of message it is.
*/

pub mod commands;
mod message_payload;
mod serialization_errors;
mod types;

pub use self::message_payload::MessagePayload;
pub use self::serialization_errors::MessageSerializationError;
use bytes::Bytes;
use rhs_amf0::Amf0Value;

pub const SET_CHUNK_SIZE_TYPE_ID: u8 = 1;
pub const AMF0_COMMAND_TYPE_ID: u8 = 20;

/// An enumeration of all types of RTMP messages that can be sent
#[derive(PartialEq, Debug, Clone)]
pub enum RtmpMessage {
    /// Raw bytes sent with an arbitrary type id.  Nothing about the data is validated.
    Unknown { type_id: u8, data: Bytes },

    /// Tells the peer the maximum chunk size used for every following chunk.  The size is
    /// written as is, so out of range values (0, or anything with the high bit set) can be sent.
    SetChunkSize { size: u32 },

    /// An AMF0 encoded command such as `connect` or `publish`
    Amf0Command {
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        additional_arguments: Vec<Amf0Value>,
    },
}

impl RtmpMessage {
    pub fn into_message_payload(
        self,
        timestamp: u32,
        message_stream_id: u32,
    ) -> Result<MessagePayload, MessageSerializationError> {
        MessagePayload::from_rtmp_message(self, timestamp, message_stream_id)
    }

    pub fn get_message_type_id(&self) -> u8 {
        match *self {
            RtmpMessage::Unknown { type_id, .. } => type_id,
            RtmpMessage::SetChunkSize { .. } => SET_CHUNK_SIZE_TYPE_ID,
            RtmpMessage::Amf0Command { .. } => AMF0_COMMAND_TYPE_ID,
        }
    }
}
