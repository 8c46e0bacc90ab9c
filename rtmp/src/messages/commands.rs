//! The command sequence a client runs to reach a publishing state:
//! `connect`, then `createStream`, then `publish`.

use super::RtmpMessage;
use rhs_amf0::Amf0Value;

pub const CONNECT_TRANSACTION_ID: f64 = 1.0;
pub const CREATE_STREAM_TRANSACTION_ID: f64 = 2.0;
pub const PUBLISH_TRANSACTION_ID: f64 = 3.0;

/// `"connect", 1.0, { app: <app_name> }`
pub fn connect(app_name: &str) -> RtmpMessage {
    RtmpMessage::Amf0Command {
        command_name: "connect".to_string(),
        transaction_id: CONNECT_TRANSACTION_ID,
        command_object: Amf0Value::Object(vec![(
            "app".to_string(),
            Amf0Value::Utf8String(app_name.to_string()),
        )]),
        additional_arguments: Vec::new(),
    }
}

/// `"createStream", 2.0, null`
pub fn create_stream() -> RtmpMessage {
    RtmpMessage::Amf0Command {
        command_name: "createStream".to_string(),
        transaction_id: CREATE_STREAM_TRANSACTION_ID,
        command_object: Amf0Value::Null,
        additional_arguments: Vec::new(),
    }
}

/// `"publish", 3.0, null, <stream_name>, "live"`
pub fn publish(stream_name: &str) -> RtmpMessage {
    RtmpMessage::Amf0Command {
        command_name: "publish".to_string(),
        transaction_id: PUBLISH_TRANSACTION_ID,
        command_object: Amf0Value::Null,
        additional_arguments: vec![
            Amf0Value::Utf8String(stream_name.to_string()),
            Amf0Value::Utf8String("live".to_string()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhs_amf0::{encode_null, encode_number, encode_object, encode_string};

    #[test]
    fn connect_payload_matches_hand_built_bytes() {
        let mut expected = encode_string("connect").unwrap();
        expected.extend(encode_number(1.0).unwrap());
        expected.extend(
            encode_object(&[("app", Amf0Value::Utf8String("stream1".to_string()))]).unwrap(),
        );

        let payload = connect("stream1").into_message_payload(0, 0).unwrap();
        assert_eq!(payload.type_id, 20);
        assert_eq!(&payload.data[..], &expected[..]);
    }

    #[test]
    fn create_stream_payload_matches_hand_built_bytes() {
        let mut expected = encode_string("createStream").unwrap();
        expected.extend(encode_number(2.0).unwrap());
        expected.extend(encode_null());

        let payload = create_stream().into_message_payload(0, 0).unwrap();
        assert_eq!(&payload.data[..], &expected[..]);
    }

    #[test]
    fn publish_payload_matches_hand_built_bytes() {
        let mut expected = encode_string("publish").unwrap();
        expected.extend(encode_number(3.0).unwrap());
        expected.extend(encode_null());
        expected.extend(encode_string("").unwrap());
        expected.extend(encode_string("live").unwrap());

        let payload = publish("").into_message_payload(0, 1).unwrap();
        assert_eq!(payload.message_stream_id, 1);
        assert_eq!(&payload.data[..], &expected[..]);
    }
}
