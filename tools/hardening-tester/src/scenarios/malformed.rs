use rhs_amf0::{encode_nested_object, encode_number, encode_string};
use rhs_rtmp::chunk_io::encode_chunk_header;
use rhs_rtmp::handshake::ClientHandshake;
use rhs_rtmp::messages::{commands, RtmpMessage, AMF0_COMMAND_TYPE_ID};
use std::thread;

use super::{expect_disconnect, observe, observe_attack, Outcome, ScenarioContext, Verdict};
use crate::client::{COMMAND_CSID, PROTOCOL_CONTROL_CSID};
use crate::errors::ProbeError;

/// Chunk size far beyond the 24 bit maximum, with the sign bit clear
pub const OVERSIZED_CHUNK_SIZE: u32 = 0x7FFF_FFFF;

const LARGEST_WIRE_LENGTH: u32 = 0x00FF_FFFF;
const OVERSIZED_PAYLOAD_PREFIX: usize = 128;
const EXTRA_NESTING_LEVELS: usize = 18;
const INVALID_RTMP_VERSION: u8 = 5;

/// A number marker followed by 3 of its 8 bytes
const TRUNCATED_NUMBER: [u8; 4] = [0x00, 0x41, 0x42, 0x43];

/// Announces a message twice the server's size limit and starts sending it
pub fn oversized_message(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let advertised = context
        .config
        .limits
        .max_message_size
        .saturating_mul(2)
        .min(LARGEST_WIRE_LENGTH);

    let header = encode_chunk_header(COMMAND_CSID, AMF0_COMMAND_TYPE_ID, advertised, 0, 0)?;

    let outcome = observe_attack(context, |client, connection| {
        client.send_raw(connection, &header)?;
        client.send_raw(connection, &[0_u8; OVERSIZED_PAYLOAD_PREFIX])
    })?;

    Ok(expect_disconnect(
        outcome,
        &format!("message of {} bytes announced", advertised),
    ))
}

/// Sends `SetChunkSize` with `size` followed by a `connect`
pub fn set_chunk_size(context: &ScenarioContext, size: u32) -> Result<Verdict, ProbeError> {
    let app_name = context.config.publish.app_name.as_str();
    let settle_delay = context.config.timing.settle_delay();

    let outcome = observe_attack(context, |client, connection| {
        client.send_message(
            connection,
            PROTOCOL_CONTROL_CSID,
            RtmpMessage::SetChunkSize { size },
            0,
        )?;

        thread::sleep(settle_delay);
        client.send_message(connection, COMMAND_CSID, commands::connect(app_name), 0)
    })?;

    Ok(expect_disconnect(outcome, &format!("chunk size {}", size)))
}

pub fn deep_nesting(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let depth = context.config.limits.max_nesting_depth + EXTRA_NESTING_LEVELS;

    let mut payload = encode_string("connect")?;
    payload.extend(encode_number(1.0)?);
    payload.extend(encode_nested_object(depth)?);

    let outcome = observe_attack(context, |client, connection| {
        client.send_payload(connection, COMMAND_CSID, AMF0_COMMAND_TYPE_ID, &payload, 0)
    })?;

    Ok(expect_disconnect(
        outcome,
        &format!("{} nested objects", depth),
    ))
}

/// Advisory: servers may drop the command silently instead of disconnecting, so both
/// outcomes pass
pub fn truncated_amf0(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let mut payload = encode_string("connect")?;
    payload.extend_from_slice(&TRUNCATED_NUMBER);

    let outcome = observe_attack(context, |client, connection| {
        client.send_payload(connection, COMMAND_CSID, AMF0_COMMAND_TYPE_ID, &payload, 0)
    })?;

    let verdict = match outcome {
        Outcome::Disconnected => Verdict::pass("Server disconnected gracefully (truncated AMF0)"),
        Outcome::StillConnected => {
            Verdict::pass("WARN: Server stayed alive (may have ignored the truncated data)")
        }
    };

    Ok(verdict)
}

/// C0 with version 5 and a random C1, without waiting for any server response
pub fn invalid_version(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let connection = context.client.connect()?;
    let bytes = ClientHandshake::with_version(INVALID_RTMP_VERSION).generate_outbound_c0_and_c1();

    let outcome = observe(context, connection, |client, connection| {
        client.send_raw(connection, &bytes)
    })?;

    Ok(expect_disconnect(
        outcome,
        &format!("RTMP version {}", INVALID_RTMP_VERSION),
    ))
}
