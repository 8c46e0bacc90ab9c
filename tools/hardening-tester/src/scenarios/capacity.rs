use rhs_amf0::{encode_number, encode_string};
use rhs_rtmp::chunk_io::encode_chunk_header;
use rhs_rtmp::messages::AMF0_COMMAND_TYPE_ID;
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::{expect_disconnect, observe_attack, ScenarioContext, Verdict};
use crate::errors::ProbeError;

/// Attempts beyond the cap, so rejections have room to show up
const EXTRA_ATTEMPTS: usize = 5;

/// Accepted connections allowed above the cap before the limit counts as not enforced
const ACCEPTED_TOLERANCE: usize = 2;

const MAX_CONNECTIONS_PAUSE_EVERY: usize = 10;
const PER_ADDRESS_PAUSE_EVERY: usize = 5;

/// First chunk stream id used by the exhaustion scenario.  2 and 3 are left to control
/// messages and commands.
const FIRST_EXHAUSTION_CSID: u32 = 4;
const EXHAUSTION_SEND_GAP: Duration = Duration::from_millis(50);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CapacityTally {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl CapacityTally {
    /// The cap holds when nothing much above it got in and something was turned away
    pub fn enforces(&self, cap: usize) -> bool {
        self.accepted <= cap + ACCEPTED_TOLERANCE && self.rejected > 0
    }

    fn verdict(&self, cap: usize, label: &str) -> Verdict {
        let counts = format!(
            "attempted {}, accepted {}, rejected {}",
            self.attempted, self.accepted, self.rejected
        );

        if self.enforces(cap) {
            Verdict::pass(format!("{} enforced ({})", label, counts))
        } else {
            Verdict::fail(format!(
                "Expected at most {} accepted with at least one rejection ({})",
                cap + ACCEPTED_TOLERANCE,
                counts
            ))
        }
    }
}

pub fn max_connections(context: &ScenarioContext, cap: usize) -> Result<Verdict, ProbeError> {
    let tally = attempt_connections(context, cap, MAX_CONNECTIONS_PAUSE_EVERY);
    Ok(tally.verdict(cap, "Connection limit"))
}

pub fn per_address_limit(context: &ScenarioContext, cap: usize) -> Result<Verdict, ProbeError> {
    let tally = attempt_connections(context, cap, PER_ADDRESS_PAUSE_EVERY);
    Ok(tally.verdict(cap, "Per-address connection limit"))
}

/// Opens `cap + 5` handshaked connections one after another, holding every accepted one
/// until all attempts are done
fn attempt_connections(context: &ScenarioContext, cap: usize, pause_every: usize) -> CapacityTally {
    let attempts = cap + EXTRA_ATTEMPTS;
    let mut tally = CapacityTally::default();
    let mut held = Vec::with_capacity(attempts);

    for attempt in 0..attempts {
        tally.attempted += 1;
        match context.client.connect_and_handshake() {
            Some(connection) => {
                tally.accepted += 1;
                held.push(connection);
            }

            None => {
                debug!(attempt, "connection rejected");
                tally.rejected += 1;
            }
        }

        if attempt % pause_every == pause_every - 1 {
            thread::sleep(context.config.timing.accept_pause());
        }
    }

    debug!(?tally, cap, "capacity attempts finished");

    for connection in held.iter_mut() {
        connection.close();
    }

    thread::sleep(context.config.timing.settle_delay());
    tally
}

/// Sends one small command on each of `max_chunk_streams + 4` distinct chunk streams
pub fn chunk_stream_exhaustion(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let cap = context.config.limits.max_chunk_streams;
    let last_csid = FIRST_EXHAUSTION_CSID + cap + 4;

    let mut payload = encode_string("ping")?;
    payload.extend(encode_number(0.0)?);

    let outcome = observe_attack(context, |client, connection| {
        for csid in FIRST_EXHAUSTION_CSID..last_csid {
            let mut bytes =
                encode_chunk_header(csid, AMF0_COMMAND_TYPE_ID, payload.len() as u32, 0, 0)?;
            bytes.extend_from_slice(&payload);

            client.send_raw(connection, &bytes)?;
            thread::sleep(EXHAUSTION_SEND_GAP);
        }

        Ok(())
    })?;

    Ok(expect_disconnect(
        outcome,
        &format!("{} chunk streams against a cap of {}", last_csid - FIRST_EXHAUSTION_CSID, cap),
    ))
}
