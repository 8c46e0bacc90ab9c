use std::thread;
use std::time::Instant;
use tracing::debug;

use super::{ScenarioContext, Verdict};
use crate::errors::ProbeError;

/// Idle TCP connections held open while checking that a real client still gets in
const HALF_OPEN_CONNECTIONS: usize = 5;

/// A plain handshake and `connect` after the destructive scenarios
pub fn health_check(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let client = context.client;
    let mut connection = match client.connect_and_handshake() {
        Some(connection) => connection,
        None => {
            return Ok(Verdict::fail(
                "Server is not accepting connections after attacks",
            ))
        }
    };

    let alive = match client.send_connect(&mut connection, &context.config.publish.app_name) {
        Ok(()) => connection.is_alive(),
        Err(ref error) if error.is_disconnect() => false,
        Err(error) => return Err(error),
    };

    connection.close();

    if alive {
        Ok(Verdict::pass("Server is healthy and accepting new connections"))
    } else {
        Ok(Verdict::fail("Server closed a well-formed connect"))
    }
}

/// Opens and immediately closes raw TCP connections for the flood window, then checks a
/// handshake still succeeds
pub fn connection_flood(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let client = context.client;
    let timing = &context.config.timing;
    let window = timing.flood_window();
    let connect_timeout = timing.flood_connect_timeout();

    let mut succeeded = 0_usize;
    let mut failed = 0_usize;
    let started = Instant::now();

    while started.elapsed() < window {
        match client.connect_with_timeout(connect_timeout) {
            Ok(mut connection) => {
                connection.close();
                succeeded += 1;
            }

            Err(_) => failed += 1,
        }
    }

    debug!(succeeded, failed, "flood finished");
    let counts = format!(
        "{} connections attempted, {} succeeded, {} rejected or failed",
        succeeded + failed,
        succeeded,
        failed
    );

    thread::sleep(timing.settle_delay());

    match client.connect_and_handshake() {
        Some(mut connection) => {
            connection.close();
            Ok(Verdict::pass(format!("Server still healthy after flood ({})", counts)))
        }

        None => Ok(Verdict::fail(format!(
            "Server not responding after flood ({})",
            counts
        ))),
    }
}

/// Holds connections that never send a handshake byte while a fresh client handshakes
pub fn half_open_connections(context: &ScenarioContext) -> Result<Verdict, ProbeError> {
    let client = context.client;
    let mut idle = Vec::with_capacity(HALF_OPEN_CONNECTIONS);

    for _ in 0..HALF_OPEN_CONNECTIONS {
        match client.connect() {
            Ok(connection) => idle.push(connection),
            Err(error) => debug!(%error, "idle connection was not accepted"),
        }
    }

    thread::sleep(context.config.timing.settle_delay());

    let verdict = match client.connect_and_handshake() {
        Some(mut connection) => {
            connection.close();
            Verdict::pass(format!(
                "Server still accepts new connections with {} idle sockets open",
                idle.len()
            ))
        }

        None => Verdict::fail(format!(
            "Server not accepting connections with {} idle sockets open",
            idle.len()
        )),
    };

    for connection in idle.iter_mut() {
        connection.close();
    }

    Ok(verdict)
}
