//! The fixed battery of scenarios.  Each one drives the target through a single protocol shape
//! and turns what it observes (connection kept, connection closed, elapsed time) into a
//! verdict.

mod capacity;
mod liveness;
mod malformed;
mod timeouts;

use std::fmt;
use std::thread;
use tracing::debug;

use crate::client::ProtocolClient;
use crate::config::{ConfigError, TesterConfig};
use crate::errors::ProbeError;
use crate::transport::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    CapacityLimit,
    MalformedInput,
    TimeoutEnforcement,
    LivenessRegression,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            Category::CapacityLimit => "capacity limit",
            Category::MalformedInput => "malformed input",
            Category::TimeoutEnforcement => "timeout enforcement",
            Category::LivenessRegression => "liveness regression",
        };

        f.write_str(text)
    }
}

/// The outcome of a scenario that ran to completion
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub detail: String,
}

impl Verdict {
    pub fn pass<S: Into<String>>(detail: S) -> Verdict {
        Verdict {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail<S: Into<String>>(detail: S) -> Verdict {
        Verdict {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Everything a scenario needs to talk to the target
pub struct ScenarioContext<'a> {
    pub client: &'a ProtocolClient,
    pub config: &'a TesterConfig,
}

/// Something the orchestrator can run and report on
pub trait Probe {
    /// 1-based position in the battery
    fn number(&self) -> usize;
    fn name(&self) -> &'static str;
    fn category(&self) -> Category;

    /// One line describing the outcome that counts as a pass
    fn expectation(&self) -> &'static str;

    fn run(&self, context: &ScenarioContext) -> Result<Verdict, ProbeError>;
}

/// Whether the target kept a connection open after it was sent something hostile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Disconnected,
    StillConnected,
}

/// Handshakes a fresh connection and drains the server's greeting.  A refused handshake is
/// an error since the scenario never reached the target's protocol layer.
fn open_session(context: &ScenarioContext) -> Result<Connection, ProbeError> {
    let client = context.client;
    let mut connection = client.connect()?;
    if !client.perform_handshake(&mut connection) {
        connection.close();
        return Err(ProbeError::Handshake {
            address: client.target(),
        });
    }

    client.drain_handshake_responses(&mut connection);
    Ok(connection)
}

/// Runs `attack` on a fresh session, see `observe`
fn observe_attack<F>(context: &ScenarioContext, attack: F) -> Result<Outcome, ProbeError>
where
    F: FnOnce(&ProtocolClient, &mut Connection) -> Result<(), ProbeError>,
{
    let connection = open_session(context)?;
    observe(context, connection, attack)
}

/// Runs `attack`, lets the target settle and probes the connection.  A send that fails
/// because the target already hung up counts as a disconnect.
fn observe<F>(
    context: &ScenarioContext,
    mut connection: Connection,
    attack: F,
) -> Result<Outcome, ProbeError>
where
    F: FnOnce(&ProtocolClient, &mut Connection) -> Result<(), ProbeError>,
{
    let outcome = match attack(context.client, &mut connection) {
        Ok(()) => {
            thread::sleep(context.config.timing.settle_delay());
            if connection.is_alive() {
                Outcome::StillConnected
            } else {
                Outcome::Disconnected
            }
        }

        Err(ref error) if error.is_disconnect() => {
            debug!(%error, "target hung up mid attack");
            Outcome::Disconnected
        }

        Err(error) => return Err(error),
    };

    connection.close();
    Ok(outcome)
}

/// Pass when the target hung up, fail when it kept listening
fn expect_disconnect(outcome: Outcome, reason: &str) -> Verdict {
    match outcome {
        Outcome::Disconnected => Verdict::pass(format!("Server disconnected the client ({})", reason)),
        Outcome::StillConnected => Verdict::fail(format!("Server did NOT disconnect ({})", reason)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    MaxConnections,
    OversizedMessage,
    ChunkSizeZero,
    ChunkSizeTooLarge,
    ChunkStreamExhaustion,
    Amf0DeepNesting,
    Amf0Truncated,
    PublishTimeout,
    HealthCheck,
    ConnectionFlood,
    InvalidRtmpVersion,
    HalfOpenConnections,
    PerAddressLimit,
    VideoDataTimeout,
}

impl Scenario {
    /// The full battery in the order it runs
    pub const ALL: [Scenario; 14] = [
        Scenario::MaxConnections,
        Scenario::OversizedMessage,
        Scenario::ChunkSizeZero,
        Scenario::ChunkSizeTooLarge,
        Scenario::ChunkStreamExhaustion,
        Scenario::Amf0DeepNesting,
        Scenario::Amf0Truncated,
        Scenario::PublishTimeout,
        Scenario::HealthCheck,
        Scenario::ConnectionFlood,
        Scenario::InvalidRtmpVersion,
        Scenario::HalfOpenConnections,
        Scenario::PerAddressLimit,
        Scenario::VideoDataTimeout,
    ];

    /// Picks scenarios whose number, or name containing the filter (case insensitive), matches
    /// one of `filters`, keeping battery order.  No filters means the whole battery.
    pub fn select(filters: &[String]) -> Result<Vec<Scenario>, ConfigError> {
        if filters.is_empty() {
            return Ok(Scenario::ALL.to_vec());
        }

        for filter in filters {
            if !Scenario::ALL.iter().any(|scenario| scenario.matches(filter)) {
                return Err(ConfigError::Invalid(format!("unknown scenario '{}'", filter)));
            }
        }

        Ok(Scenario::ALL
            .iter()
            .copied()
            .filter(|scenario| filters.iter().any(|filter| scenario.matches(filter)))
            .collect())
    }

    fn matches(&self, filter: &str) -> bool {
        let filter = filter.trim();
        match filter.parse::<usize>() {
            Ok(number) => number == self.number(),
            Err(_) => {
                !filter.is_empty()
                    && self
                        .name()
                        .to_ascii_lowercase()
                        .contains(&filter.to_ascii_lowercase())
            }
        }
    }
}

impl Probe for Scenario {
    fn number(&self) -> usize {
        match self {
            Scenario::MaxConnections => 1,
            Scenario::OversizedMessage => 2,
            Scenario::ChunkSizeZero => 3,
            Scenario::ChunkSizeTooLarge => 4,
            Scenario::ChunkStreamExhaustion => 5,
            Scenario::Amf0DeepNesting => 6,
            Scenario::Amf0Truncated => 7,
            Scenario::PublishTimeout => 8,
            Scenario::HealthCheck => 9,
            Scenario::ConnectionFlood => 10,
            Scenario::InvalidRtmpVersion => 11,
            Scenario::HalfOpenConnections => 12,
            Scenario::PerAddressLimit => 13,
            Scenario::VideoDataTimeout => 14,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Scenario::MaxConnections => "Max Connections",
            Scenario::OversizedMessage => "Oversized Message",
            Scenario::ChunkSizeZero => "Chunk Size Zero",
            Scenario::ChunkSizeTooLarge => "Chunk Size Too Large",
            Scenario::ChunkStreamExhaustion => "Chunk Stream Exhaustion",
            Scenario::Amf0DeepNesting => "AMF0 Deep Nesting",
            Scenario::Amf0Truncated => "AMF0 Truncated",
            Scenario::PublishTimeout => "Publish Timeout",
            Scenario::HealthCheck => "Server Health Check",
            Scenario::ConnectionFlood => "Connection Flood",
            Scenario::InvalidRtmpVersion => "Invalid RTMP Version",
            Scenario::HalfOpenConnections => "Half-Open Connections",
            Scenario::PerAddressLimit => "Per-Address Connection Limit",
            Scenario::VideoDataTimeout => "Video Data Timeout",
        }
    }

    fn category(&self) -> Category {
        match self {
            Scenario::MaxConnections | Scenario::ChunkStreamExhaustion | Scenario::PerAddressLimit => {
                Category::CapacityLimit
            }

            Scenario::OversizedMessage
            | Scenario::ChunkSizeZero
            | Scenario::ChunkSizeTooLarge
            | Scenario::Amf0DeepNesting
            | Scenario::Amf0Truncated
            | Scenario::InvalidRtmpVersion => Category::MalformedInput,

            Scenario::PublishTimeout | Scenario::VideoDataTimeout => Category::TimeoutEnforcement,

            Scenario::HealthCheck | Scenario::ConnectionFlood | Scenario::HalfOpenConnections => {
                Category::LivenessRegression
            }
        }
    }

    fn expectation(&self) -> &'static str {
        match self {
            Scenario::MaxConnections => "at most cap + 2 connections accepted and at least one rejected",
            Scenario::OversizedMessage => "disconnect after a header advertising an oversized message",
            Scenario::ChunkSizeZero => "disconnect after SetChunkSize 0",
            Scenario::ChunkSizeTooLarge => "disconnect after SetChunkSize above 16777215",
            Scenario::ChunkStreamExhaustion => "disconnect once the chunk stream cap is exceeded",
            Scenario::Amf0DeepNesting => "clean disconnect on AMF0 nested past the depth limit",
            Scenario::Amf0Truncated => "disconnect or ignore a truncated AMF0 number (advisory)",
            Scenario::PublishTimeout => "disconnect when no publish follows connect",
            Scenario::HealthCheck => "handshake and connect still work after the attacks",
            Scenario::ConnectionFlood => "handshake still works right after a connect/close flood",
            Scenario::InvalidRtmpVersion => "disconnect on a C0 version other than 3",
            Scenario::HalfOpenConnections => "fresh handshake works while idle sockets are open",
            Scenario::PerAddressLimit => "at most per-address cap + 2 accepted and at least one rejected",
            Scenario::VideoDataTimeout => "disconnect when publish is never followed by media data",
        }
    }

    fn run(&self, context: &ScenarioContext) -> Result<Verdict, ProbeError> {
        let config = context.config;
        match self {
            Scenario::MaxConnections => {
                capacity::max_connections(context, config.effective_connection_cap())
            }

            Scenario::OversizedMessage => malformed::oversized_message(context),
            Scenario::ChunkSizeZero => malformed::set_chunk_size(context, 0),
            Scenario::ChunkSizeTooLarge => {
                malformed::set_chunk_size(context, malformed::OVERSIZED_CHUNK_SIZE)
            }
            Scenario::ChunkStreamExhaustion => capacity::chunk_stream_exhaustion(context),
            Scenario::Amf0DeepNesting => malformed::deep_nesting(context),
            Scenario::Amf0Truncated => malformed::truncated_amf0(context),
            Scenario::PublishTimeout => timeouts::publish_timeout(context),
            Scenario::HealthCheck => liveness::health_check(context),
            Scenario::ConnectionFlood => liveness::connection_flood(context),
            Scenario::InvalidRtmpVersion => malformed::invalid_version(context),
            Scenario::HalfOpenConnections => liveness::half_open_connections(context),

            Scenario::PerAddressLimit => {
                capacity::per_address_limit(context, config.limits.max_connections_per_address)
            }

            Scenario::VideoDataTimeout => timeouts::video_data_timeout(context),
        }
    }
}
