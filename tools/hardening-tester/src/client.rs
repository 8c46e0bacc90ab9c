use rhs_rtmp::chunk_io::ChunkSerializer;
use rhs_rtmp::handshake::{ClientHandshake, SERVER_RESPONSE_SIZE};
use rhs_rtmp::messages::{commands, MessagePayload, RtmpMessage};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::TesterConfig;
use crate::errors::ProbeError;
use crate::transport::Connection;

/// Chunk stream used for protocol control messages
pub const PROTOCOL_CONTROL_CSID: u32 = 2;

/// Chunk stream used for `connect` and `createStream`
pub const COMMAND_CSID: u32 = 3;

/// Chunk stream used for `publish`, which targets the created message stream
pub const PUBLISH_CSID: u32 = 8;

/// Message stream id handed out by the server's first `createStream`
pub const PUBLISH_STREAM_ID: u32 = 1;

/// Client level operations against one target: handshakes, chunked messages, raw bytes and
/// the publish command sequence
#[derive(Debug, Clone)]
pub struct ProtocolClient {
    target: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Duration,
    drain_timeout: Duration,
    command_drain_timeout: Duration,
    serializer: ChunkSerializer,
}

impl ProtocolClient {
    pub fn new(target: SocketAddr, config: &TesterConfig) -> Result<ProtocolClient, ProbeError> {
        Ok(ProtocolClient {
            target,
            connect_timeout: config.timing.connect_timeout(),
            io_timeout: config.limits.io_timeout(),
            drain_timeout: config.timing.drain_timeout(),
            command_drain_timeout: config.timing.settle_delay(),
            serializer: ChunkSerializer::with_chunk_size(config.publish.chunk_size)?,
        })
    }

    /// Opens a raw TCP connection without handshaking
    pub fn connect(&self) -> Result<Connection, ProbeError> {
        Connection::open(self.target, self.connect_timeout)
    }

    /// Opens a raw TCP connection with a custom connect timeout
    pub fn connect_with_timeout(&self, timeout: Duration) -> Result<Connection, ProbeError> {
        Connection::open(self.target, timeout)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Sends C0 and C1, waits for all 3073 bytes of S0, S1 and S2 and answers with C2.  A
    /// short, late or malformed response fails the handshake.
    pub fn perform_handshake(&self, connection: &mut Connection) -> bool {
        let peer = connection.peer();
        let handshake = ClientHandshake::new();
        if let Err(error) = connection.send_all(&handshake.generate_outbound_c0_and_c1()) {
            debug!(%peer, %error, "could not send C0 and C1");
            return false;
        }

        let response = match connection.recv_exact(SERVER_RESPONSE_SIZE, self.io_timeout) {
            Some(response) => response,
            None => return false,
        };

        let c2 = match handshake.process_server_response(&response) {
            Ok(c2) => c2,
            Err(error) => {
                debug!(%peer, %error, "invalid server handshake");
                return false;
            }
        };

        match connection.send_all(&c2) {
            Ok(()) => {
                trace!(%peer, "handshake completed");
                true
            }

            Err(error) => {
                debug!(%peer, %error, "could not send C2");
                false
            }
        }
    }

    /// Connects and handshakes.  The connection is closed before `None` is returned.
    pub fn connect_and_handshake(&self) -> Option<Connection> {
        let mut connection = match self.connect() {
            Ok(connection) => connection,
            Err(error) => {
                debug!(address = %self.target, %error, "connect failed");
                return None;
            }
        };

        if self.perform_handshake(&mut connection) {
            Some(connection)
        } else {
            connection.close();
            None
        }
    }

    /// Sends `payload` as one message: a type 0 header announcing the full length, then the
    /// payload split at the configured chunk size with type 3 headers between the pieces
    pub fn send_payload(
        &self,
        connection: &mut Connection,
        csid: u32,
        type_id: u8,
        payload: &[u8],
        message_stream_id: u32,
    ) -> Result<(), ProbeError> {
        let message = MessagePayload {
            timestamp: 0,
            type_id,
            message_stream_id,
            data: payload.to_vec().into(),
        };

        self.send_payload_message(connection, csid, &message)
    }

    pub fn send_message(
        &self,
        connection: &mut Connection,
        csid: u32,
        message: RtmpMessage,
        message_stream_id: u32,
    ) -> Result<(), ProbeError> {
        let payload = message.into_message_payload(0, message_stream_id)?;
        self.send_payload_message(connection, csid, &payload)
    }

    /// Sends bytes exactly as given, with no framing
    pub fn send_raw(&self, connection: &mut Connection, bytes: &[u8]) -> Result<(), ProbeError> {
        connection.send_all(bytes)
    }

    /// Throws away the handshake's trailing responses before the next protocol action
    pub fn drain_handshake_responses(&self, connection: &mut Connection) -> usize {
        connection.drain(self.drain_timeout)
    }

    /// Throws away responses to a command, which can take longer than handshake leftovers
    pub fn drain_command_responses(&self, connection: &mut Connection) -> usize {
        connection.drain(self.command_drain_timeout)
    }

    /// `connect` followed by the response drain
    pub fn send_connect(&self, connection: &mut Connection, app_name: &str) -> Result<(), ProbeError> {
        self.send_message(connection, COMMAND_CSID, commands::connect(app_name), 0)?;
        self.drain_command_responses(connection);
        Ok(())
    }

    /// Runs `connect`, `createStream` and `publish`, draining responses after each, so the
    /// connection ends up in a publishing state on a compliant server
    pub fn run_publish_sequence(
        &self,
        connection: &mut Connection,
        app_name: &str,
        stream_name: &str,
    ) -> Result<(), ProbeError> {
        self.send_connect(connection, app_name)?;

        self.send_message(connection, COMMAND_CSID, commands::create_stream(), 0)?;
        self.drain_handshake_responses(connection);

        self.send_message(
            connection,
            PUBLISH_CSID,
            commands::publish(stream_name),
            PUBLISH_STREAM_ID,
        )?;
        self.drain_command_responses(connection);

        debug!(peer = %connection.peer(), app_name, stream_name, "publish sequence sent");
        Ok(())
    }

    fn send_payload_message(
        &self,
        connection: &mut Connection,
        csid: u32,
        message: &MessagePayload,
    ) -> Result<(), ProbeError> {
        let bytes = self.serializer.serialize(csid, message)?;
        connection.send_all(&bytes)
    }
}
