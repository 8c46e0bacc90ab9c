//! In-process RTMP servers with just enough behavior to exercise the scenarios.  Each accepted
//! connection is served on its own thread.

use rhs_amf0::deserialize_with_max_depth;
use rhs_rtmp::handshake::{encode_c1, PACKET_SIZE, RTMP_VERSION};
use rhs_rtmp::messages::{AMF0_COMMAND_TYPE_ID, SET_CHUNK_SIZE_TYPE_ID};
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::TesterConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Connection cap used by `fast_config` and enforced by `MockBehavior::Hardened`
pub const FAST_CONNECTION_CAP: usize = 4;

/// Chunk size every RTMP peer starts with until told otherwise
const INITIAL_CHUNK_SIZE: usize = 128;
const LARGEST_CHUNK_SIZE: u32 = 0x00FF_FFFF;

#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Accepts and never reads or writes
    Silent,

    /// Completes the handshake and then keeps the connection open, discarding input
    HandshakeEcho,

    /// Like `HandshakeEcho`, but closes anything beyond `max` concurrent connections straight
    /// after accepting it
    CapacityLimited { max: usize },

    /// Closes the connection when C0 is not version 3
    VersionChecking,

    /// Closes the connection when a `SetChunkSize` of 0 or above 0xFFFFFF arrives
    ChunkSizeValidating,

    /// Completes the handshake and closes the connection `after` later, whatever the client
    /// sends
    IdleTimeout { after: Duration },

    /// Behaves like a server with every limit in place: checks the version, refuses
    /// handshakes beyond `FAST_CONNECTION_CAP`, parses chunks and closes on an oversized
    /// message, too many chunk streams, an out of range chunk size or AMF0 it cannot decode
    /// within the default nesting limit.  Any session is closed `idle_after` the handshake.
    Hardened { idle_after: Duration },
}

impl MockBehavior {
    /// `Hardened` with an idle timeout comfortably past one liveness probe
    pub fn hardened() -> MockBehavior {
        MockBehavior::Hardened {
            idle_after: Duration::from_secs(2),
        }
    }
}

/// A message whose chunks are still arriving
struct PartialMessage {
    type_id: u8,
    length: usize,
    data: Vec<u8>,
}

/// What a mock saw from one client handshake
#[derive(Debug)]
pub struct HandshakeRecord {
    pub s1: Vec<u8>,
    pub c2: Vec<u8>,
}

pub struct MockServer {
    address: SocketAddr,
    shutdown: Arc<AtomicBool>,
    accepted: Arc<AtomicUsize>,
    handshakes: Mutex<Receiver<HandshakeRecord>>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    pub fn start(behavior: MockBehavior) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("mock server bind");
        listener
            .set_nonblocking(true)
            .expect("mock server nonblocking");

        let address = listener.local_addr().expect("mock server address");
        let shutdown = Arc::new(AtomicBool::new(false));
        let accepted = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let (handshake_sender, handshake_receiver) = channel();

        let accept_thread = {
            let shutdown = shutdown.clone();
            let accepted = accepted.clone();
            thread::spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((socket, _)) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                            socket.set_nonblocking(false).expect("blocking socket");

                            let context = ConnectionContext {
                                behavior: behavior.clone(),
                                shutdown: shutdown.clone(),
                                active: active.clone(),
                                handshakes: handshake_sender.clone(),
                            };

                            thread::spawn(move || context.serve(socket));
                        }

                        Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => {
                            thread::sleep(POLL_INTERVAL)
                        }

                        Err(_) => break,
                    }
                }
            })
        };

        MockServer {
            address,
            shutdown,
            accepted,
            handshakes: Mutex::new(handshake_receiver),
            accept_thread: Some(accept_thread),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Number of TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn next_handshake(&self, timeout: Duration) -> Option<HandshakeRecord> {
        self.handshakes.lock().ok()?.recv_timeout(timeout).ok()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

struct ConnectionContext {
    behavior: MockBehavior,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    handshakes: Sender<HandshakeRecord>,
}

impl ConnectionContext {
    fn serve(self, mut socket: TcpStream) {
        let _ = socket.set_read_timeout(Some(Duration::from_millis(50)));

        match self.behavior.clone() {
            MockBehavior::Silent => self.hold(&mut socket, None),

            MockBehavior::HandshakeEcho => {
                if self.handshake(&mut socket, false).is_ok() {
                    self.hold(&mut socket, None);
                }
            }

            MockBehavior::CapacityLimited { max } => {
                if self.active.fetch_add(1, Ordering::SeqCst) >= max {
                    self.active.fetch_sub(1, Ordering::SeqCst);
                    return;
                }

                if self.handshake(&mut socket, false).is_ok() {
                    self.hold(&mut socket, None);
                }

                self.active.fetch_sub(1, Ordering::SeqCst);
            }

            MockBehavior::VersionChecking => {
                if self.handshake(&mut socket, true).is_ok() {
                    self.hold(&mut socket, None);
                }
            }

            MockBehavior::ChunkSizeValidating => {
                if self.handshake(&mut socket, false).is_ok() {
                    self.validate_chunk_sizes(&mut socket);
                }
            }

            MockBehavior::IdleTimeout { after } => {
                if self.handshake(&mut socket, false).is_ok() {
                    self.hold(&mut socket, Some(Instant::now() + after));
                }
            }

            MockBehavior::Hardened { idle_after } => self.serve_hardened(&mut socket, idle_after),
        }
    }

    fn serve_hardened(&self, socket: &mut TcpStream, idle_after: Duration) {
        let mut c0 = [0_u8; 1];
        if read_exact_patiently(socket, &mut c0, &self.shutdown, None).is_err()
            || c0[0] != RTMP_VERSION
        {
            return;
        }

        // Only clients that actually start a handshake take a slot
        if self.active.fetch_add(1, Ordering::SeqCst) >= FAST_CONNECTION_CAP {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        if self.finish_handshake(socket).is_ok() {
            self.enforce_limits(socket, Instant::now() + idle_after);
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Reads chunks until a limit is broken, the client leaves or `until` passes
    fn enforce_limits(&self, socket: &mut TcpStream, until: Instant) {
        let limits = TesterConfig::default().limits;
        let mut chunk_size = INITIAL_CHUNK_SIZE;
        let mut chunk_streams = HashSet::new();
        let mut partial: HashMap<u32, PartialMessage> = HashMap::new();

        loop {
            let mut first = [0_u8; 1];
            if self.read_before(socket, &mut first, until).is_err() {
                return;
            }

            let csid = match first[0] & 0b0011_1111 {
                0 => {
                    let mut extra = [0_u8; 1];
                    if self.read_before(socket, &mut extra, until).is_err() {
                        return;
                    }

                    64 + extra[0] as u32
                }

                1 => {
                    let mut extra = [0_u8; 2];
                    if self.read_before(socket, &mut extra, until).is_err() {
                        return;
                    }

                    64 + extra[0] as u32 + ((extra[1] as u32) << 8)
                }

                csid => csid as u32,
            };

            chunk_streams.insert(csid);
            if chunk_streams.len() > limits.max_chunk_streams as usize {
                return;
            }

            match first[0] >> 6 {
                0 => {
                    let mut header = [0_u8; 11];
                    if self.read_before(socket, &mut header, until).is_err() {
                        return;
                    }

                    let length = ((header[3] as usize) << 16)
                        | ((header[4] as usize) << 8)
                        | header[5] as usize;
                    if length > limits.max_message_size as usize {
                        return;
                    }

                    partial.insert(
                        csid,
                        PartialMessage {
                            type_id: header[6],
                            length,
                            data: Vec::with_capacity(length),
                        },
                    );
                }

                3 if partial.contains_key(&csid) => (),
                _ => return,
            }

            let complete = match partial.get_mut(&csid) {
                Some(message) => {
                    let mut piece = vec![0_u8; (message.length - message.data.len()).min(chunk_size)];
                    if self.read_before(socket, &mut piece, until).is_err() {
                        return;
                    }

                    message.data.extend_from_slice(&piece);
                    message.data.len() == message.length
                }

                None => return,
            };

            if !complete {
                continue;
            }

            let message = match partial.remove(&csid) {
                Some(message) => message,
                None => return,
            };

            match message.type_id {
                SET_CHUNK_SIZE_TYPE_ID => {
                    if message.data.len() != 4 {
                        return;
                    }

                    let size = u32::from_be_bytes([
                        message.data[0],
                        message.data[1],
                        message.data[2],
                        message.data[3],
                    ]);

                    if size == 0 || size > LARGEST_CHUNK_SIZE {
                        return;
                    }

                    chunk_size = size as usize;
                }

                AMF0_COMMAND_TYPE_ID => {
                    let mut cursor = Cursor::new(&message.data);
                    if deserialize_with_max_depth(&mut cursor, limits.max_nesting_depth).is_err() {
                        return;
                    }
                }

                _ => (),
            }
        }
    }

    fn read_before(&self, socket: &mut TcpStream, buffer: &mut [u8], until: Instant) -> io::Result<()> {
        read_exact_patiently(socket, buffer, &self.shutdown, Some(until))
    }

    fn handshake(&self, socket: &mut TcpStream, check_version: bool) -> io::Result<()> {
        let mut c0 = [0_u8; 1];
        read_exact_patiently(socket, &mut c0, &self.shutdown, None)?;
        if check_version && c0[0] != RTMP_VERSION {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad version"));
        }

        self.finish_handshake(socket)
    }

    /// Everything after C0: reads C1, answers with S0, S1 and S2 and waits for C2
    fn finish_handshake(&self, socket: &mut TcpStream) -> io::Result<()> {
        let mut c1 = vec![0_u8; PACKET_SIZE];
        read_exact_patiently(socket, &mut c1, &self.shutdown, None)?;

        let s1 = encode_c1();
        let mut response = vec![RTMP_VERSION];
        response.extend_from_slice(&s1);
        response.extend_from_slice(&c1);
        socket.write_all(&response)?;

        let mut c2 = vec![0_u8; PACKET_SIZE];
        read_exact_patiently(socket, &mut c2, &self.shutdown, None)?;

        let _ = self.handshakes.send(HandshakeRecord { s1, c2 });
        Ok(())
    }

    /// Reads and discards until the client closes, the server shuts down or `until` passes
    fn hold(&self, socket: &mut TcpStream, until: Option<Instant>) {
        let mut buffer = [0_u8; 4096];
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }

            if let Some(deadline) = until {
                if Instant::now() >= deadline {
                    return;
                }
            }

            match socket.read(&mut buffer) {
                Ok(0) => return,
                Ok(_) => (),
                Err(ref error) if is_timeout(error) => (),
                Err(_) => return,
            }
        }
    }

    /// Parses type 0 chunks with one byte basic headers, which is all the chunk size
    /// scenarios send on csid 2
    fn validate_chunk_sizes(&self, socket: &mut TcpStream) {
        loop {
            let mut header = [0_u8; 12];
            if read_exact_patiently(socket, &mut header, &self.shutdown, None).is_err() {
                return;
            }

            let length =
                ((header[4] as usize) << 16) | ((header[5] as usize) << 8) | header[6] as usize;
            let type_id = header[7];

            let mut payload = vec![0_u8; length.min(128)];
            if read_exact_patiently(socket, &mut payload, &self.shutdown, None).is_err() {
                return;
            }

            if type_id == 1 && payload.len() == 4 {
                let size = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                if size == 0 || size > 0x00FF_FFFF {
                    return;
                }
            } else {
                // Anything else: throw away the rest of the stream and stay connected
                self.hold(socket, None);
                return;
            }
        }
    }
}

/// Fills `buffer` unless the client leaves, the server shuts down or `until` passes
fn read_exact_patiently(
    socket: &mut TcpStream,
    buffer: &mut [u8],
    shutdown: &AtomicBool,
    until: Option<Instant>,
) -> io::Result<()> {
    let mut filled = 0;
    while filled < buffer.len() {
        if shutdown.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "shutdown"));
        }

        if until.map_or(false, |deadline| Instant::now() >= deadline) {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }

        match socket.read(&mut buffer[filled..]) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(count) => filled += count,
            Err(ref error) if is_timeout(error) => (),
            Err(error) => return Err(error),
        }
    }

    Ok(())
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// A configuration with millisecond pacing, pointed at `address`
pub fn fast_config(address: SocketAddr) -> TesterConfig {
    let mut config = TesterConfig::default();
    config.target.host = address.ip().to_string();
    config.target.port = address.port();

    config.limits.max_connections = FAST_CONNECTION_CAP;
    config.limits.max_connections_per_address = FAST_CONNECTION_CAP;
    config.limits.publish_timeout_ms = 300;
    config.limits.video_data_timeout_ms = 600;
    config.limits.io_timeout_ms = 1_000;

    config.timing.connect_timeout_ms = 1_000;
    config.timing.preflight_timeout_ms = 1_000;
    config.timing.settle_delay_ms = 100;
    config.timing.drain_timeout_ms = 50;
    config.timing.cooldown_ms = 10;
    config.timing.timing_slack_ms = 200;
    config.timing.flood_window_ms = 100;
    config.timing.flood_connect_timeout_ms = 500;
    config.timing.accept_pause_ms = 10;

    config
}
