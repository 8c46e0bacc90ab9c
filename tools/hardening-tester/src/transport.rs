//! Blocking TCP plumbing.  Every call that can block carries a timeout.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::errors::ProbeError;

/// How long a liveness probe waits for the peer before deciding it is still there
pub const LIVENESS_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

const DRAIN_BUFFER_SIZE: usize = 4096;

/// A single TCP connection to the target.  The socket is shut down when the connection is
/// closed or dropped, whichever happens first.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

impl Connection {
    /// Connects with a bounded connect call and disables Nagle so small control messages go
    /// out immediately.  `timeout` also bounds every write.
    pub fn open(address: SocketAddr, timeout: Duration) -> Result<Connection, ProbeError> {
        let connect_error = |source| ProbeError::Connect { address, source };

        let stream = TcpStream::connect_timeout(&address, timeout).map_err(connect_error)?;
        stream.set_nodelay(true).map_err(connect_error)?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(connect_error)?;

        trace!(%address, "connection opened");
        Ok(Connection {
            stream: Some(stream),
            peer: address,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn send_all(&mut self, bytes: &[u8]) -> Result<(), ProbeError> {
        let peer = self.peer;
        let stream = self.stream_mut()?;
        let result = stream.write_all(bytes).and_then(|_| stream.flush());

        match result {
            Ok(()) => {
                trace!(%peer, bytes = bytes.len(), "sent");
                Ok(())
            }

            Err(ref error) if is_timeout(error) => Err(ProbeError::TimeoutExceeded {
                operation: "send",
                timeout: stream.write_timeout().ok().flatten().unwrap_or_default(),
            }),

            Err(error) => {
                debug!(%peer, %error, "send failed");
                Err(ProbeError::Connection(error))
            }
        }
    }

    /// Reads exactly `length` bytes.  A timeout, a closed peer or any socket error gives `None`;
    /// a short buffer is never returned.
    pub fn recv_exact(&mut self, length: usize, timeout: Duration) -> Option<Vec<u8>> {
        let peer = self.peer;
        let stream = self.stream.as_mut()?;
        let deadline = Instant::now() + timeout;
        let mut buffer = vec![0_u8; length];
        let mut filled = 0;

        while filled < length {
            let remaining = match time_left(deadline) {
                Some(remaining) => remaining,
                None => {
                    debug!(%peer, filled, length, ?timeout, "receive timed out");
                    return None;
                }
            };

            if let Err(error) = stream.set_read_timeout(Some(remaining)) {
                debug!(%peer, %error, "could not arm receive timeout");
                return None;
            }

            match stream.read(&mut buffer[filled..]) {
                Ok(0) => {
                    debug!(%peer, filled, length, "peer closed mid receive");
                    return None;
                }

                Ok(count) => filled += count,
                Err(ref error) if error.kind() == io::ErrorKind::Interrupted => (),
                Err(ref error) if is_timeout(error) => {
                    debug!(%peer, filled, length, ?timeout, "receive timed out");
                    return None;
                }

                Err(error) => {
                    debug!(%peer, %error, "receive failed");
                    return None;
                }
            }
        }

        Some(buffer)
    }

    /// Peeks at the socket for up to a second without consuming anything.  Only an orderly
    /// close (a zero byte peek) or a socket error count as dead; silence counts as alive.
    pub fn is_alive(&mut self) -> bool {
        let peer = self.peer;
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return false,
        };

        if let Err(error) = stream.set_read_timeout(Some(LIVENESS_PROBE_TIMEOUT)) {
            debug!(%peer, %error, "could not arm liveness probe");
            return false;
        }

        let mut buffer = [0_u8; 1];
        let alive = match stream.peek(&mut buffer) {
            Ok(0) => false,
            Ok(_) => true,
            Err(ref error) if is_timeout(error) => true,
            Err(error) => {
                trace!(%peer, %error, "liveness probe failed");
                false
            }
        };

        trace!(%peer, alive, "liveness probe");
        alive
    }

    /// Reads and throws away whatever the peer sends for up to `timeout`, stopping early if the
    /// peer closes.  Returns how many bytes were discarded.
    pub fn drain(&mut self, timeout: Duration) -> usize {
        let peer = self.peer;
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return 0,
        };

        let deadline = Instant::now() + timeout;
        let mut buffer = [0_u8; DRAIN_BUFFER_SIZE];
        let mut drained = 0;

        while let Some(remaining) = time_left(deadline) {
            if stream.set_read_timeout(Some(remaining)).is_err() {
                break;
            }

            match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => drained += count,
                Err(ref error) if error.kind() == io::ErrorKind::Interrupted => (),
                Err(_) => break,
            }
        }

        trace!(%peer, drained, "drained responses");
        drained
    }

    /// Shuts the socket down.  Calling this more than once is fine.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            trace!(peer = %self.peer, "connection closed");
        }
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, ProbeError> {
        self.stream.as_mut().ok_or_else(|| {
            ProbeError::Connection(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            ))
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Time until `deadline`, or `None` once it has passed.  Never returns a zero duration since
/// sockets reject a zero timeout.
fn time_left(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|remaining| *remaining > Duration::from_millis(0))
}
