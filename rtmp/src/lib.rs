//! The client half of the RTMP wire protocol needed to drive an RTMP server: handshake packets,
//! chunk headers and chunked message serialization, and the few protocol control and command
//! messages a publishing client sends.
//!
//! Nothing in this crate performs I/O.  Every function returns the bytes to put on the wire and
//! leaves the socket work to the caller.
//!
//! ```
//! use rhs_rtmp::chunk_io::ChunkSerializer;
//! use rhs_rtmp::messages::commands;
//!
//! let payload = commands::connect("live").into_message_payload(0, 0).unwrap();
//! let bytes = ChunkSerializer::new().serialize(3, &payload).unwrap();
//! assert_eq!(bytes[0], 3);
//! ```

pub mod chunk_io;
pub mod handshake;
pub mod messages;
