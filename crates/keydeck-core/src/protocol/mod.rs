//! Device Protocol Communication
//!
//! Implements the KeyDeck serial protocol: COBS-framed, CRC16-checked
//! request/response frames with 8-bit sequence numbers.
//!
//! Every frame on the wire is `[0xA5][ver][type][seq][len:u16 LE][payload]
//! [crc16 LE]`, COBS-encoded and terminated by a single 0x00 byte. The CRC
//! covers header and payload but not the sync byte.

pub mod cobs;
pub mod command;
mod connection;
pub mod crc;
mod error;
pub mod frame;
pub mod serial;
mod session;

pub use command::Command;
pub use connection::{Connection, ConnectionState};
pub use error::ProtocolError;
pub use frame::Frame;
pub use serial::{SerialChannel, Transport};
pub use session::{Clock, FailureReason, MonotonicClock, Session, SessionEvent, SessionOutput};

/// Leading sync byte of every raw frame
pub const SYNC_BYTE: u8 = 0xA5;

/// Frame header version
pub const PROTOCOL_VERSION: u8 = 1;

/// Frame header size: version, type, seq, 16-bit length
pub const HEADER_LEN: usize = 5;

/// Minimum raw frame size: sync + header + CRC16
pub const MIN_FRAME_LEN: usize = 1 + HEADER_LEN + 2;

/// Default baud rate for keypad communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Per-request response timeout in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 5000;

/// Interval between keepalive pings in milliseconds
pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;
