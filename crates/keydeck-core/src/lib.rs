//! # KeyDeck Core Library
//!
//! Core functionality for the KeyDeck keypad configurator.
//!
//! This library provides:
//! - The keymap data model for a 5x5, two-layer programmable keypad
//! - A sparse binary codec that ships only cells differing from the
//!   factory defaults
//! - The serial device protocol: COBS framing, CRC16 integrity, and a
//!   sequence-numbered request/response session with timeouts, command
//!   chaining, and a heartbeat keepalive
//!
//! The session layer is sans-I/O: sends return wire bytes and received
//! chunks come back as events plus follow-up frames, so everything can be
//! tested without a physical keypad. A thin [`protocol::Connection`] binds
//! a session to a real serial port.
//!
//! ## Example
//!
//! ```rust,ignore
//! use keydeck_core::protocol::Connection;
//!
//! let mut conn = Connection::new();
//! conn.connect("/dev/ttyACM0", None)?;
//! conn.get_map()?;
//! loop {
//!     for event in conn.poll()? {
//!         println!("{event:?}");
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod keymap;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::keymap::{Action, ActionKind, KeymapConfig, Layer, MacroOp, MacroStep};
    pub use crate::protocol::{
        Command, Connection, ConnectionState, ProtocolError, Session, SessionEvent,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
