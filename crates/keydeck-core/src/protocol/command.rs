//! Protocol commands
//!
//! Command bytes are stable on-wire constants shared with the firmware.
//! Responses echo the request's command byte, so the same values appear in
//! both directions.

use serde::{Deserialize, Serialize};

/// Protocol commands for keypad communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Keepalive probe (silent, no pending request)
    Ping,
    /// Keepalive reply; ignored when received
    Pong,
    /// Fetch the device's keymap as a sparse diff
    GetMap,
    /// Push a sparse keymap diff into device RAM
    SetMap,
    /// Persist device RAM to flash
    Save,
    /// Load flash back into device RAM
    Load,
    /// Restore the factory map and persist it
    ResetDefault,
    /// Liveness/handshake probe, sent once at connect time
    GetInfo,
    /// Device-reported failure; payload is a text reason
    Error,
}

impl Command {
    /// On-wire command byte
    pub fn wire_byte(self) -> u8 {
        match self {
            Command::Ping => 0x01,
            Command::Pong => 0x02,
            Command::GetMap => 0x10,
            Command::SetMap => 0x11,
            Command::Save => 0x12,
            Command::Load => 0x13,
            Command::ResetDefault => 0x14,
            Command::GetInfo => 0x15,
            Command::Error => 0x7F,
        }
    }

    /// Parse an on-wire command byte
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Command::Ping),
            0x02 => Some(Command::Pong),
            0x10 => Some(Command::GetMap),
            0x11 => Some(Command::SetMap),
            0x12 => Some(Command::Save),
            0x13 => Some(Command::Load),
            0x14 => Some(Command::ResetDefault),
            0x15 => Some(Command::GetInfo),
            0x7F => Some(Command::Error),
            _ => None,
        }
    }

    /// Human-readable name, used to key UI notifications
    pub fn name(self) -> &'static str {
        match self {
            Command::Ping => "Ping",
            Command::Pong => "Pong",
            Command::GetMap => "Read Config",
            Command::SetMap => "Write RAM",
            Command::Save => "Save to Flash",
            Command::Load => "Load from Flash",
            Command::ResetDefault => "Restore Defaults",
            Command::GetInfo => "Get Info",
            Command::Error => "Device Error",
        }
    }
}
