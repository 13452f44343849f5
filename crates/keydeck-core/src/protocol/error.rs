//! Protocol errors

use thiserror::Error;

use crate::keymap::codec::CodecError;

/// Errors that can occur during keypad communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// COBS decode failed; the frame is dropped and scanning resumes
    #[error("framing error: {0}")]
    Framing(&'static str),

    /// Frame CRC16 did not match its contents
    #[error("frame CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// CRC computed over the received bytes
        expected: u16,
        /// CRC carried by the frame
        actual: u16,
    },

    /// Raw frame smaller than sync + header + CRC
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// Frame did not start with the 0xA5 sync byte
    #[error("bad sync byte: {0:#04x}")]
    BadSync(u8),

    /// Declared payload length exceeds the received frame
    #[error("declared payload length {declared} exceeds frame size {frame_len}")]
    LengthMismatch {
        /// Length claimed by the header
        declared: usize,
        /// Bytes actually received
        frame_len: usize,
    },

    /// No response arrived within the request window
    #[error("request timed out")]
    Timeout,

    /// Device-reported failure with its text reason
    #[error("device error: {0}")]
    Device(String),

    /// Config payload failed to decode
    #[error("config decode failed: {0}")]
    Codec(#[from] CodecError),

    /// No transport attached
    #[error("not connected to keypad")]
    NotConnected,

    /// Connect called while already connected
    #[error("already connected")]
    AlreadyConnected,

    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
