//! Serial transport
//!
//! Provides blocking serial port access behind the [`Transport`] seam, so
//! the session can be driven by an in-memory channel in tests and by a real
//! port in production.

use serialport::SerialPort;
use std::io::Read;
use std::time::Duration;

use tracing::debug;

use super::{ProtocolError, DEFAULT_BAUD_RATE};

/// Opaque duplex byte channel carrying protocol frames.
///
/// Reads deliver an arbitrary chunking of the byte stream; the session
/// reassembles frames across chunk boundaries.
pub trait Transport: Send {
    /// Read whatever bytes are immediately available into `buf`.
    /// Returns 0 when nothing is pending; never blocks for long.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError>;

    /// Write the whole buffer to the device
    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError>;
}

/// Serial-port backed [`Transport`]
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Open and configure `name`, defaulting to [`DEFAULT_BAUD_RATE`]
    pub fn open(name: &str, baud_rate: Option<u32>) -> Result<Self, ProtocolError> {
        let mut port = open_port(name, baud_rate)?;
        configure_port(port.as_mut())?;
        clear_buffers(port.as_mut())?;
        Ok(Self { port })
    }
}

impl Transport for SerialChannel {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        // Poll bytes_to_read so read() never blocks the control loop
        let available = self
            .port
            .bytes_to_read()
            .map_err(|e| ProtocolError::Serial(e.to_string()))? as usize;
        if available == 0 {
            return Ok(0);
        }
        let to_read = available.min(buf.len());
        match self.port.read(&mut buf[..to_read]) {
            Ok(n) => Ok(n),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            }
            Err(e) => Err(ProtocolError::Serial(e.to_string())),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        std::io::Write::write_all(&mut self.port, data)
            .map_err(|e| ProtocolError::Serial(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| ProtocolError::Serial(e.to_string()))
    }
}

/// Open a serial port with a short timeout for responsive polling reads
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
    serialport::new(name, baud)
        .timeout(Duration::from_millis(100))
        .open()
        .map_err(|e| ProtocolError::Serial(e.to_string()))
}

/// Configure a serial port for keypad communication
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    // Standard 8N1 configuration
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::Serial(e.to_string()))?;

    // Keep DTR asserted: opening the port toggles DTR, which resets
    // bootloader-based boards; holding it high keeps the firmware running.
    if let Err(e) = port.write_data_terminal_ready(true) {
        debug!(error = %e, "failed to set DTR high, continuing");
    }
    if let Err(e) = port.write_request_to_send(true) {
        debug!(error = %e, "failed to set RTS high, continuing");
    }

    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::Serial(e.to_string()))
}
