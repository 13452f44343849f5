//! Connection management
//!
//! Binds a [`Transport`] to a [`Session`] and pumps bytes between them.
//! The connection runs single-threaded: callers issue a command, then call
//! [`Connection::poll`] until the matching event (or a timeout) surfaces.

use serde::{Deserialize, Serialize};

use super::{
    serial::{SerialChannel, Transport},
    ProtocolError, Session, SessionEvent, SessionOutput,
};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connecting (handshake in progress)
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection error
    Error,
}

/// Keypad connection owning the transport and the protocol session
pub struct Connection {
    transport: Option<Box<dyn Transport>>,
    session: Session,
    state: ConnectionState,
}

impl Connection {
    /// Create a new connection (not yet connected)
    pub fn new() -> Self {
        Self::with_session(Session::new())
    }

    /// Create a connection around an existing session (e.g. with a test
    /// clock)
    pub fn with_session(session: Session) -> Self {
        Self {
            transport: None,
            session,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The protocol session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable session access, for keymap edits
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Open a serial port and send the connect-time liveness probe
    pub fn connect(&mut self, port_name: &str, baud_rate: Option<u32>) -> Result<(), ProtocolError> {
        if self.state == ConnectionState::Connected {
            return Err(ProtocolError::AlreadyConnected);
        }
        self.state = ConnectionState::Connecting;
        match SerialChannel::open(port_name, baud_rate) {
            Ok(channel) => self.attach(Box::new(channel)),
            Err(e) => {
                self.state = ConnectionState::Error;
                Err(e)
            }
        }
    }

    /// Attach an already-open transport and probe the device
    pub fn attach(&mut self, transport: Box<dyn Transport>) -> Result<(), ProtocolError> {
        self.transport = Some(transport);
        let probe = self.session.get_info();
        match self.write(&probe) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.transport = None;
                self.state = ConnectionState::Error;
                Err(e)
            }
        }
    }

    /// Drop the transport
    pub fn disconnect(&mut self) {
        self.transport = None;
        self.state = ConnectionState::Disconnected;
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.transport
            .as_mut()
            .ok_or(ProtocolError::NotConnected)?
            .write_all(data)
    }

    /// Drain available bytes, run timers, and forward chained frames.
    /// Returns the events produced by this poll.
    pub fn poll(&mut self) -> Result<Vec<SessionEvent>, ProtocolError> {
        let mut events = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let n = self
                .transport
                .as_mut()
                .ok_or(ProtocolError::NotConnected)?
                .read_chunk(&mut buf)?;
            if n == 0 {
                break;
            }
            let outputs = self.session.receive(&buf[..n]);
            self.dispatch(outputs, &mut events)?;
        }
        let outputs = self.session.tick();
        self.dispatch(outputs, &mut events)?;
        Ok(events)
    }

    fn dispatch(
        &mut self,
        outputs: Vec<SessionOutput>,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), ProtocolError> {
        for output in outputs {
            match output {
                SessionOutput::Transmit(bytes) => self.write(&bytes)?,
                SessionOutput::Event(event) => events.push(event),
            }
        }
        Ok(())
    }

    /// Request the device's keymap
    pub fn get_map(&mut self) -> Result<(), ProtocolError> {
        let frame = self.session.get_map();
        self.write(&frame)
    }

    /// Push the working keymap into device RAM
    pub fn set_map(&mut self) -> Result<(), ProtocolError> {
        let frame = self.session.set_map();
        self.write(&frame)
    }

    /// Push the working keymap, then persist it on success
    pub fn set_map_and_save(&mut self) -> Result<(), ProtocolError> {
        let frame = self.session.set_map_and_save();
        self.write(&frame)
    }

    /// Persist device RAM to flash
    pub fn save(&mut self) -> Result<(), ProtocolError> {
        let frame = self.session.save();
        self.write(&frame)
    }

    /// Load flash into device RAM, then fetch the resulting map
    pub fn load(&mut self) -> Result<(), ProtocolError> {
        let frame = self.session.load();
        self.write(&frame)
    }

    /// Restore factory defaults, then fetch the resulting map
    pub fn reset_default(&mut self) -> Result<(), ProtocolError> {
        let frame = self.session.reset_default();
        self.write(&frame)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let conn = Connection::new();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_commands_require_transport() {
        let mut conn = Connection::new();
        assert!(matches!(conn.get_map(), Err(ProtocolError::NotConnected)));
        assert!(matches!(conn.poll(), Err(ProtocolError::NotConnected)));
    }
}
