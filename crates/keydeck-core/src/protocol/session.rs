//! Session orchestration
//!
//! Tracks in-flight requests by sequence number, applies per-request
//! timeouts, chains follow-up commands (write-then-save, load-then-fetch),
//! and keeps the working keymap in sync with what the device reports.
//!
//! The session is sans-I/O: send operations return the wire bytes to hand
//! to the transport, and [`Session::receive`]/[`Session::tick`] return
//! events plus any chained frames to transmit. Time comes from an
//! injectable [`Clock`], so timeout and heartbeat behavior is fully
//! deterministic under test.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::keymap::{codec, KeymapConfig};

use super::{
    cobs,
    frame::{self, Frame},
    Command, ProtocolError, HEARTBEAT_INTERVAL_MS, REQUEST_TIMEOUT_MS,
};

/// Monotonic time source, injectable for deterministic tests
pub trait Clock: Send {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`]
#[derive(Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Why a request failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No response within the request window
    #[error("timed out")]
    Timeout,

    /// Response frame failed its CRC check
    #[error("checksum mismatch")]
    Checksum,

    /// Map payload failed to decode
    #[error("config decode failed")]
    Decode,

    /// Device reported an error with this reason text
    #[error("device error: {0}")]
    Device(String),
}

/// Notification for the editing collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A request completed successfully
    Succeeded {
        /// The command that completed; `command.name()` keys UI status
        command: Command,
    },
    /// A request failed
    Failed {
        /// The command that failed
        command: Command,
        /// Failure cause
        reason: FailureReason,
    },
    /// A full keymap arrived and wholesale-replaced the working config
    MapReplaced,
}

/// One product of feeding bytes or time into the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    /// Bytes to write to the transport (chained commands, heartbeats)
    Transmit(Vec<u8>),
    /// Notification to surface
    Event(SessionEvent),
}

/// Bookkeeping for one in-flight request
#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    command: Command,
    deadline: Instant,
}

/// Protocol session state: sequence counter, pending requests, chaining
/// flags, and the working keymap.
///
/// All state lives in this one object so independent sessions (and tests)
/// never share anything.
pub struct Session {
    seq: u8,
    pending: HashMap<u8, PendingRequest>,
    save_after_write: bool,
    fetch_after_load: bool,
    fetch_after_reset: bool,
    config: KeymapConfig,
    default: KeymapConfig,
    rx_buffer: Vec<u8>,
    clock: Box<dyn Clock>,
    last_heartbeat: Instant,
}

impl Session {
    /// Create a session with the real clock
    pub fn new() -> Self {
        Self::with_clock(Box::new(MonotonicClock))
    }

    /// Create a session with an injected clock
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        let default = KeymapConfig::default_map();
        let now = clock.now();
        Self {
            seq: 1,
            pending: HashMap::new(),
            save_after_write: false,
            fetch_after_load: false,
            fetch_after_reset: false,
            config: default.clone(),
            default,
            rx_buffer: Vec::new(),
            clock,
            last_heartbeat: now,
        }
    }

    /// The working keymap
    pub fn config(&self) -> &KeymapConfig {
        &self.config
    }

    /// Mutable working keymap, for the editing collaborator
    pub fn config_mut(&mut self) -> &mut KeymapConfig {
        &mut self.config
    }

    /// The immutable factory-default keymap
    pub fn default_config(&self) -> &KeymapConfig {
        &self.default
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    /// Build a frame for `command`, registering it as pending unless silent
    fn build_frame(&mut self, command: Command, payload: Vec<u8>, silent: bool) -> Vec<u8> {
        let seq = self.next_seq();
        if !silent {
            let deadline = self.clock.now() + Duration::from_millis(REQUEST_TIMEOUT_MS);
            self.pending.insert(seq, PendingRequest { command, deadline });
        }
        debug!(command = command.name(), seq, len = payload.len(), "sending frame");
        Frame::new(command.wire_byte(), seq, payload).to_wire()
    }

    /// Connect-time liveness probe
    pub fn get_info(&mut self) -> Vec<u8> {
        self.build_frame(Command::GetInfo, Vec::new(), false)
    }

    /// Request the device's keymap
    pub fn get_map(&mut self) -> Vec<u8> {
        self.build_frame(Command::GetMap, Vec::new(), false)
    }

    /// Push the working keymap into device RAM
    pub fn set_map(&mut self) -> Vec<u8> {
        let payload = codec::encode_config(&self.config, &self.default);
        self.build_frame(Command::SetMap, payload, false)
    }

    /// Push the working keymap and persist it on success.
    ///
    /// Arms the write-then-save chain: the first successful SetMap response
    /// consumes the flag and issues exactly one Save.
    pub fn set_map_and_save(&mut self) -> Vec<u8> {
        self.save_after_write = true;
        self.set_map()
    }

    /// Persist device RAM to flash
    pub fn save(&mut self) -> Vec<u8> {
        self.build_frame(Command::Save, Vec::new(), false)
    }

    /// Load flash into device RAM, then fetch the resulting map
    pub fn load(&mut self) -> Vec<u8> {
        self.fetch_after_load = true;
        self.build_frame(Command::Load, Vec::new(), false)
    }

    /// Restore factory defaults on the device, then fetch the resulting map
    pub fn reset_default(&mut self) -> Vec<u8> {
        self.fetch_after_reset = true;
        self.build_frame(Command::ResetDefault, Vec::new(), false)
    }

    /// Keepalive ping; silent, never tracked as pending
    pub fn ping(&mut self) -> Vec<u8> {
        self.build_frame(Command::Ping, Vec::new(), true)
    }

    /// Feed a chunk of received bytes.
    ///
    /// The transport may deliver any chunking; frames are reassembled
    /// across calls. Malformed frames are dropped individually and never
    /// disturb their neighbors.
    pub fn receive(&mut self, chunk: &[u8]) -> Vec<SessionOutput> {
        let mut outputs = Vec::new();
        let mut buffer = std::mem::take(&mut self.rx_buffer);
        let frames = frame::extract_frames(&mut buffer, chunk);
        self.rx_buffer = buffer;

        for encoded in frames {
            match cobs::decode(&encoded) {
                Ok(raw) => self.handle_raw(&raw, &mut outputs),
                Err(err) => warn!(%err, "dropping undecodable frame"),
            }
        }
        outputs
    }

    fn handle_raw(&mut self, raw: &[u8], outputs: &mut Vec<SessionOutput>) {
        let frame = match Frame::from_raw(raw) {
            Ok(frame) => frame,
            Err(ProtocolError::CrcMismatch { expected, actual }) => {
                // The header survived COBS, so the seq is readable and the
                // pending request can be told its response was mangled.
                warn!(expected, actual, seq = raw[3], "frame checksum mismatch");
                self.resolve_failure(raw[3], FailureReason::Checksum, outputs);
                return;
            }
            Err(err) => {
                warn!(%err, "dropping invalid frame");
                return;
            }
        };
        self.handle_frame(frame, outputs);
    }

    fn handle_frame(&mut self, frame: Frame, outputs: &mut Vec<SessionOutput>) {
        let Some(command) = Command::from_wire(frame.frame_type) else {
            debug!(frame_type = frame.frame_type, "ignoring unknown frame type");
            return;
        };

        match command {
            // Keepalives are never linked to a pending request
            Command::Ping | Command::Pong => {}

            Command::Error => {
                let reason = String::from_utf8_lossy(&frame.payload).into_owned();
                // Stale chaining intent must never fire after a failure
                self.save_after_write = false;
                self.fetch_after_load = false;
                self.fetch_after_reset = false;
                self.resolve_failure(frame.seq, FailureReason::Device(reason), outputs);
            }

            Command::GetInfo | Command::Save => {
                self.resolve_success(frame.seq, outputs);
            }

            Command::SetMap => {
                if self.resolve_success(frame.seq, outputs) && self.save_after_write {
                    self.save_after_write = false;
                    let chained = self.save();
                    outputs.push(SessionOutput::Transmit(chained));
                }
            }

            Command::Load => {
                if self.resolve_success(frame.seq, outputs) && self.fetch_after_load {
                    self.fetch_after_load = false;
                    let chained = self.get_map();
                    outputs.push(SessionOutput::Transmit(chained));
                }
            }

            Command::ResetDefault => {
                if self.resolve_success(frame.seq, outputs) && self.fetch_after_reset {
                    self.fetch_after_reset = false;
                    let chained = self.get_map();
                    outputs.push(SessionOutput::Transmit(chained));
                }
            }

            Command::GetMap => {
                if !self.pending.contains_key(&frame.seq) {
                    debug!(seq = frame.seq, "map response for resolved sequence, dropping");
                    return;
                }
                match codec::decode_config(&frame.payload, &self.default) {
                    Ok(config) => {
                        self.config = config;
                        self.resolve_success(frame.seq, outputs);
                        outputs.push(SessionOutput::Event(SessionEvent::MapReplaced));
                    }
                    Err(err) => {
                        warn!(%err, "map payload failed to decode");
                        self.resolve_failure(frame.seq, FailureReason::Decode, outputs);
                    }
                }
            }
        }
    }

    /// Resolve a pending request as succeeded. Returns false (and drops the
    /// response) when no request with this seq is in flight.
    fn resolve_success(&mut self, seq: u8, outputs: &mut Vec<SessionOutput>) -> bool {
        match self.pending.remove(&seq) {
            Some(pending) => {
                outputs.push(SessionOutput::Event(SessionEvent::Succeeded {
                    command: pending.command,
                }));
                true
            }
            None => {
                debug!(seq, "response for unknown sequence, dropping");
                false
            }
        }
    }

    /// Resolve a pending request as failed; silent when nothing matches
    fn resolve_failure(
        &mut self,
        seq: u8,
        reason: FailureReason,
        outputs: &mut Vec<SessionOutput>,
    ) -> bool {
        match self.pending.remove(&seq) {
            Some(pending) => {
                outputs.push(SessionOutput::Event(SessionEvent::Failed {
                    command: pending.command,
                    reason,
                }));
                true
            }
            None => false,
        }
    }

    /// Advance session time: fire expired request timeouts and emit the
    /// periodic heartbeat ping when due.
    pub fn tick(&mut self) -> Vec<SessionOutput> {
        let now = self.clock.now();
        let mut outputs = Vec::new();

        let mut expired: Vec<u8> = self
            .pending
            .iter()
            .filter(|(_, pending)| now >= pending.deadline)
            .map(|(&seq, _)| seq)
            .collect();
        expired.sort_unstable();
        for seq in expired {
            if let Some(pending) = self.pending.remove(&seq) {
                warn!(seq, command = pending.command.name(), "request timed out");
                outputs.push(SessionOutput::Event(SessionEvent::Failed {
                    command: pending.command,
                    reason: FailureReason::Timeout,
                }));
            }
        }

        if now.duration_since(self.last_heartbeat)
            >= Duration::from_millis(HEARTBEAT_INTERVAL_MS)
        {
            self.last_heartbeat = now;
            let ping = self.ping();
            outputs.push(SessionOutput::Transmit(ping));
        }
        outputs
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_numbers_increment_and_wrap() {
        let mut session = Session::new();
        session.seq = 254;
        let wire = session.get_info();
        let raw = cobs::decode(&wire[..wire.len() - 1]).unwrap();
        assert_eq!(Frame::from_raw(&raw).unwrap().seq, 254);
        assert_eq!(Frame::from_raw(&decode_wire(&session.save())).unwrap().seq, 255);
        assert_eq!(Frame::from_raw(&decode_wire(&session.save())).unwrap().seq, 0);
        assert_eq!(Frame::from_raw(&decode_wire(&session.save())).unwrap().seq, 1);
    }

    #[test]
    fn test_ping_is_silent() {
        let mut session = Session::new();
        session.ping();
        assert_eq!(session.pending_count(), 0);
        session.get_info();
        assert_eq!(session.pending_count(), 1);
    }

    fn decode_wire(wire: &[u8]) -> Vec<u8> {
        cobs::decode(&wire[..wire.len() - 1]).unwrap()
    }
}
