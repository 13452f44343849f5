//! Frame encoding/decoding
//!
//! A raw frame is `[0xA5 sync][ver][type][seq][len:u16 LE][payload]
//! [crc16 LE]`. The CRC covers version through payload, not the sync byte.
//! On the wire the raw frame is COBS-encoded and terminated with 0x00.

use byteorder::{ByteOrder, LittleEndian};

use super::{cobs, crc::crc16, ProtocolError, HEADER_LEN, MIN_FRAME_LEN, PROTOCOL_VERSION, SYNC_BYTE};

/// One protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Header version (fixed at [`PROTOCOL_VERSION`])
    pub version: u8,
    /// Command byte
    pub frame_type: u8,
    /// Sequence number linking requests to responses
    pub seq: u8,
    /// Frame payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame with the current protocol version
    pub fn new(frame_type: u8, seq: u8, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            frame_type,
            seq,
            payload,
        }
    }

    /// Encode to wire form: raw frame, COBS-encoded, 0x00 terminator
    pub fn to_wire(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(MIN_FRAME_LEN + self.payload.len());
        raw.push(SYNC_BYTE);
        raw.push(self.version);
        raw.push(self.frame_type);
        raw.push(self.seq);
        let mut len = [0u8; 2];
        LittleEndian::write_u16(&mut len, self.payload.len() as u16);
        raw.extend_from_slice(&len);
        raw.extend_from_slice(&self.payload);

        let crc = crc16(&raw[1..]);
        let mut tail = [0u8; 2];
        LittleEndian::write_u16(&mut tail, crc);
        raw.extend_from_slice(&tail);

        let mut framed = cobs::encode(&raw);
        framed.push(0x00);
        framed
    }

    /// Parse a COBS-decoded raw frame.
    ///
    /// Validates minimum size, the sync byte, the declared payload length,
    /// and the trailing CRC.
    pub fn from_raw(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::FrameTooShort(raw.len()));
        }
        if raw[0] != SYNC_BYTE {
            return Err(ProtocolError::BadSync(raw[0]));
        }

        let declared = LittleEndian::read_u16(&raw[4..6]) as usize;
        let body_end = 1 + HEADER_LEN + declared;
        if raw.len() < body_end + 2 {
            return Err(ProtocolError::LengthMismatch {
                declared,
                frame_len: raw.len(),
            });
        }

        let expected = crc16(&raw[1..body_end]);
        let actual = LittleEndian::read_u16(&raw[body_end..body_end + 2]);
        if expected != actual {
            return Err(ProtocolError::CrcMismatch { expected, actual });
        }

        Ok(Self {
            version: raw[1],
            frame_type: raw[2],
            seq: raw[3],
            payload: raw[6..body_end].to_vec(),
        })
    }
}

/// Split an incoming chunk into complete COBS-encoded frames.
///
/// Bytes accumulate in `buffer` until a 0x00 terminator; anything after the
/// last terminator stays in `buffer` for the next chunk, so frames survive
/// arbitrary chunking by the transport. Empty frames (back-to-back zeros)
/// are skipped.
pub fn extract_frames(buffer: &mut Vec<u8>, chunk: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    for &byte in chunk {
        if byte == 0x00 {
            if !buffer.is_empty() {
                frames.push(std::mem::take(buffer));
            }
        } else {
            buffer.push(byte);
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(0x10, 7, vec![1, 2, 3, 0, 5]);
        let wire = frame.to_wire();
        assert_eq!(*wire.last().unwrap(), 0x00);
        // No stray terminator inside the encoded body
        assert!(!wire[..wire.len() - 1].contains(&0));

        let raw = cobs::decode(&wire[..wire.len() - 1]).unwrap();
        let parsed = Frame::from_raw(&raw).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let frame = Frame::new(0x01, 255, Vec::new());
        let raw = cobs::decode(&frame.to_wire()[..frame.to_wire().len() - 1]).unwrap();
        assert_eq!(Frame::from_raw(&raw).unwrap(), frame);
    }

    #[test]
    fn test_corrupted_byte_fails_crc() {
        let frame = Frame::new(0x11, 3, vec![0x40; 16]);
        let wire = frame.to_wire();
        let mut raw = cobs::decode(&wire[..wire.len() - 1]).unwrap();
        raw[8] ^= 0x01;
        assert!(matches!(
            Frame::from_raw(&raw),
            Err(ProtocolError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(matches!(
            Frame::from_raw(&[SYNC_BYTE, 1, 2]),
            Err(ProtocolError::FrameTooShort(3))
        ));
    }

    #[test]
    fn test_bad_sync_rejected() {
        let frame = Frame::new(0x12, 1, Vec::new());
        let wire = frame.to_wire();
        let mut raw = cobs::decode(&wire[..wire.len() - 1]).unwrap();
        raw[0] = 0x5A;
        assert!(matches!(
            Frame::from_raw(&raw),
            Err(ProtocolError::BadSync(0x5A))
        ));
    }

    #[test]
    fn test_declared_length_beyond_frame_rejected() {
        // Header claims 200 payload bytes that never arrive
        let mut raw = vec![SYNC_BYTE, 1, 0x10, 1, 200, 0];
        raw.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            Frame::from_raw(&raw),
            Err(ProtocolError::LengthMismatch { declared: 200, .. })
        ));
    }

    #[test]
    fn test_extract_frames_across_chunks() {
        let mut buffer = Vec::new();
        assert!(extract_frames(&mut buffer, &[0x11, 0x22]).is_empty());
        let frames = extract_frames(&mut buffer, &[0x33, 0x00, 0x44]);
        assert_eq!(frames, vec![vec![0x11, 0x22, 0x33]]);
        assert_eq!(buffer, vec![0x44]);

        let frames = extract_frames(&mut buffer, &[0x00, 0x00, 0x55, 0x00]);
        assert_eq!(frames, vec![vec![0x44], vec![0x55]]);
        assert!(buffer.is_empty());
    }
}
