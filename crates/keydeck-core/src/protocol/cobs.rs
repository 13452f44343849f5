//! COBS framing codec
//!
//! Consistent Overhead Byte Stuffing: the encoded stream never contains
//! 0x00, so the byte 0x00 becomes an unambiguous frame delimiter that
//! resynchronizes reliably even after the transport drops or duplicates
//! bytes. Worst-case overhead is one byte per 254 input bytes.

use super::ProtocolError;

/// Encode a byte sequence into zero-free COBS form.
///
/// Each run of non-zero bytes is preceded by a code byte holding the run
/// length + 1; runs are capped at 254 bytes (code 0xFF), after which the
/// next code byte follows immediately without an implied zero.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 254 + 1);
    let mut code_index = 0;
    let mut code: u8 = 1;
    out.push(0);

    for &byte in data {
        if byte == 0 {
            out[code_index] = code;
            code = 1;
            code_index = out.len();
            out.push(0);
        } else {
            out.push(byte);
            code += 1;
            if code == 0xFF {
                out[code_index] = code;
                code = 1;
                code_index = out.len();
                out.push(0);
            }
        }
    }

    out[code_index] = code;
    out
}

/// Decode a COBS-encoded byte sequence.
///
/// Fails on a zero code byte (never valid inside a frame) or when a code
/// byte promises more data than remains (truncated frame). A failed decode
/// affects only this frame.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let code = data[i] as usize;
        i += 1;
        if code == 0 {
            return Err(ProtocolError::Framing("zero code byte"));
        }
        if i + code - 1 > data.len() {
            return Err(ProtocolError::Framing("truncated run"));
        }
        out.extend_from_slice(&data[i..i + code - 1]);
        i += code - 1;
        if code != 0xFF && i < data.len() {
            out.push(0);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let encoded = encode(data);
        assert!(!encoded.contains(&0), "encoded stream must be zero-free");
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_empty() {
        roundtrip(&[]);
    }

    #[test]
    fn test_roundtrip_simple() {
        roundtrip(&[0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_roundtrip_with_zeros() {
        roundtrip(&[0x00]);
        roundtrip(&[0x00, 0x00, 0x00]);
        roundtrip(&[0x11, 0x00, 0x22, 0x00]);
        roundtrip(&[0x00, 0x11]);
    }

    #[test]
    fn test_roundtrip_long_runs() {
        // Runs at and around the 254-byte cap where code 0xFF kicks in
        for len in [253usize, 254, 255, 508, 600] {
            let data: Vec<u8> = (0..len).map(|i| (i % 255) as u8 + 1).collect();
            roundtrip(&data);
        }
    }

    #[test]
    fn test_known_encoding() {
        assert_eq!(encode(&[0x00]), vec![0x01, 0x01]);
        assert_eq!(encode(&[0x11, 0x00]), vec![0x02, 0x11, 0x01]);
        assert_eq!(encode(&[0x11, 0x22]), vec![0x03, 0x11, 0x22]);
    }

    #[test]
    fn test_decode_rejects_zero_code() {
        assert!(decode(&[0x00]).is_err());
        assert!(decode(&[0x02, 0x11, 0x00]).is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_run() {
        // Code byte 0x05 promises four data bytes, only two remain
        assert!(decode(&[0x05, 0x11, 0x22]).is_err());
    }
}
