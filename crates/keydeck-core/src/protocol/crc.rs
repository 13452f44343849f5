//! CRC16 checksum
//!
//! CCITT variant: polynomial 0x1021, initial value 0xFFFF, MSB-first, no
//! final XOR. The firmware uses the same parameterization for protocol
//! frames and for the standalone config payload, so this is the single
//! integrity primitive of the whole wire format.

/// Calculate the CRC16 of a byte slice
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_initial_value() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_known_vector() {
        // CRC16/CCITT-FALSE check value for the standard "123456789" vector
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_deterministic() {
        let data = [0xA5, 0x01, 0x10, 0x02, 0x00, 0x00];
        assert_eq!(crc16(&data), crc16(&data));
    }

    #[test]
    fn test_single_bit_flip_changes_crc() {
        let data = b"keydeck frame payload";
        let mut flipped = data.to_vec();
        flipped[4] ^= 0x01;
        assert_ne!(crc16(data), crc16(&flipped));
    }
}
