//! Sparse keymap diff codec
//!
//! Serializes a [`KeymapConfig`] as the set of cells that differ from the
//! factory defaults, so payload size tracks customization depth instead of
//! the full 50-cell grid.
//!
//! Wire layout (all multi-byte fields little-endian):
//! - 7-byte header: `[ver=3][rows=5][cols=5][layers=2][mode=0][count:u16]`
//! - per entry: `[layer][row][col][kind][mod][keys x6][macro_len]`,
//!   followed for macros by `[op][mod][keys x6][delay:u16]` per step
//! - trailing CRC16 over everything before it
//!
//! Decoding starts from a fresh clone of the default config and applies
//! exactly `count` entries; nothing is observable until the whole payload
//! parses cleanly.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use super::{
    Action, ActionKind, KeymapConfig, Layer, MacroOp, MacroStep, COLS, KEY_SLOTS, LAYERS,
    MAX_MACRO_STEPS, ROWS,
};
use crate::protocol::crc::crc16;

/// Config wire format version
pub const MAP_WIRE_VERSION: u8 = 3;

/// Header bytes before the first entry
const HEADER_LEN: usize = 7;
/// Fixed bytes per entry before any macro steps
const ENTRY_LEN: usize = 12;
/// Bytes per macro step
const STEP_LEN: usize = 10;

/// Errors from config encode/decode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload smaller than header + CRC
    #[error("config payload too short: {0} bytes")]
    TooShort(usize),

    /// Trailing CRC16 does not match the payload
    #[error("config CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// CRC computed over the received bytes
        expected: u16,
        /// CRC carried by the payload
        actual: u16,
    },

    /// Header constants differ from this device's fixed geometry
    #[error("config header mismatch: version {version}, {rows}x{cols}, {layers} layers")]
    HeaderMismatch {
        /// Received wire version
        version: u8,
        /// Received row count
        rows: u8,
        /// Received column count
        cols: u8,
        /// Received layer count
        layers: u8,
    },

    /// Payload ended mid-entry or mid-step
    #[error("config payload truncated at offset {0}")]
    Truncated(usize),

    /// Entry addressed a cell outside the grid
    #[error("entry addresses layer {layer}, cell ({row}, {col}): out of range")]
    BadIndex {
        /// Received layer index
        layer: u8,
        /// Received row
        row: u8,
        /// Received column
        col: u8,
    },

    /// Unknown action kind byte
    #[error("unknown action kind {0:#04x}")]
    BadKind(u8),

    /// Unknown macro op byte
    #[error("unknown macro op {0:#04x}")]
    BadOp(u8),

    /// Macro length above [`MAX_MACRO_STEPS`]
    #[error("macro length {0} exceeds the step limit")]
    MacroTooLong(u8),

    /// Non-macro entry carried a nonzero macro length
    #[error("non-macro entry with macro length {0}")]
    StrayMacroLength(u8),

    /// Bytes left over after the declared entry count
    #[error("{0} trailing bytes after the last entry")]
    TrailingData(usize),
}

/// Encode `config` as a sparse diff against `default`
pub fn encode_config(config: &KeymapConfig, default: &KeymapConfig) -> Vec<u8> {
    let mut out = vec![MAP_WIRE_VERSION, ROWS, COLS, LAYERS, 0, 0, 0];
    let mut count: u16 = 0;

    for layer in Layer::ALL {
        for row in 0..ROWS {
            for col in 0..COLS {
                let action = config.cell(layer, row, col);
                if action.wire_eq(default.cell(layer, row, col)) {
                    continue;
                }
                count += 1;
                out.push(layer.index());
                out.push(row);
                out.push(col);
                out.push(action.kind.wire_byte());
                out.push(action.modifiers);
                out.extend_from_slice(&action.keys);
                let steps = action.encoded_steps();
                out.push(steps.len() as u8);
                for step in steps {
                    out.push(step.op.wire_byte());
                    out.push(step.modifiers);
                    out.extend_from_slice(&step.keys);
                    let mut delay = [0u8; 2];
                    LittleEndian::write_u16(&mut delay, step.delay_ms);
                    out.extend_from_slice(&delay);
                }
            }
        }
    }

    LittleEndian::write_u16(&mut out[5..7], count);
    let crc = crc16(&out);
    let mut tail = [0u8; 2];
    LittleEndian::write_u16(&mut tail, crc);
    out.extend_from_slice(&tail);
    out
}

/// Decode a sparse diff into a full config based on `default`
pub fn decode_config(payload: &[u8], default: &KeymapConfig) -> Result<KeymapConfig, CodecError> {
    if payload.len() < HEADER_LEN + 2 {
        return Err(CodecError::TooShort(payload.len()));
    }

    let (data, crc_bytes) = payload.split_at(payload.len() - 2);
    let expected = crc16(data);
    let actual = LittleEndian::read_u16(crc_bytes);
    if expected != actual {
        return Err(CodecError::CrcMismatch { expected, actual });
    }

    let (version, rows, cols, layers) = (data[0], data[1], data[2], data[3]);
    if version != MAP_WIRE_VERSION || rows != ROWS || cols != COLS || layers != LAYERS {
        return Err(CodecError::HeaderMismatch {
            version,
            rows,
            cols,
            layers,
        });
    }
    // data[4] is the reserved mode byte, currently ignored
    let count = LittleEndian::read_u16(&data[5..7]);

    let mut config = default.clone();
    let mut off = HEADER_LEN;

    for _ in 0..count {
        if off + ENTRY_LEN > data.len() {
            return Err(CodecError::Truncated(off));
        }
        let (layer_idx, row, col) = (data[off], data[off + 1], data[off + 2]);
        let layer = match Layer::from_index(layer_idx) {
            Some(layer) if row < ROWS && col < COLS => layer,
            _ => {
                return Err(CodecError::BadIndex {
                    layer: layer_idx,
                    row,
                    col,
                })
            }
        };
        let kind = ActionKind::from_wire(data[off + 3]).ok_or(CodecError::BadKind(data[off + 3]))?;
        let modifiers = data[off + 4];
        let mut keys = [0u8; KEY_SLOTS];
        keys.copy_from_slice(&data[off + 5..off + 11]);
        let macro_len = data[off + 11];
        off += ENTRY_LEN;

        let mut macro_steps = Vec::new();
        if kind == ActionKind::Macro {
            if macro_len as usize > MAX_MACRO_STEPS {
                return Err(CodecError::MacroTooLong(macro_len));
            }
            macro_steps.reserve(macro_len as usize);
            for _ in 0..macro_len {
                if off + STEP_LEN > data.len() {
                    return Err(CodecError::Truncated(off));
                }
                let op = MacroOp::from_wire(data[off]).ok_or(CodecError::BadOp(data[off]))?;
                let mut step_keys = [0u8; KEY_SLOTS];
                step_keys.copy_from_slice(&data[off + 2..off + 8]);
                macro_steps.push(MacroStep {
                    op,
                    modifiers: data[off + 1],
                    keys: step_keys,
                    delay_ms: LittleEndian::read_u16(&data[off + 8..off + 10]),
                });
                off += STEP_LEN;
            }
        } else if macro_len != 0 {
            return Err(CodecError::StrayMacroLength(macro_len));
        }

        *config.cell_mut(layer, row, col) = Action {
            kind,
            modifiers,
            keys,
            macro_steps,
        };
    }

    if off != data.len() {
        return Err(CodecError::TrailingData(data.len() - off));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmodified_config_encodes_header_and_crc_only() {
        let default = KeymapConfig::default_map();
        let payload = encode_config(&default, &default);
        assert_eq!(payload.len(), HEADER_LEN + 2);
        assert_eq!(&payload[..5], &[MAP_WIRE_VERSION, ROWS, COLS, LAYERS, 0]);
        assert_eq!(LittleEndian::read_u16(&payload[5..7]), 0);
    }

    #[test]
    fn test_single_diff_entry_layout() {
        let default = KeymapConfig::default_map();
        let mut config = default.clone();
        config
            .set_action(Layer::Base, 1, 1, Action::normal(super::super::MOD_CTRL, 0x05))
            .unwrap();

        let payload = encode_config(&config, &default);
        assert_eq!(payload.len(), HEADER_LEN + ENTRY_LEN + 2);
        assert_eq!(LittleEndian::read_u16(&payload[5..7]), 1);
        // layer 0, row 1, col 1, Normal, Ctrl, keycode 0x05, no macro
        assert_eq!(&payload[7..12], &[0, 1, 1, 1, 0x01]);
        assert_eq!(&payload[12..18], &[0x05, 0, 0, 0, 0, 0]);
        assert_eq!(payload[18], 0);
    }

    #[test]
    fn test_crc_mismatch_rejected() {
        let default = KeymapConfig::default_map();
        let mut payload = encode_config(&default, &default);
        payload[0] ^= 0x10;
        assert!(matches!(
            decode_config(&payload, &default),
            Err(CodecError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_header_mismatch_rejected() {
        let default = KeymapConfig::default_map();
        let mut data = vec![MAP_WIRE_VERSION + 1, ROWS, COLS, LAYERS, 0, 0, 0];
        let crc = crc16(&data);
        data.push((crc & 0xFF) as u8);
        data.push((crc >> 8) as u8);
        assert!(matches!(
            decode_config(&data, &default),
            Err(CodecError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let default = KeymapConfig::default_map();
        // Header declares one entry but carries none
        let mut data = vec![MAP_WIRE_VERSION, ROWS, COLS, LAYERS, 0, 1, 0];
        let crc = crc16(&data);
        data.push((crc & 0xFF) as u8);
        data.push((crc >> 8) as u8);
        assert!(matches!(
            decode_config(&data, &default),
            Err(CodecError::Truncated(_))
        ));
    }

    #[test]
    fn test_stray_macro_length_rejected() {
        let default = KeymapConfig::default_map();
        let mut data = vec![MAP_WIRE_VERSION, ROWS, COLS, LAYERS, 0, 1, 0];
        // Normal action claiming one macro step
        data.extend_from_slice(&[0, 0, 0, 1, 0, 0x04, 0, 0, 0, 0, 0, 1]);
        let crc = crc16(&data);
        data.push((crc & 0xFF) as u8);
        data.push((crc >> 8) as u8);
        assert_eq!(
            decode_config(&data, &default),
            Err(CodecError::StrayMacroLength(1))
        );
    }

    #[test]
    fn test_bad_cell_index_rejected() {
        let default = KeymapConfig::default_map();
        let mut data = vec![MAP_WIRE_VERSION, ROWS, COLS, LAYERS, 0, 1, 0];
        data.extend_from_slice(&[0, ROWS, 0, 1, 0, 0x04, 0, 0, 0, 0, 0, 0]);
        let crc = crc16(&data);
        data.push((crc & 0xFF) as u8);
        data.push((crc >> 8) as u8);
        assert!(matches!(
            decode_config(&data, &default),
            Err(CodecError::BadIndex { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let default = KeymapConfig::default_map();
        let mut data = vec![MAP_WIRE_VERSION, ROWS, COLS, LAYERS, 0, 0, 0];
        data.push(0xAB);
        let crc = crc16(&data);
        data.push((crc & 0xFF) as u8);
        data.push((crc >> 8) as u8);
        assert_eq!(
            decode_config(&data, &default),
            Err(CodecError::TrailingData(1))
        );
    }
}
