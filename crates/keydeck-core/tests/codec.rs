//! Config codec integration tests: round-trip fidelity of the sparse diff
//! against the factory defaults.

use pretty_assertions::assert_eq;

use keydeck_core::keymap::{
    codec, Action, ActionKind, KeymapConfig, KeymapError, Layer, MacroStep, COLS, FN_COL, FN_ROW,
    MOD_ALT, MOD_CTRL, MOD_SHIFT, ROWS,
};

/// Compare two configs cell-by-cell using on-wire equality
fn assert_wire_identical(a: &KeymapConfig, b: &KeymapConfig) {
    for layer in Layer::ALL {
        for row in 0..ROWS {
            for col in 0..COLS {
                let left = a.action(layer, row, col).unwrap();
                let right = b.action(layer, row, col).unwrap();
                assert!(
                    left.wire_eq(right),
                    "cell mismatch at layer {layer:?} ({row}, {col}): {left:?} vs {right:?}"
                );
            }
        }
    }
}

#[test]
fn unmodified_config_roundtrips_as_empty_diff() {
    let default = KeymapConfig::default_map();
    let payload = codec::encode_config(&default, &default);

    // Header + CRC only, zero entries
    assert_eq!(payload.len(), 9);
    assert_eq!(u16::from_le_bytes([payload[5], payload[6]]), 0);

    let decoded = codec::decode_config(&payload, &default).unwrap();
    assert_wire_identical(&decoded, &default);
}

#[test]
fn customized_config_roundtrips() {
    let default = KeymapConfig::default_map();
    let mut config = default.clone();

    // Plain remap
    config
        .set_action(Layer::Base, 0, 0, Action::normal(0, 0x2C))
        .unwrap();
    // Chord with modifiers
    let mut chord = Action::normal(MOD_CTRL | MOD_SHIFT, 0x04);
    chord.kind = ActionKind::Chord;
    chord.keys[1] = 0x05;
    config.set_action(Layer::Base, 2, 3, chord).unwrap();
    // Clearing a default assignment is also a diff
    config.set_action(Layer::Fn, 0, 1, Action::none()).unwrap();
    // Macro with every op kind
    let steps = vec![
        MacroStep::key_down(0x04),
        MacroStep::delay(250),
        MacroStep::key_up(0x04),
        MacroStep {
            modifiers: MOD_ALT,
            ..MacroStep::key_down(0x2B)
        },
    ];
    config
        .set_action(Layer::Fn, 3, 3, Action::macro_action(steps))
        .unwrap();

    let payload = codec::encode_config(&config, &default);
    assert_eq!(u16::from_le_bytes([payload[5], payload[6]]), 4);

    let decoded = codec::decode_config(&payload, &default).unwrap();
    assert_wire_identical(&decoded, &config);
}

#[test]
fn macro_at_step_cap_roundtrips() {
    let default = KeymapConfig::default_map();
    let mut config = default.clone();

    let steps: Vec<MacroStep> = (0..16u16).map(|i| MacroStep::delay(i * 10)).collect();
    config
        .set_action(Layer::Base, 1, 2, Action::macro_action(steps))
        .unwrap();

    let payload = codec::encode_config(&config, &default);
    let decoded = codec::decode_config(&payload, &default).unwrap();
    assert_eq!(
        decoded
            .action(Layer::Base, 1, 2)
            .unwrap()
            .macro_steps
            .len(),
        16
    );
    assert_wire_identical(&decoded, &config);
}

#[test]
fn oversized_macro_is_capped_on_encode() {
    let default = KeymapConfig::default_map();
    let mut config = default.clone();

    // macro_action truncates, but a directly constructed action may carry
    // more steps in memory; only 16 ever reach the wire.
    let mut action = Action::macro_action(Vec::new());
    action.macro_steps = (0..20u16).map(MacroStep::delay).collect();
    config.set_action(Layer::Base, 1, 4, action).unwrap();

    let payload = codec::encode_config(&config, &default);
    let decoded = codec::decode_config(&payload, &default).unwrap();
    assert_eq!(
        decoded
            .action(Layer::Base, 1, 4)
            .unwrap()
            .macro_steps
            .len(),
        16
    );
}

#[test]
fn fn_key_never_appears_in_a_diff() {
    let default = KeymapConfig::default_map();
    let mut config = default.clone();

    // Edits at the reserved position are rejected on both layers
    assert_eq!(
        config.set_action(Layer::Base, FN_ROW, FN_COL, Action::normal(0, 0x04)),
        Err(KeymapError::ReservedKey {
            row: FN_ROW,
            col: FN_COL
        })
    );
    assert!(config
        .set_action(Layer::Fn, FN_ROW, FN_COL, Action::normal(0, 0x04))
        .is_err());

    // With no other edits, the diff stays empty
    let payload = codec::encode_config(&config, &default);
    assert_eq!(u16::from_le_bytes([payload[5], payload[6]]), 0);
}

#[test]
fn decode_failure_is_all_or_nothing() {
    let default = KeymapConfig::default_map();
    let mut config = default.clone();
    config
        .set_action(Layer::Base, 0, 0, Action::normal(0, 0x2C))
        .unwrap();
    config
        .set_action(Layer::Base, 0, 1, Action::normal(0, 0x2D))
        .unwrap();

    // Cut the payload mid-entry: decode must fail outright rather than
    // return a half-applied diff
    let payload = codec::encode_config(&config, &default);
    let truncated = &payload[..payload.len() - 14];
    assert!(codec::decode_config(truncated, &default).is_err());
}
