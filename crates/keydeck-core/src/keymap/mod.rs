//! Keymap data model
//!
//! A keypad mapping is two fixed 5x5 layers of [`Action`]s. One cell,
//! (row 4, col 2), is the physical Fn key that switches layers; it can never
//! be remapped and is rejected at the edit boundary.
//!
//! Each layer is stored as a flat row-major array with a pure
//! (row, col) -> index mapping, so cloning a config never shares cells.

pub mod codec;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grid rows
pub const ROWS: u8 = 5;
/// Grid columns
pub const COLS: u8 = 5;
/// Number of layers (base + fn)
pub const LAYERS: u8 = 2;
/// Simultaneous keycode slots per action
pub const KEY_SLOTS: usize = 6;
/// Maximum steps in a macro
pub const MAX_MACRO_STEPS: usize = 16;

/// Row of the reserved Fn key
pub const FN_ROW: u8 = 4;
/// Column of the reserved Fn key
pub const FN_COL: u8 = 2;

/// Modifier mask bit: left Ctrl
pub const MOD_CTRL: u8 = 0x01;
/// Modifier mask bit: left Shift
pub const MOD_SHIFT: u8 = 0x02;
/// Modifier mask bit: left Alt
pub const MOD_ALT: u8 = 0x04;
/// Modifier mask bit: left Win/GUI
pub const MOD_WIN: u8 = 0x08;

/// Errors from keymap edits
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapError {
    /// The physical Fn key cannot be reassigned
    #[error("the Fn key at ({row}, {col}) cannot be remapped")]
    ReservedKey {
        /// Row of the rejected edit
        row: u8,
        /// Column of the rejected edit
        col: u8,
    },

    /// Cell address outside the 5x5 grid
    #[error("cell ({row}, {col}) is outside the grid")]
    OutOfRange {
        /// Row of the rejected edit
        row: u8,
        /// Column of the rejected edit
        col: u8,
    },
}

/// What a key does when pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Key is unassigned
    None,
    /// Single key (with optional modifiers)
    Normal,
    /// Modifier + key combination sent as one report
    Chord,
    /// Scripted sequence of key events and delays
    Macro,
}

impl ActionKind {
    /// On-wire byte for this kind
    pub fn wire_byte(self) -> u8 {
        match self {
            ActionKind::None => 0,
            ActionKind::Normal => 1,
            ActionKind::Chord => 2,
            ActionKind::Macro => 3,
        }
    }

    /// Parse an on-wire kind byte
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ActionKind::None),
            1 => Some(ActionKind::Normal),
            2 => Some(ActionKind::Chord),
            3 => Some(ActionKind::Macro),
            _ => None,
        }
    }
}

/// One operation inside a macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroOp {
    /// Press the step's keys
    KeyDown,
    /// Release the step's keys
    KeyUp,
    /// Pause for `delay_ms`
    Delay,
}

impl MacroOp {
    /// On-wire byte for this op
    pub fn wire_byte(self) -> u8 {
        match self {
            MacroOp::KeyDown => 0,
            MacroOp::KeyUp => 1,
            MacroOp::Delay => 2,
        }
    }

    /// Parse an on-wire op byte
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MacroOp::KeyDown),
            1 => Some(MacroOp::KeyUp),
            2 => Some(MacroOp::Delay),
            _ => None,
        }
    }
}

/// One step of a macro sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroStep {
    /// Operation performed by this step
    pub op: MacroOp,
    /// Modifier mask held for this step
    pub modifiers: u8,
    /// Keycodes affected by this step (0 = unused slot)
    pub keys: [u8; KEY_SLOTS],
    /// Delay in milliseconds; meaningful when `op` is [`MacroOp::Delay`],
    /// encoded as-is otherwise
    pub delay_ms: u16,
}

impl MacroStep {
    /// A key-down step for a single keycode
    pub fn key_down(keycode: u8) -> Self {
        let mut keys = [0u8; KEY_SLOTS];
        keys[0] = keycode;
        Self {
            op: MacroOp::KeyDown,
            modifiers: 0,
            keys,
            delay_ms: 0,
        }
    }

    /// A key-up step for a single keycode
    pub fn key_up(keycode: u8) -> Self {
        let mut step = Self::key_down(keycode);
        step.op = MacroOp::KeyUp;
        step
    }

    /// A delay step
    pub fn delay(delay_ms: u16) -> Self {
        Self {
            op: MacroOp::Delay,
            modifiers: 0,
            keys: [0u8; KEY_SLOTS],
            delay_ms,
        }
    }
}

/// Behavior of one key on one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// What kind of action this is
    pub kind: ActionKind,
    /// Modifier mask (`MOD_*` bits)
    pub modifiers: u8,
    /// Up to six simultaneous keycodes (0 = unused slot)
    pub keys: [u8; KEY_SLOTS],
    /// Macro steps; only encoded when `kind` is [`ActionKind::Macro`]
    pub macro_steps: Vec<MacroStep>,
}

impl Action {
    /// An unassigned key
    pub fn none() -> Self {
        Self {
            kind: ActionKind::None,
            modifiers: 0,
            keys: [0u8; KEY_SLOTS],
            macro_steps: Vec::new(),
        }
    }

    /// A plain key press with optional modifiers
    pub fn normal(modifiers: u8, keycode: u8) -> Self {
        let mut action = Self::none();
        action.kind = ActionKind::Normal;
        action.modifiers = modifiers;
        action.keys[0] = keycode;
        action
    }

    /// A macro action, capped at [`MAX_MACRO_STEPS`] steps
    pub fn macro_action(steps: Vec<MacroStep>) -> Self {
        let mut action = Self::none();
        action.kind = ActionKind::Macro;
        action.macro_steps = steps;
        action.macro_steps.truncate(MAX_MACRO_STEPS);
        action
    }

    /// The steps that go on the wire: capped for macros, empty otherwise
    pub fn encoded_steps(&self) -> &[MacroStep] {
        if self.kind == ActionKind::Macro {
            let len = self.macro_steps.len().min(MAX_MACRO_STEPS);
            &self.macro_steps[..len]
        } else {
            &[]
        }
    }

    /// On-wire equality against another action.
    ///
    /// Kind, modifier mask, and all six keycode slots must match. Macro
    /// steps are compared only when both sides are macros; any kind
    /// difference is a hard diff.
    pub fn wire_eq(&self, other: &Action) -> bool {
        if self.kind != other.kind || self.modifiers != other.modifiers || self.keys != other.keys
        {
            return false;
        }
        if self.kind != ActionKind::Macro {
            return true;
        }
        self.encoded_steps() == other.encoded_steps()
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::none()
    }
}

/// Keymap layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    /// Default layer
    Base,
    /// Layer active while the Fn key is held
    Fn,
}

impl Layer {
    /// Both layers in wire order
    pub const ALL: [Layer; 2] = [Layer::Base, Layer::Fn];

    /// On-wire layer index
    pub fn index(self) -> u8 {
        match self {
            Layer::Base => 0,
            Layer::Fn => 1,
        }
    }

    /// Parse an on-wire layer index
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Layer::Base),
            1 => Some(Layer::Fn),
            _ => None,
        }
    }
}

/// The full device mapping: two 5x5 layers of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeymapConfig {
    /// Flat row-major cells, one Vec of ROWS*COLS per layer
    layers: [Vec<Action>; 2],
}

/// (row, col) -> flat index
fn cell_index(row: u8, col: u8) -> usize {
    row as usize * COLS as usize + col as usize
}

impl KeymapConfig {
    /// A config with every key unassigned
    pub fn empty() -> Self {
        let cells = || vec![Action::none(); ROWS as usize * COLS as usize];
        Self {
            layers: [cells(), cells()],
        }
    }

    /// The factory default mapping.
    ///
    /// Base layer: Esc/1/2/3/4, Tab/Q/W/E/R, Caps/A/S/D/F, LShift/Z/X/C/V,
    /// LCtrl/LWin/Fn/LAlt/Space. Fn layer: Fn+1..4 give F1..F4.
    pub fn default_map() -> Self {
        let mut map = Self::empty();

        // HID usages 0xE0..=0xE7 are modifier keys and live in the mask,
        // not in a keycode slot.
        let mut assign = |layer: Layer, row: u8, col: u8, keycode: u8| {
            let action = if (0xE0..=0xE7).contains(&keycode) {
                Action {
                    kind: ActionKind::Normal,
                    modifiers: 1 << (keycode - 0xE0),
                    keys: [0u8; KEY_SLOTS],
                    macro_steps: Vec::new(),
                }
            } else {
                Action::normal(0, keycode)
            };
            *map.cell_mut(layer, row, col) = action;
        };

        assign(Layer::Base, 0, 0, 0x29); // Esc
        assign(Layer::Base, 0, 1, 0x1E); // 1
        assign(Layer::Base, 0, 2, 0x1F); // 2
        assign(Layer::Base, 0, 3, 0x20); // 3
        assign(Layer::Base, 0, 4, 0x21); // 4

        assign(Layer::Base, 1, 0, 0x2B); // Tab
        assign(Layer::Base, 1, 1, 0x14); // Q
        assign(Layer::Base, 1, 2, 0x1A); // W
        assign(Layer::Base, 1, 3, 0x08); // E
        assign(Layer::Base, 1, 4, 0x15); // R

        assign(Layer::Base, 2, 0, 0x39); // Caps
        assign(Layer::Base, 2, 1, 0x04); // A
        assign(Layer::Base, 2, 2, 0x16); // S
        assign(Layer::Base, 2, 3, 0x07); // D
        assign(Layer::Base, 2, 4, 0x09); // F

        assign(Layer::Base, 3, 0, 0xE1); // LShift
        assign(Layer::Base, 3, 1, 0x1D); // Z
        assign(Layer::Base, 3, 2, 0x1B); // X
        assign(Layer::Base, 3, 3, 0x06); // C
        assign(Layer::Base, 3, 4, 0x19); // V

        assign(Layer::Base, 4, 0, 0xE0); // LCtrl
        assign(Layer::Base, 4, 1, 0xE3); // LWin
        // (4, 2) is the Fn key, left unassigned
        assign(Layer::Base, 4, 3, 0xE2); // LAlt
        assign(Layer::Base, 4, 4, 0x2C); // Space

        assign(Layer::Fn, 0, 1, 0x3A); // F1
        assign(Layer::Fn, 0, 2, 0x3B); // F2
        assign(Layer::Fn, 0, 3, 0x3C); // F3
        assign(Layer::Fn, 0, 4, 0x3D); // F4

        map
    }

    /// Whether (row, col) is the reserved Fn key
    pub fn is_fn_key(row: u8, col: u8) -> bool {
        row == FN_ROW && col == FN_COL
    }

    /// Read the action at a cell
    pub fn action(&self, layer: Layer, row: u8, col: u8) -> Option<&Action> {
        if row >= ROWS || col >= COLS {
            return None;
        }
        Some(&self.layers[layer.index() as usize][cell_index(row, col)])
    }

    /// Replace the action at a cell.
    ///
    /// Rejects out-of-range addresses and the reserved Fn key.
    pub fn set_action(
        &mut self,
        layer: Layer,
        row: u8,
        col: u8,
        action: Action,
    ) -> Result<(), KeymapError> {
        if row >= ROWS || col >= COLS {
            return Err(KeymapError::OutOfRange { row, col });
        }
        if Self::is_fn_key(row, col) {
            return Err(KeymapError::ReservedKey { row, col });
        }
        *self.cell_mut(layer, row, col) = action;
        Ok(())
    }

    /// Direct cell access for the codec; callers must pass validated indices
    pub(crate) fn cell(&self, layer: Layer, row: u8, col: u8) -> &Action {
        &self.layers[layer.index() as usize][cell_index(row, col)]
    }

    /// Mutable counterpart of [`Self::cell`]
    pub(crate) fn cell_mut(&mut self, layer: Layer, row: u8, col: u8) -> &mut Action {
        &mut self.layers[layer.index() as usize][cell_index(row, col)]
    }
}
