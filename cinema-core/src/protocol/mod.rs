//! Wire protocol for Dolby cinema processors
//!
//! Both families use CRLF-terminated text lines over a single TCP connection.
//!
//! | Direction | Classic (CP650) | Modern (CP750/CP850/CP950) |
//! |-----------|-----------------|----------------------------|
//! | Fader     | `fader_level=85` | `[cp750.]sys.fader 85` |
//! | Mute      | `mute=1` / `mute=0` / `mute=2` (toggle) | `[cp750.]sys.mute 1` / `0` |
//! | Format    | `format_button=3` | n/a |
//! | Macro     | n/a | `[cp750.]sys.macro_preset 3`, `[cp750.]sys.macro_name <text>` |
//! | Poll      | `all=?` | `sys.fader ?`, `sys.mute ?`, ... |
//!
//! - [`command`] builds outgoing command strings
//! - [`report`] parses incoming status lines into a [`report::StateDelta`]

use serde::{Deserialize, Serialize};

pub mod command;
pub mod report;

/// Lowest fader level in native units (0.0 on the display)
pub const FADER_MIN: u8 = 0;

/// Highest fader level in native units (10.0 on the display)
pub const FADER_MAX: u8 = 100;

/// Assumed fader level until the processor reports one (8.5 on the display)
pub const DEFAULT_FADER_LEVEL: u8 = 85;

/// Macro presets are numbered 1..=8
pub const MACRO_PRESET_MIN: u8 = 1;
pub const MACRO_PRESET_MAX: u8 = 8;

/// Line terminator appended to every outgoing command
pub const LINE_TERMINATOR: &str = "\r\n";

// =============================================================================
// Key names
// =============================================================================

pub(crate) const KEY_FADER_LEVEL: &str = "fader_level";
pub(crate) const KEY_MUTE: &str = "mute";
pub(crate) const KEY_FORMAT_BUTTON: &str = "format_button";
pub(crate) const KEY_ALL: &str = "all";
pub(crate) const KEY_SYS_FADER: &str = "sys.fader";
pub(crate) const KEY_SYS_MUTE: &str = "sys.mute";
pub(crate) const KEY_SYS_MACRO_PRESET: &str = "sys.macro_preset";
pub(crate) const KEY_SYS_MACRO_NAME: &str = "sys.macro_name";

// =============================================================================
// Fader direction
// =============================================================================

/// Direction of a single fader step or a ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Increase => "increase",
            Direction::Decrease => "decrease",
        }
    }

    fn delta(&self) -> i16 {
        match self {
            Direction::Increase => 1,
            Direction::Decrease => -1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Next fader level one step in `direction`, or `None` when it would leave
/// `FADER_MIN..=FADER_MAX`.
pub fn step_fader_level(direction: Direction, current: u8) -> Option<u8> {
    let next = current as i16 + direction.delta();
    if next < FADER_MIN as i16 || next > FADER_MAX as i16 {
        None
    } else {
        Some(next as u8)
    }
}

/// Convert a display level (0.0-10.0) to native units, clamped to the fader range
pub fn level_to_native(level: f64) -> u8 {
    if !level.is_finite() {
        return FADER_MIN;
    }
    (level * 10.0)
        .round()
        .clamp(FADER_MIN as f64, FADER_MAX as f64) as u8
}

/// Display string for a native fader level: one decimal, `18` -> `"1.8"`
pub fn native_to_display(native: u8) -> String {
    format!("{:.1}", native as f64 / 10.0)
}

// =============================================================================
// Format buttons (CP650)
// =============================================================================

/// Format selection buttons of the CP650
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FormatButton {
    Format01,
    Format04,
    Format05,
    Format10,
    Format11,
    UserFormat1,
    UserFormat2,
    Nonsync,
}

/// Format button table: wire id -> button
pub const FORMAT_BUTTONS: [FormatButton; 8] = [
    FormatButton::Format01,
    FormatButton::Format04,
    FormatButton::Format05,
    FormatButton::Format10,
    FormatButton::Format11,
    FormatButton::UserFormat1,
    FormatButton::UserFormat2,
    FormatButton::Nonsync,
];

impl FormatButton {
    /// Wire id (0-7)
    pub fn id(&self) -> u8 {
        FORMAT_BUTTONS
            .iter()
            .position(|b| b == self)
            .unwrap_or_default() as u8
    }

    pub fn from_id(id: u8) -> Option<FormatButton> {
        FORMAT_BUTTONS.get(id as usize).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormatButton::Format01 => "Format 01",
            FormatButton::Format04 => "Format 04",
            FormatButton::Format05 => "Format 05",
            FormatButton::Format10 => "Format 10",
            FormatButton::Format11 => "Format 11",
            FormatButton::UserFormat1 => "User format 1",
            FormatButton::UserFormat2 => "User format 2",
            FormatButton::Nonsync => "Nonsync format",
        }
    }
}

impl TryFrom<u8> for FormatButton {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        FormatButton::from_id(id).ok_or_else(|| format!("Unknown format button id: {}", id))
    }
}

impl From<FormatButton> for u8 {
    fn from(button: FormatButton) -> u8 {
        button.id()
    }
}

impl std::fmt::Display for FormatButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
