//! Processor command formatting
//!
//! Pure functions for building command strings. No I/O, and no line
//! terminator: the connection appends CRLF when writing.
//!
//! Commands that only one family understands return `None` for the other
//! family; the caller reports that as an unsupported action.

use super::{
    level_to_native, step_fader_level, Direction, FormatButton, KEY_ALL, KEY_FADER_LEVEL,
    KEY_FORMAT_BUTTON, KEY_MUTE, KEY_SYS_FADER, KEY_SYS_MACRO_NAME, KEY_SYS_MACRO_PRESET,
    KEY_SYS_MUTE,
};
use crate::model::{Model, ModelFamily};

/// Classic mute value that asks the processor to toggle its own state
pub const CLASSIC_MUTE_TOGGLE: u8 = 2;

/// Spacing between the individual Modern status queries after connect
pub const MODERN_POLL_SPACING_MS: u64 = 500;

/// A status query to send after connecting, `delay_ms` after the connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub command: String,
    pub delay_ms: u64,
}

/// Format a `key=value` (Classic) or `[prefix]key value` (Modern) command
///
/// # Example
/// ```
/// use cinema_core::model::Model;
/// use cinema_core::protocol::command::format_command;
///
/// assert_eq!(format_command(Model::Cp650, "fader_level", "sys.fader", "85"), "fader_level=85");
/// assert_eq!(format_command(Model::Cp750, "fader_level", "sys.fader", "85"), "cp750.sys.fader 85");
/// ```
pub fn format_command(model: Model, classic_key: &str, modern_key: &str, value: &str) -> String {
    match model.family() {
        ModelFamily::Classic => format!("{}={}", classic_key, value),
        ModelFamily::Modern => format!("{}{} {}", model.command_prefix(), modern_key, value),
    }
}

/// Format a fader command from a native level (0-100)
///
/// Returns `fader_level={n}` or `[cp750.]sys.fader {n}`.
pub fn format_fader_level_command(model: Model, native: u8) -> String {
    format_command(model, KEY_FADER_LEVEL, KEY_SYS_FADER, &native.to_string())
}

/// Format a fader command from a display level (0.0-10.0)
///
/// The level is scaled to native units (`round(level * 10)`) and clamped to 0-100.
pub fn format_set_fader_command(model: Model, level: f64) -> String {
    format_fader_level_command(model, level_to_native(level))
}

/// Format the command for one fader step from `current`
///
/// Returns `None` when the step would leave the fader range; a running ramp
/// treats that as its signal to stop.
pub fn format_step_fader_command(model: Model, direction: Direction, current: u8) -> Option<String> {
    step_fader_level(direction, current).map(|next| format_fader_level_command(model, next))
}

/// Format mute on/off
///
/// Returns `mute=1|0` or `[cp750.]sys.mute 1|0`.
pub fn format_mute_command(model: Model, on: bool) -> String {
    let value = if on { "1" } else { "0" };
    format_command(model, KEY_MUTE, KEY_SYS_MUTE, value)
}

/// Format a mute toggle
///
/// The CP650 has a toggle opcode (`mute=2`) and the processor resolves it
/// against its own state, so `muted` is ignored. Modern processors have no
/// toggle: the opposite of the last known state is sent, unmuting only when
/// the last report said muted.
pub fn format_mute_toggle_command(model: Model, muted: Option<bool>) -> String {
    match model.family() {
        ModelFamily::Classic => format!("{}={}", KEY_MUTE, CLASSIC_MUTE_TOGGLE),
        ModelFamily::Modern => format_mute_command(model, muted != Some(true)),
    }
}

/// Format a format button selection (CP650 only)
pub fn format_format_button_command(model: Model, button: FormatButton) -> Option<String> {
    match model.family() {
        ModelFamily::Classic => Some(format!("{}={}", KEY_FORMAT_BUTTON, button.id())),
        ModelFamily::Modern => None,
    }
}

/// Format a macro selection by preset number (Modern only)
///
/// The preset range (1-8) is validated by the caller.
pub fn format_macro_preset_command(model: Model, preset: u8) -> Option<String> {
    match model.family() {
        ModelFamily::Classic => None,
        ModelFamily::Modern => Some(format!(
            "{}{} {}",
            model.command_prefix(),
            KEY_SYS_MACRO_PRESET,
            preset
        )),
    }
}

/// Format a macro selection by name (Modern only)
pub fn format_macro_name_command(model: Model, name: &str) -> Option<String> {
    match model.family() {
        ModelFamily::Classic => None,
        ModelFamily::Modern => Some(format!(
            "{}{} {}",
            model.command_prefix(),
            KEY_SYS_MACRO_NAME,
            name.trim()
        )),
    }
}

/// Status queries to send after a connection is established
///
/// The CP650 reports everything in response to `all=?`. Modern processors get
/// one query per value, spaced [`MODERN_POLL_SPACING_MS`] apart.
pub fn poll_requests(model: Model) -> Vec<PollRequest> {
    match model.family() {
        ModelFamily::Classic => vec![PollRequest {
            command: format!("{}=?", KEY_ALL),
            delay_ms: 0,
        }],
        ModelFamily::Modern => [
            KEY_SYS_FADER,
            KEY_SYS_MUTE,
            KEY_SYS_MACRO_PRESET,
            KEY_SYS_MACRO_NAME,
        ]
        .iter()
        .enumerate()
        .map(|(i, key)| PollRequest {
            command: format!("{}{} ?", model.command_prefix(), key),
            delay_ms: i as u64 * MODERN_POLL_SPACING_MS,
        })
        .collect(),
    }
}
