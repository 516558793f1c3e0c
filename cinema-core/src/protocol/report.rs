//! Status line parsing (pure)
//!
//! Turns one framed line from the processor into a [`StateDelta`]. The caller
//! applies the delta to its [`DeviceState`](crate::state::DeviceState) and
//! notifies once per line.

use super::{
    FormatButton, FADER_MAX, FADER_MIN, KEY_FADER_LEVEL, KEY_FORMAT_BUTTON, KEY_MUTE,
    KEY_SYS_FADER, KEY_SYS_MACRO_NAME, KEY_SYS_MACRO_PRESET, KEY_SYS_MUTE,
};
use crate::error::ParseError;
use crate::model::ModelFamily;

/// Prefix the CP750 may put in front of its status keys
const CP750_PREFIX: &str = "cp750.";

/// Partial update parsed from a single status line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub fader_level: Option<u8>,
    pub muted: Option<bool>,
    pub macro_preset: Option<String>,
    pub macro_name: Option<String>,
    pub format_button: Option<FormatButton>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self == &StateDelta::default()
    }
}

/// Parse one status line.
///
/// Unrecognized keys produce an empty delta. A recognized key with a missing,
/// malformed or out-of-range value is an error and nothing from the line
/// should be applied.
///
/// # Example
/// ```
/// use cinema_core::model::ModelFamily;
/// use cinema_core::protocol::report::parse_line;
///
/// let delta = parse_line(ModelFamily::Classic, "fader_level=18\r\n").unwrap();
/// assert_eq!(delta.fader_level, Some(18));
/// ```
pub fn parse_line(family: ModelFamily, line: &str) -> Result<StateDelta, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (key, value) = match line.split_once(family.separator()) {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line.trim(), ""),
    };

    let mut delta = StateDelta::default();
    match family {
        ModelFamily::Classic => match key {
            KEY_FADER_LEVEL => delta.fader_level = Some(parse_fader(key, value)?),
            KEY_MUTE => delta.muted = Some(parse_mute(key, value)?),
            KEY_FORMAT_BUTTON => delta.format_button = Some(parse_format(key, value)?),
            _ => {}
        },
        ModelFamily::Modern => {
            let key = key.strip_prefix(CP750_PREFIX).unwrap_or(key);
            match key {
                KEY_SYS_FADER => delta.fader_level = Some(parse_fader(key, value)?),
                KEY_SYS_MUTE => delta.muted = Some(parse_mute(key, value)?),
                KEY_SYS_MACRO_PRESET => {
                    delta.macro_preset = Some(require(key, value)?.to_string())
                }
                KEY_SYS_MACRO_NAME => delta.macro_name = Some(require(key, value)?.to_string()),
                _ => {}
            }
        }
    }
    Ok(delta)
}

fn require<'a>(key: &str, value: &'a str) -> Result<&'a str, ParseError> {
    if value.is_empty() {
        Err(ParseError::MissingValue {
            key: key.to_string(),
        })
    } else {
        Ok(value)
    }
}

fn parse_fader(key: &str, value: &str) -> Result<u8, ParseError> {
    let value = require(key, value)?;
    let n: i64 = value.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })?;
    if n < FADER_MIN as i64 || n > FADER_MAX as i64 {
        return Err(ParseError::OutOfRange {
            key: key.to_string(),
            value: n,
            min: FADER_MIN as i64,
            max: FADER_MAX as i64,
        });
    }
    Ok(n as u8)
}

/// `"0"` is unmuted, any other value muted
fn parse_mute(key: &str, value: &str) -> Result<bool, ParseError> {
    Ok(require(key, value)? != "0")
}

fn parse_format(key: &str, value: &str) -> Result<FormatButton, ParseError> {
    let value = require(key, value)?;
    value
        .parse::<u8>()
        .ok()
        .and_then(FormatButton::from_id)
        .ok_or_else(|| ParseError::UnknownFormat(value.to_string()))
}
