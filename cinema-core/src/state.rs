//! Processor State Tracking
//!
//! The last known values reported by the processor. State is only changed by
//! applying a parsed [`StateDelta`] (or the controller's optimistic fader update
//! during a ramp), and every change is reported as a set of [`ChangedFields`]
//! so observers are notified once per line.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::protocol::report::StateDelta;
use crate::protocol::{native_to_display, FormatButton, DEFAULT_FADER_LEVEL};

bitflags! {
    /// Fields of [`DeviceState`] touched by an update
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangedFields: u8 {
        const FADER_LEVEL = 0b0000_0001;
        const MUTE = 0b0000_0010;
        const MACRO_PRESET = 0b0000_0100;
        const MACRO_NAME = 0b0000_1000;
        const FORMAT_BUTTON = 0b0001_0000;
    }
}

impl Default for ChangedFields {
    fn default() -> Self {
        ChangedFields::empty()
    }
}

/// Boolean feedback signals derived from the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackId {
    /// True while the processor reports muted
    MuteStatus,
}

impl FeedbackId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackId::MuteStatus => "mute_status",
        }
    }
}

/// Last known processor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Fader level in native units (0-100)
    pub fader_level: u8,
    /// Unknown until the first mute report
    pub muted: Option<bool>,
    /// Modern only
    pub macro_preset: Option<String>,
    /// Modern only
    pub macro_name: Option<String>,
    /// CP650 only
    pub format_button: Option<FormatButton>,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            fader_level: DEFAULT_FADER_LEVEL,
            muted: None,
            macro_preset: None,
            macro_name: None,
            format_button: None,
        }
    }
}

impl DeviceState {
    pub fn new() -> Self {
        DeviceState::default()
    }

    /// Apply a parsed status line.
    ///
    /// Returns the fields whose value actually changed; repeating a value the
    /// state already holds reports nothing.
    pub fn apply_delta(&mut self, delta: StateDelta) -> ChangedFields {
        let mut changed = ChangedFields::empty();

        if let Some(level) = delta.fader_level {
            changed |= self.set_fader_level(level);
        }
        if let Some(muted) = delta.muted {
            if self.muted != Some(muted) {
                self.muted = Some(muted);
                changed |= ChangedFields::MUTE;
            }
        }
        if delta.macro_preset.is_some() && delta.macro_preset != self.macro_preset {
            self.macro_preset = delta.macro_preset;
            changed |= ChangedFields::MACRO_PRESET;
        }
        if delta.macro_name.is_some() && delta.macro_name != self.macro_name {
            self.macro_name = delta.macro_name;
            changed |= ChangedFields::MACRO_NAME;
        }
        if delta.format_button.is_some() && delta.format_button != self.format_button {
            self.format_button = delta.format_button;
            changed |= ChangedFields::FORMAT_BUTTON;
        }

        changed
    }

    /// Set the fader level directly (optimistic update after a step command)
    pub fn set_fader_level(&mut self, level: u8) -> ChangedFields {
        if self.fader_level == level {
            ChangedFields::empty()
        } else {
            self.fader_level = level;
            ChangedFields::FADER_LEVEL
        }
    }

    /// Current value of a feedback signal
    pub fn feedback(&self, id: FeedbackId) -> bool {
        match id {
            FeedbackId::MuteStatus => self.muted == Some(true),
        }
    }

    /// Display values for the host's variables
    pub fn to_variables(&self) -> Variables {
        Variables {
            fader_level: native_to_display(self.fader_level),
            mute_status: self
                .muted
                .map(|m| if m { "Muted" } else { "Unmuted" }.to_string()),
            format_button: self.format_button.map(|b| b.label().to_string()),
            macro_preset: self.macro_preset.clone(),
            macro_name: self.macro_name.clone(),
        }
    }
}

/// Display form of [`DeviceState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    /// One decimal, e.g. `"8.5"`
    pub fader_level: String,
    /// `"Muted"` / `"Unmuted"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_button: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_name: Option<String>,
}
