//! Host actions
//!
//! The actions a control surface can invoke, their wire ids and which model
//! family offers them. An [`Action`] deserializes from the host's JSON form,
//! e.g. `{"action": "fader_increase_timer", "rate": 250}`.

use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::model::{Model, ModelFamily};
use crate::protocol::{Direction, FormatButton, MACRO_PRESET_MAX, MACRO_PRESET_MIN};
use crate::ramp::{DEFAULT_RAMP_INTERVAL_MS, MAX_RAMP_INTERVAL_MS};

fn default_rate() -> u64 {
    DEFAULT_RAMP_INTERVAL_MS
}

/// A single action invocation from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    FaderIncreaseOnce,
    FaderIncreaseTimer {
        /// Milliseconds between steps
        #[serde(default = "default_rate")]
        rate: u64,
    },
    FaderIncreaseStop,
    FaderDecreaseOnce,
    FaderDecreaseTimer {
        #[serde(default = "default_rate")]
        rate: u64,
    },
    FaderDecreaseStop,
    /// Absolute level, 0.0-10.0
    FaderSetlevel {
        level: f64,
    },
    SetFormatButton {
        format: FormatButton,
    },
    SetMacroPreset {
        #[serde(rename = "macro")]
        preset: u8,
    },
    SetMacroName {
        #[serde(rename = "macro")]
        name: String,
    },
    MuteOn,
    MuteOff,
    MuteToggle,
}

impl Action {
    /// Wire id of the action
    pub fn name(&self) -> &'static str {
        match self {
            Action::FaderIncreaseOnce => "fader_increase_once",
            Action::FaderIncreaseTimer { .. } => "fader_increase_timer",
            Action::FaderIncreaseStop => "fader_increase_stop",
            Action::FaderDecreaseOnce => "fader_decrease_once",
            Action::FaderDecreaseTimer { .. } => "fader_decrease_timer",
            Action::FaderDecreaseStop => "fader_decrease_stop",
            Action::FaderSetlevel { .. } => "fader_setlevel",
            Action::SetFormatButton { .. } => "set_format_button",
            Action::SetMacroPreset { .. } => "set_macro_preset",
            Action::SetMacroName { .. } => "set_macro_name",
            Action::MuteOn => "mute_on",
            Action::MuteOff => "mute_off",
            Action::MuteToggle => "mute_toggle",
        }
    }

    /// Family the action is restricted to, `None` if every model has it
    pub fn family(&self) -> Option<ModelFamily> {
        match self {
            Action::SetFormatButton { .. } => Some(ModelFamily::Classic),
            Action::SetMacroPreset { .. } | Action::SetMacroName { .. } => {
                Some(ModelFamily::Modern)
            }
            _ => None,
        }
    }

    /// Check the action's options and that `model` offers it
    pub fn validate(&self, model: Model) -> Result<(), CommandError> {
        if let Some(family) = self.family() {
            if family != model.family() {
                return Err(CommandError::UnsupportedAction {
                    action: self.name(),
                    family: model.family(),
                });
            }
        }

        match self {
            Action::FaderIncreaseTimer { rate } | Action::FaderDecreaseTimer { rate }
                if *rate == 0 =>
            {
                Err(self.invalid("rate must be at least 1 ms"))
            }
            Action::FaderIncreaseTimer { rate } | Action::FaderDecreaseTimer { rate }
                if *rate > MAX_RAMP_INTERVAL_MS =>
            {
                Err(self.invalid(format!(
                    "rate {} ms is above {} ms",
                    rate, MAX_RAMP_INTERVAL_MS
                )))
            }
            Action::FaderSetlevel { level } if !level.is_finite() => {
                Err(self.invalid(format!("level {} is not a number", level)))
            }
            Action::SetMacroPreset { preset }
                if !(MACRO_PRESET_MIN..=MACRO_PRESET_MAX).contains(preset) =>
            {
                Err(self.invalid(format!(
                    "preset {} is outside {}..={}",
                    preset, MACRO_PRESET_MIN, MACRO_PRESET_MAX
                )))
            }
            Action::SetMacroName { name } if name.trim().is_empty() => {
                Err(self.invalid("macro name is empty"))
            }
            // A line break in the name would end the command early on the wire
            Action::SetMacroName { name } if name.chars().any(char::is_control) => {
                Err(self.invalid("macro name contains control characters"))
            }
            _ => Ok(()),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> CommandError {
        CommandError::InvalidOption {
            action: self.name(),
            reason: reason.into(),
        }
    }
}

/// Description of an action as offered to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDefinition {
    pub id: &'static str,
    pub name: &'static str,
    /// Direction for the fader step and ramp actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

const fn def(id: &'static str, name: &'static str, direction: Option<Direction>) -> ActionDefinition {
    ActionDefinition {
        id,
        name,
        direction,
    }
}

const COMMON_ACTIONS: [ActionDefinition; 7] = [
    def(
        "fader_increase_once",
        "Increase Fader Level 1 Point and Stop",
        Some(Direction::Increase),
    ),
    def(
        "fader_increase_timer",
        "Increase Fader Level 1 Point Continuously",
        Some(Direction::Increase),
    ),
    def(
        "fader_increase_stop",
        "Stop Increasing Fader Level",
        Some(Direction::Increase),
    ),
    def(
        "fader_decrease_once",
        "Decrease Fader Level 1 Point and Stop",
        Some(Direction::Decrease),
    ),
    def(
        "fader_decrease_timer",
        "Decrease Fader Level 1 Point Continuously",
        Some(Direction::Decrease),
    ),
    def(
        "fader_decrease_stop",
        "Stop Decreasing Fader Level",
        Some(Direction::Decrease),
    ),
    def("fader_setlevel", "Set Fader to Level", None),
];

const MUTE_ACTIONS: [ActionDefinition; 3] = [
    def("mute_on", "Mute On", None),
    def("mute_off", "Mute Off", None),
    def("mute_toggle", "Toggle Mute", None),
];

/// Actions registered for `model`
pub fn available_actions(model: Model) -> Vec<ActionDefinition> {
    let mut actions = COMMON_ACTIONS.to_vec();
    match model.family() {
        ModelFamily::Classic => {
            actions.push(def("set_format_button", "Set Format Button", None));
        }
        ModelFamily::Modern => {
            actions.push(def("set_macro_preset", "Set Macro by Preset Number", None));
            actions.push(def("set_macro_name", "Set Macro by Name", None));
        }
    }
    actions.extend(MUTE_ACTIONS);
    actions
}

/// A ready-made hold button: `down` on press, `up` on release
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonPreset {
    pub name: &'static str,
    pub category: &'static str,
    pub down: Action,
    pub up: Action,
}

/// The "Fader +" / "Fader -" hold buttons
pub fn presets() -> Vec<ButtonPreset> {
    vec![
        ButtonPreset {
            name: "Fader +",
            category: "Fader Level",
            down: Action::FaderIncreaseTimer {
                rate: DEFAULT_RAMP_INTERVAL_MS,
            },
            up: Action::FaderIncreaseStop,
        },
        ButtonPreset {
            name: "Fader -",
            category: "Fader Level",
            down: Action::FaderDecreaseTimer {
                rate: DEFAULT_RAMP_INTERVAL_MS,
            },
            up: Action::FaderDecreaseStop,
        },
    ]
}
