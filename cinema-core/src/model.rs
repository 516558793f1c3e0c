//! Processor model definitions
//!
//! The CP650 speaks the older `key=value` protocol, the CP750/CP850/CP950
//! share the `key value` command set. Everything that differs between the two
//! is derived from [`ModelFamily`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ParseError;

/// Control port of the CP650
pub const CLASSIC_PORT: u16 = 61412;

/// Control port of the CP750, CP850 and CP950
pub const MODERN_PORT: u16 = 61408;

/// Protocol family shared by a group of processor models
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// CP650: `key=value` frames
    Classic,
    /// CP750/CP850/CP950: `key value` frames
    Modern,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Classic => "classic",
            ModelFamily::Modern => "modern",
        }
    }

    /// Separator between key and value on the wire
    pub fn separator(&self) -> char {
        match self {
            ModelFamily::Classic => '=',
            ModelFamily::Modern => ' ',
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ModelFamily::Classic => CLASSIC_PORT,
            ModelFamily::Modern => MODERN_PORT,
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported processor models
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    #[default]
    Cp650,
    Cp750,
    Cp850,
    Cp950,
}

impl Model {
    pub const ALL: [Model; 4] = [Model::Cp650, Model::Cp750, Model::Cp850, Model::Cp950];

    /// Model id as used in configuration ("cp650", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Cp650 => "cp650",
            Model::Cp750 => "cp750",
            Model::Cp850 => "cp850",
            Model::Cp950 => "cp950",
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Model::Cp650 => "CP650",
            Model::Cp750 => "CP750",
            Model::Cp850 => "CP850",
            Model::Cp950 => "CP950",
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            Model::Cp650 => ModelFamily::Classic,
            Model::Cp750 | Model::Cp850 | Model::Cp950 => ModelFamily::Modern,
        }
    }

    pub fn default_port(&self) -> u16 {
        self.family().default_port()
    }

    /// Prefix put in front of every outgoing command.
    ///
    /// The CP750 addresses its system object as `cp750.sys.*`.
    pub fn command_prefix(&self) -> &'static str {
        match self {
            Model::Cp750 => "cp750.",
            _ => "",
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Model {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Model::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::UnknownModel(s.to_string()))
    }
}
