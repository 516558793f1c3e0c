//! Error types for configuration, protocol parsing and command dispatch

use thiserror::Error;

use crate::io::IoError;
use crate::model::ModelFamily;

/// Errors that can occur when parsing a status line from the processor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A recognized key arrived without a value
    #[error("Missing value for '{key}'")]
    MissingValue { key: String },

    /// Value is not a number where one is required
    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },

    /// Numeric value outside the range the protocol allows
    #[error("Value {value} for '{key}' is outside {min}..={max}")]
    OutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Format button id not present in the format table
    #[error("Unknown format button id: {0}")]
    UnknownFormat(String),

    /// Unknown processor model id
    #[error("Unknown processor model: {0}")]
    UnknownModel(String),
}

/// Configuration problems that keep the adapter disconnected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No host configured")]
    MissingHost,

    #[error("Invalid IPv4 address '{0}'")]
    InvalidHost(String),

    #[error("Invalid port number")]
    InvalidPort,
}

/// Errors returned when an action or command cannot be carried out
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No live socket, the command was dropped
    #[error("Not connected")]
    NotConnected,

    /// Action is not available on this model family
    #[error("Action '{action}' is not supported by {family} processors")]
    UnsupportedAction {
        action: &'static str,
        family: ModelFamily,
    },

    /// Action option outside its allowed range
    #[error("Invalid option for '{action}': {reason}")]
    InvalidOption {
        action: &'static str,
        reason: String,
    },

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Socket error: {0}")]
    Io(IoError),
}

impl From<IoError> for CommandError {
    fn from(e: IoError) -> Self {
        if e.is_not_connected() {
            CommandError::NotConnected
        } else {
            CommandError::Io(e)
        }
    }
}
