//! # Cinema Core
//!
//! Platform-independent control library for Dolby Cinema Processors
//! (CP650, CP750, CP850, CP950).
//!
//! This crate contains the wire protocol, the device state and the connection
//! logic with **zero I/O dependencies**: no sockets, no async runtime, no
//! logger. Everything that touches the outside world goes through the
//! [`IoProvider`] trait.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  cinema-core (platform-independent, no tokio/async deps)    │
//! │  ├── protocol/     (command formatting & status parsing)    │
//! │  ├── state         (device state, variables, feedback)      │
//! │  ├── connection    (state machine, backoff, line framing)   │
//! │  ├── ramp          (continuous fader ramps)                 │
//! │  ├── action        (host actions per model)                 │
//! │  ├── controllers/  (ProcessorController)                    │
//! │  └── IoProvider    (abstracts TCP I/O, clock and logging)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  cinema-server          │
//!                 │  (SocketIoProvider)     │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Supported Processors
//!
//! | Family  | Models              | Framing      | Port  |
//! |---------|---------------------|--------------|-------|
//! | Classic | CP650               | `key=value`  | 61412 |
//! | Modern  | CP750, CP850, CP950 | `key value`  | 61408 |
//!
//! ## Key Modules
//!
//! - [`protocol`] - Command formatting and status line parsing
//! - [`state`] - Last known processor state and its display form
//! - [`connection`] - Connection state machine with backoff logic
//! - [`ramp`] - Hold-to-ramp fader scheduling
//! - [`action`] - Actions offered to the control surface
//! - [`controllers`] - The poll-based [`ProcessorController`]
//! - [`io`] - Platform-agnostic I/O trait ([`IoProvider`])
//!
//! ## Example: Building Commands
//!
//! ```rust
//! use cinema_core::protocol::command::{format_set_fader_command, poll_requests};
//! use cinema_core::Model;
//!
//! assert_eq!(format_set_fader_command(Model::Cp650, 8.5), "fader_level=85");
//! assert_eq!(format_set_fader_command(Model::Cp750, 7.0), "cp750.sys.fader 70");
//! assert_eq!(poll_requests(Model::Cp950).len(), 4);
//! ```
//!
//! ## Example: Parsing Status Lines
//!
//! ```rust
//! use cinema_core::protocol::report::parse_line;
//! use cinema_core::{DeviceState, ModelFamily};
//!
//! let mut state = DeviceState::new();
//! let delta = parse_line(ModelFamily::Modern, "sys.mute 1").unwrap();
//! let changed = state.apply_delta(delta);
//! assert!(!changed.is_empty());
//! assert_eq!(state.to_variables().mute_status.as_deref(), Some("Muted"));
//! ```
//!
//! ## Example: Using Connection State Machine
//!
//! ```rust
//! use cinema_core::{ConnectionManager, ConnectionState};
//!
//! let mut conn = ConnectionManager::new();
//! assert_eq!(conn.state(), ConnectionState::Disconnected);
//!
//! conn.start_connecting();
//! assert!(conn.is_connecting());
//!
//! conn.connected();
//! assert!(conn.can_send());
//! ```

pub mod action;
pub mod config;
pub mod connection;
pub mod controllers;
pub mod error;
pub mod io;
pub mod model;
pub mod protocol;
pub mod ramp;
pub mod state;

// Re-export commonly used types
pub use action::{available_actions, presets, Action, ActionDefinition, ButtonPreset};
pub use config::DeviceConfig;
pub use connection::{ConnectionManager, ConnectionState, LineFramer};
pub use controllers::{ControllerEvent, ProcessorController};
pub use error::{CommandError, ConfigError, ParseError};
pub use io::{IoError, IoProvider, IoProviderExt, TcpSocketHandle};
pub use model::{Model, ModelFamily};
pub use protocol::{Direction, FormatButton};
pub use ramp::{RampController, RampJob, DEFAULT_RAMP_INTERVAL_MS, MAX_RAMP_INTERVAL_MS};
pub use state::{ChangedFields, DeviceState, FeedbackId, Variables};
