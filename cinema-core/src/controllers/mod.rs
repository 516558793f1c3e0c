//! Processor controller using IoProvider
//!
//! The controller owns everything mutable for one processor: the socket, the
//! connection state machine, the device state and the running ramps. It is
//! poll-based and works with any I/O backend.
//!
//! The controller emits [`ControllerEvent`]s that the shell (server, tests)
//! turns into its own notifications.
//!
//! ```rust,ignore
//! use cinema_core::controllers::{ControllerEvent, ProcessorController};
//! use cinema_core::IoProvider;
//!
//! fn main_loop<I: IoProvider>(io: &mut I, controller: &mut ProcessorController) {
//!     controller.connect(io).ok();
//!     loop {
//!         for event in controller.poll(io) {
//!             match event {
//!                 ControllerEvent::StateChanged { .. } => {
//!                     let vars = controller.state().to_variables();
//!                     // publish vars
//!                 }
//!                 _ => {}
//!             }
//!         }
//!     }
//! }
//! ```

pub mod processor;

pub use processor::ProcessorController;

use crate::connection::ConnectionState;
use crate::state::{ChangedFields, FeedbackId};

/// Events emitted by the controller for the shell to handle.
///
/// Events are collected between polls and handed out, in order, by the next
/// [`ProcessorController::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Connection state changed. `message` carries the reason for errors and
    /// disconnects.
    StatusChanged {
        state: ConnectionState,
        message: Option<String>,
    },

    /// Device state changed; one event per status line or optimistic update.
    StateChanged { changed: ChangedFields },

    /// A feedback signal may have flipped (sent in addition to `StateChanged`).
    FeedbackChanged(FeedbackId),

    /// A dropped status line or a skipped ramp step. Transport failures are
    /// reported through `StatusChanged`.
    Error { message: String },
}
