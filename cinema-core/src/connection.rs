//! Connection state machine and line framing for the processor session.
//!
//! Pure state, no I/O: the controller performs the socket operations through
//! an [`IoProvider`](crate::io::IoProvider) and reports the outcome here.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ConnectionManager (this module)                            │
//! │  - Disconnected → Connecting → Connected → Error            │
//! │  - Failure count and reconnect backoff                      │
//! └─────────────────────────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  LineFramer                                                 │
//! │  - Buffers partial lines, yields complete status lines      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use cinema_core::connection::{ConnectionManager, LineFramer};
//!
//! let mut conn = ConnectionManager::new();
//! conn.start_connecting();
//! // ... I/O layer performs connection ...
//! conn.connected();
//! // ... bytes arrive ...
//! for line in framer.push(&buf[..len]) { /* parse */ }
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle of the TCP session to a processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected, no connection attempt in progress
    #[default]
    Disconnected,
    /// TCP connect in progress
    Connecting,
    /// Socket is live, commands can be sent
    Connected,
    /// Connection failed or was closed by the peer
    Error,
    /// Shutting down, no more connection attempts
    ShuttingDown,
}

impl ConnectionState {
    /// Check if the connection is usable for sending commands
    pub fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }

    /// Check if a collaborator may start a new connection attempt
    pub fn should_reconnect(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Error)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Error => write!(f, "Error"),
            ConnectionState::ShuttingDown => write!(f, "Shutting Down"),
        }
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Tracks connection state and retry backoff.
///
/// This is a pure state machine with no I/O. Reconnection is not automatic:
/// the host decides whether and when to call `connect` again, using
/// [`ConnectionManager::backoff_ms`] as a hint.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    state: ConnectionState,
    /// Number of consecutive connection failures
    failure_count: u32,
}

impl ConnectionManager {
    /// Create a new connection manager in disconnected state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn can_send(&self) -> bool {
        self.state.can_send()
    }

    pub fn is_connecting(&self) -> bool {
        self.state.is_connecting()
    }

    pub fn should_reconnect(&self) -> bool {
        self.state.should_reconnect()
    }

    /// Get recommended backoff delay in milliseconds.
    ///
    /// Uses exponential backoff: 1s, 2s, 4s, 8s, max 30s
    pub fn backoff_ms(&self) -> u64 {
        let base_ms = 1000u64;
        let max_ms = 30000u64;
        let delay = base_ms * (1u64 << self.failure_count.min(5));
        delay.min(max_ms)
    }

    // -------------------------------------------------------------------------
    // State Transitions
    // -------------------------------------------------------------------------

    /// Call this when starting a connection attempt.
    pub fn start_connecting(&mut self) {
        if self.state != ConnectionState::ShuttingDown {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Call this when the TCP connect completes.
    pub fn connected(&mut self) {
        if self.state.is_connecting() {
            self.state = ConnectionState::Connected;
            self.failure_count = 0;
        }
    }

    /// Call this when the connect fails or the peer closes the socket.
    pub fn error(&mut self) {
        if self.state != ConnectionState::ShuttingDown {
            self.state = ConnectionState::Error;
            self.failure_count = self.failure_count.saturating_add(1);
        }
    }

    /// Deliberate close; keeps the failure count so backoff continues.
    pub fn disconnected(&mut self) {
        if self.state != ConnectionState::ShuttingDown {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// No further connection attempts after this.
    pub fn shutdown(&mut self) {
        self.state = ConnectionState::ShuttingDown;
    }

    /// Reset to disconnected state and clear the failure count.
    ///
    /// Used when the target changes.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.failure_count = 0;
    }
}

// =============================================================================
// Line Framing
// =============================================================================

/// Longest partial line kept while waiting for its terminator
pub const MAX_LINE_LEN: usize = 4096;

/// Splits the incoming byte stream into status lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped. Partial lines are kept until
/// their terminator arrives. Empty lines are skipped. Bytes that are not valid
/// UTF-8 are replaced rather than rejected.
///
/// A line longer than [`MAX_LINE_LEN`] is dropped as a whole: the framer
/// discards everything up to its terminator and resumes with the next line.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    /// Inside an overlong line, waiting for its terminator
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes and return every line they complete.
    pub fn push(&mut self, mut data: &[u8]) -> Vec<String> {
        if self.discarding {
            match data.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    data = &data[pos + 1..];
                    self.discarding = false;
                }
                None => return Vec::new(),
            }
        }
        self.buf.extend_from_slice(data);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let mut line = &self.buf[start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            if !line.is_empty() {
                lines.push(String::from_utf8_lossy(line).into_owned());
            }
            start = end + 1;
        }
        self.buf.drain(..start);

        // A device that never terminates its lines must not grow the buffer forever
        if self.buf.len() > MAX_LINE_LEN {
            self.buf.clear();
            self.discarding = true;
        }
        lines
    }

    /// Bytes of the current unterminated line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}

// =============================================================================
// Tests
// =============================================================================
