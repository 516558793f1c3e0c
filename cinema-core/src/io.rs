//! I/O abstraction for the processor controller.
//!
//! The controller never touches sockets directly. It talks to an [`IoProvider`],
//! which lets the same connection and protocol logic run under the tokio
//! server, inside tests with a scripted mock, or in any other host that can
//! offer a non-blocking TCP socket and a millisecond clock.
//!
//! # Design
//!
//! The trait is **poll-based** (not async):
//! - the controller is driven by a periodic `poll()` from its host
//! - hosts adapt their own sockets with non-blocking reads and writes
//!
//! # Example
//!
//! ```rust,ignore
//! use cinema_core::io::{IoProvider, IoProviderExt};
//!
//! fn query_fader<I: IoProvider>(io: &mut I, addr: SocketAddrV4) {
//!     let socket = io.tcp_create().unwrap();
//!     io.tcp_connect(&socket, addr).unwrap();
//!     // ... once io.tcp_is_connected(&socket) ...
//!     io.tcp_send_line(&socket, "sys.fader ?").unwrap();
//! }
//! ```

use core::fmt;
use std::net::SocketAddrV4;

use crate::protocol::LINE_TERMINATOR;

// =============================================================================
// Error Types
// =============================================================================

const CODE_NOT_CONNECTED: i32 = -1;
const CODE_WOULD_BLOCK: i32 = -11;

/// I/O error type for socket operations.
///
/// Kept minimal: a code plus a message is all a host needs to hand back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoError {
    /// Error code (negative values indicate errors, specific meaning varies by platform)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
}

impl IoError {
    /// Create a new I/O error with a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a "would block" error (socket buffer full, non-blocking).
    pub fn would_block() -> Self {
        Self::new(CODE_WOULD_BLOCK, "Operation would block")
    }

    /// Create a "not connected" error.
    pub fn not_connected() -> Self {
        Self::new(CODE_NOT_CONNECTED, "Not connected")
    }

    pub fn is_would_block(&self) -> bool {
        self.code == CODE_WOULD_BLOCK
    }

    pub fn is_not_connected(&self) -> bool {
        self.code == CODE_NOT_CONNECTED
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for IoError {}

// =============================================================================
// Socket Handle Types
// =============================================================================

/// Opaque handle to a TCP socket.
///
/// The actual socket lives in the provider; this is just its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcpSocketHandle(pub i32);

// =============================================================================
// IoProvider Trait
// =============================================================================

/// Platform-independent I/O provider.
///
/// All operations are non-blocking. Receive returns `None` when no data is
/// available instead of blocking. A socket whose peer closed the connection, or
/// that failed to connect, reports `false` from [`IoProvider::tcp_is_valid`].
pub trait IoProvider {
    /// Create a new TCP socket.
    fn tcp_create(&mut self) -> Result<TcpSocketHandle, IoError>;

    /// Initiate a TCP connection (non-blocking).
    ///
    /// Use `tcp_is_connected()` to check when the connection is established.
    fn tcp_connect(&mut self, socket: &TcpSocketHandle, addr: SocketAddrV4)
        -> Result<(), IoError>;

    /// Check if a TCP socket is connected.
    fn tcp_is_connected(&self, socket: &TcpSocketHandle) -> bool;

    /// Check if a TCP socket is still valid (not closed by the peer or failed).
    fn tcp_is_valid(&self, socket: &TcpSocketHandle) -> bool;

    /// Send data over a TCP connection.
    ///
    /// Returns the number of bytes sent.
    fn tcp_send(&mut self, socket: &TcpSocketHandle, data: &[u8]) -> Result<usize, IoError>;

    /// Receive raw data from a TCP socket (non-blocking).
    ///
    /// Returns `None` if no data is available.
    fn tcp_recv_raw(&mut self, socket: &TcpSocketHandle, buf: &mut [u8]) -> Option<usize>;

    /// Close a TCP socket.
    fn tcp_close(&mut self, socket: TcpSocketHandle);

    // -------------------------------------------------------------------------
    // Utility
    // -------------------------------------------------------------------------

    /// Get current timestamp in milliseconds since some epoch.
    ///
    /// Used for poll scheduling, ramps and reconnect backoff. The epoch doesn't
    /// matter as long as it's consistent within the session.
    fn current_time_ms(&self) -> u64;

    /// Log a debug message.
    fn debug(&self, msg: &str);

    /// Log an info message.
    fn info(&self, msg: &str);

    /// Log a warning.
    fn warn(&self, msg: &str);
}

// =============================================================================
// Helper Methods
// =============================================================================

/// Extension methods for IoProvider.
pub trait IoProviderExt: IoProvider {
    /// Send a command line with the CRLF terminator.
    fn tcp_send_line(&mut self, socket: &TcpSocketHandle, line: &str) -> Result<usize, IoError> {
        let data = format!("{}{}", line, LINE_TERMINATOR);
        self.tcp_send(socket, data.as_bytes())
    }
}

// Blanket implementation for all IoProvider types
impl<T: IoProvider> IoProviderExt for T {}

// =============================================================================
// Mock provider for controller tests
// =============================================================================


// =============================================================================
// Tests
// =============================================================================
