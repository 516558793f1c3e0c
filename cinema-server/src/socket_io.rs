//! Native implementation of IoProvider for the server.
//!
//! This module provides `SocketIoProvider` which implements
//! `cinema_core::IoProvider` on top of non-blocking std sockets, created with
//! `socket2` so the connect itself does not block the service task.
//!
//! A send the kernel only partly accepts keeps its unwritten tail on the
//! socket. The tail goes out ahead of later sends and on every receive, so
//! command lines are never cut. A tail that keeps growing past
//! [`MAX_PENDING_SEND`] means the processor stopped reading, and the socket
//! is marked failed.

use std::cell::Cell;
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, SocketAddrV4, TcpStream};
use std::time::Instant;

use cinema_core::io::{IoError, IoProvider, TcpSocketHandle};
use socket2::{Domain, Protocol, Socket, Type};

/// Most unsent bytes kept per socket
pub const MAX_PENDING_SEND: usize = 64 * 1024;

/// Internal state for a TCP socket
struct TcpSocketState {
    /// Unconnected socket, until `tcp_connect` turns it into a stream
    socket: Option<Socket>,
    stream: Option<TcpStream>,
    /// Set once the connect failed, the peer closed or a read/write failed
    failed: Cell<bool>,
    /// Accepted by `tcp_send` but not yet taken by the kernel
    pending: Vec<u8>,
}

impl TcpSocketState {
    /// Write as much of the pending tail as the socket takes right now
    fn flush(&mut self) -> std::io::Result<()> {
        let Some(stream) = &self.stream else {
            return Ok(());
        };
        let mut writer = stream;
        while !self.pending.is_empty() {
            match writer.write(&self.pending) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn check_error(&self) {
        if let Some(stream) = &self.stream {
            if let Ok(Some(e)) = stream.take_error() {
                log::debug!("Socket error: {}", e);
                self.failed.set(true);
            }
        }
    }
}

/// Map a std error into the provider's error type
fn io_error(e: &std::io::Error) -> IoError {
    if e.kind() == ErrorKind::WouldBlock {
        return IoError::would_block();
    }
    // Keep -1 for "not connected"
    let code = e.raw_os_error().map(|c| -c.abs()).filter(|c| *c != -1);
    IoError::new(code.unwrap_or(-5), e.to_string())
}

#[cfg(unix)]
fn connect_in_progress(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::EINPROGRESS) || e.kind() == ErrorKind::WouldBlock
}

#[cfg(not(unix))]
fn connect_in_progress(e: &std::io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock
}

/// Native I/O provider for the processor controller.
///
/// Wraps non-blocking sockets in the poll-based interface of
/// `cinema_core::IoProvider`.
///
/// # Usage
///
/// ```rust,ignore
/// use cinema_core::{DeviceConfig, Model, ProcessorController};
/// use cinema_server::socket_io::SocketIoProvider;
///
/// let mut io = SocketIoProvider::new();
/// let mut controller = ProcessorController::new(DeviceConfig::new("10.0.0.5", Model::Cp950));
/// controller.connect(&mut io)?;
///
/// // In your main loop:
/// let events = controller.poll(&mut io);
/// ```
pub struct SocketIoProvider {
    /// Next socket handle ID
    next_handle: i32,
    /// TCP sockets by handle
    tcp_sockets: HashMap<i32, TcpSocketState>,
    /// Start time for current_time_ms calculation
    start_time: Instant,
}

impl SocketIoProvider {
    /// Create a new I/O provider.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            tcp_sockets: HashMap::new(),
            start_time: Instant::now(),
        }
    }

    fn alloc_handle(&mut self) -> i32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Number of open sockets
    pub fn socket_count(&self) -> usize {
        self.tcp_sockets.len()
    }

    /// Bytes of `socket` still waiting for room in the kernel send buffer
    pub fn pending_send(&self, socket: &TcpSocketHandle) -> usize {
        self.tcp_sockets
            .get(&socket.0)
            .map_or(0, |state| state.pending.len())
    }
}

impl Default for SocketIoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IoProvider for SocketIoProvider {
    // -------------------------------------------------------------------------
    // TCP Operations
    // -------------------------------------------------------------------------

    fn tcp_create(&mut self) -> Result<TcpSocketHandle, IoError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| IoError::new(-5, format!("Failed to create socket: {}", e)))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| IoError::new(-5, format!("Failed to set non-blocking: {}", e)))?;

        // Small commands, send them right away
        if let Err(e) = socket.set_nodelay(true) {
            log::debug!("Failed to set TCP_NODELAY: {}", e);
        }
        if let Err(e) = socket.set_keepalive(true) {
            log::debug!("Failed to set SO_KEEPALIVE: {}", e);
        }

        let handle = self.alloc_handle();
        self.tcp_sockets.insert(
            handle,
            TcpSocketState {
                socket: Some(socket),
                stream: None,
                failed: Cell::new(false),
                pending: Vec::new(),
            },
        );
        Ok(TcpSocketHandle(handle))
    }

    fn tcp_connect(
        &mut self,
        socket: &TcpSocketHandle,
        addr: SocketAddrV4,
    ) -> Result<(), IoError> {
        let state = self
            .tcp_sockets
            .get_mut(&socket.0)
            .ok_or_else(|| IoError::new(-9, "Invalid socket handle"))?;
        let sock = state
            .socket
            .take()
            .ok_or_else(|| IoError::new(-106, "Socket already connecting"))?;

        match sock.connect(&SocketAddr::V4(addr).into()) {
            Ok(()) => {}
            Err(e) if connect_in_progress(&e) => {}
            Err(e) => {
                state.failed.set(true);
                return Err(io_error(&e));
            }
        }
        state.stream = Some(sock.into());
        Ok(())
    }

    fn tcp_is_connected(&self, socket: &TcpSocketHandle) -> bool {
        let Some(state) = self.tcp_sockets.get(&socket.0) else {
            return false;
        };
        state.check_error();
        if state.failed.get() {
            return false;
        }
        state
            .stream
            .as_ref()
            .is_some_and(|stream| stream.peer_addr().is_ok())
    }

    fn tcp_is_valid(&self, socket: &TcpSocketHandle) -> bool {
        let Some(state) = self.tcp_sockets.get(&socket.0) else {
            return false;
        };
        state.check_error();
        !state.failed.get()
    }

    fn tcp_send(&mut self, socket: &TcpSocketHandle, data: &[u8]) -> Result<usize, IoError> {
        let state = self
            .tcp_sockets
            .get_mut(&socket.0)
            .ok_or_else(IoError::not_connected)?;
        if state.stream.is_none() || state.failed.get() {
            return Err(IoError::not_connected());
        }

        if state.pending.len() + data.len() > MAX_PENDING_SEND {
            log::debug!("Send stalled with {} bytes pending", state.pending.len());
            state.failed.set(true);
            return Err(IoError::new(-105, "Send buffer full"));
        }
        state.pending.extend_from_slice(data);
        match state.flush() {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                state.failed.set(true);
                Err(io_error(&e))
            }
        }
    }

    fn tcp_recv_raw(&mut self, socket: &TcpSocketHandle, buf: &mut [u8]) -> Option<usize> {
        let state = self.tcp_sockets.get_mut(&socket.0)?;
        if state.stream.is_none() || state.failed.get() {
            return None;
        }
        if let Err(e) = state.flush() {
            log::debug!("TCP send error: {}", e);
            state.failed.set(true);
            return None;
        }

        let stream = state.stream.as_ref()?;
        let mut reader = stream;
        match reader.read(buf) {
            Ok(0) => {
                log::debug!("Connection closed by peer");
                state.failed.set(true);
                None
            }
            Ok(n) => Some(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) if e.kind() == ErrorKind::Interrupted => None,
            Err(e) => {
                log::debug!("TCP receive error: {}", e);
                state.failed.set(true);
                None
            }
        }
    }

    fn tcp_close(&mut self, socket: TcpSocketHandle) {
        if let Some(state) = self.tcp_sockets.remove(&socket.0) {
            if let Some(stream) = state.stream {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Utility
    // -------------------------------------------------------------------------

    fn current_time_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    fn debug(&self, msg: &str) {
        log::debug!("{}", msg);
    }

    fn info(&self, msg: &str) {
        log::info!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        log::warn!("{}", msg);
    }
}
