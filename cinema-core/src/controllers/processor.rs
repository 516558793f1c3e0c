//! Dolby Cinema Processor TCP Controller
//!
//! Platform-independent controller for CP650/CP750/CP850/CP950 processors
//! using the [`IoProvider`] trait. Handles the connection, the status poll
//! after connecting, status line parsing, host actions and fader ramps.
//!
//! # Example
//!
//! ```rust,ignore
//! use cinema_core::controllers::ProcessorController;
//! use cinema_core::{Action, DeviceConfig, Model};
//!
//! fn run<I: IoProvider>(io: &mut I) {
//!     let mut controller = ProcessorController::new(DeviceConfig::new("10.0.0.5", Model::Cp950));
//!     controller.connect(io).ok();
//!
//!     // Poll regularly (every few tens of milliseconds)
//!     loop {
//!         controller.poll(io);
//!
//!         if controller.is_connected() {
//!             controller.execute(io, &Action::MuteToggle).ok();
//!         }
//!     }
//! }
//! ```

use std::collections::VecDeque;

use super::ControllerEvent;
use crate::action::Action;
use crate::config::DeviceConfig;
use crate::connection::{ConnectionManager, ConnectionState, LineFramer};
use crate::error::CommandError;
use crate::io::{IoProvider, IoProviderExt, TcpSocketHandle};
use crate::model::Model;
use crate::protocol::command::{
    format_fader_level_command, format_format_button_command, format_macro_name_command,
    format_macro_preset_command, format_mute_command, format_mute_toggle_command,
    format_set_fader_command, poll_requests,
};
use crate::protocol::report::parse_line;
use crate::protocol::{step_fader_level, Direction};
use crate::ramp::RampController;
use crate::state::{ChangedFields, DeviceState, FeedbackId};

const RECV_BUF_SIZE: usize = 1024;

/// A status query waiting for its send time
#[derive(Debug, Clone)]
struct ScheduledPoll {
    due_ms: u64,
    command: String,
}

/// Controller for one processor
///
/// Single owner of the socket, the device state and the ramps. All mutation
/// happens inside `poll`, `execute` and the other `&mut self` methods, which
/// the host calls from one task.
pub struct ProcessorController {
    config: DeviceConfig,
    /// `<model>@<host>:<port>`, used as log prefix
    key: String,
    socket: Option<TcpSocketHandle>,
    connection: ConnectionManager,
    framer: LineFramer,
    state: DeviceState,
    ramps: RampController,
    polls: VecDeque<ScheduledPoll>,
    /// Events raised since the last poll
    events: Vec<ControllerEvent>,
}

fn processor_key(config: &DeviceConfig) -> String {
    match config.address() {
        Ok(addr) => format!("{}@{}", config.model.as_str(), addr),
        Err(_) => format!(
            "{}@{}",
            config.model.as_str(),
            config.host.as_deref().unwrap_or("unconfigured")
        ),
    }
}

impl ProcessorController {
    /// Create a disconnected controller. Nothing happens until `connect`.
    pub fn new(config: DeviceConfig) -> Self {
        ProcessorController {
            key: processor_key(&config),
            config,
            socket: None,
            connection: ConnectionManager::new(),
            framer: LineFramer::new(),
            state: DeviceState::new(),
            ramps: RampController::new(),
            polls: VecDeque::new(),
            events: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn model(&self) -> Model {
        self.config.model
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.can_send()
    }

    pub fn ramps(&self) -> &RampController {
        &self.ramps
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    /// Open the TCP connection to the configured address.
    ///
    /// A configuration error leaves the controller disconnected and is not
    /// retried. The connect itself completes in a later `poll`.
    pub fn connect<I: IoProvider>(&mut self, io: &mut I) -> Result<(), CommandError> {
        if self.connection.state() == ConnectionState::ShuttingDown {
            return Err(CommandError::NotConnected);
        }
        self.close_socket(io);
        self.polls.clear();

        let addr = match self.config.address() {
            Ok(addr) => addr,
            Err(e) => {
                io.warn(&format!("{}: {}", self.key, e));
                self.connection.disconnected();
                self.push_status(Some(e.to_string()));
                return Err(e.into());
            }
        };

        let socket = match io.tcp_create() {
            Ok(socket) => socket,
            Err(e) => {
                self.transport_failed(io, format!("Cannot create socket: {}", e));
                return Err(e.into());
            }
        };
        if let Err(e) = io.tcp_connect(&socket, addr) {
            io.tcp_close(socket);
            self.transport_failed(io, format!("Connect to {} failed: {}", addr, e));
            return Err(e.into());
        }

        io.info(&format!("{}: Connecting to {}", self.key, addr));
        self.socket = Some(socket);
        self.connection.start_connecting();
        self.push_status(None);
        Ok(())
    }

    /// Close the connection. Ramps keep running; their steps fail until the
    /// next `connect`.
    pub fn disconnect<I: IoProvider>(&mut self, io: &mut I) {
        let was = self.connection.state();
        self.close_socket(io);
        self.polls.clear();
        self.connection.disconnected();
        if was != self.connection.state() {
            io.info(&format!("{}: Disconnected", self.key));
            self.push_status(Some("Disconnected".to_string()));
        }
    }

    /// Switch to a new configuration.
    ///
    /// Ramps and pending polls are cancelled and the old socket is closed
    /// before the new connection is opened. Device state starts over when the
    /// model or address changed.
    pub fn reconfigure<I: IoProvider>(
        &mut self,
        io: &mut I,
        config: DeviceConfig,
    ) -> Result<(), CommandError> {
        self.ramps.stop_all();
        self.disconnect(io);

        let target_changed =
            config.model != self.config.model || config.address() != self.config.address();
        self.config = config;
        self.key = processor_key(&self.config);
        io.info(&format!("{}: Configuration updated", self.key));

        if target_changed {
            self.state = DeviceState::new();
            self.connection.reset();
            self.notify(ChangedFields::all());
        }
        self.connect(io)
    }

    /// Stop everything; no further connects are accepted.
    pub fn shutdown<I: IoProvider>(&mut self, io: &mut I) {
        self.ramps.stop_all();
        self.polls.clear();
        self.close_socket(io);
        self.connection.shutdown();
        self.push_status(None);
    }

    fn close_socket<I: IoProvider>(&mut self, io: &mut I) {
        if let Some(socket) = self.socket.take() {
            io.tcp_close(socket);
        }
        self.framer.clear();
    }

    fn transport_failed<I: IoProvider>(&mut self, io: &mut I, message: String) {
        io.warn(&format!("{}: {}", self.key, message));
        self.close_socket(io);
        self.polls.clear();
        self.connection.error();
        self.push_status(Some(message));
    }

    fn push_status(&mut self, message: Option<String>) {
        self.events.push(ControllerEvent::StatusChanged {
            state: self.connection.state(),
            message,
        });
    }

    // -------------------------------------------------------------------------
    // Polling
    // -------------------------------------------------------------------------

    /// Poll the controller - call this regularly from the host loop
    ///
    /// Completes a pending connect, reads and applies status lines, sends the
    /// scheduled status queries and runs due ramp steps. Returns the events
    /// raised since the previous poll, in order.
    pub fn poll<I: IoProvider>(&mut self, io: &mut I) -> Vec<ControllerEvent> {
        let now = io.current_time_ms();

        match self.connection.state() {
            ConnectionState::Connecting => self.poll_connecting(io, now),
            ConnectionState::Connected => self.poll_connected(io),
            _ => {}
        }

        if self.connection.can_send() {
            self.send_due_polls(io, now);
        }
        self.run_ramps(io, now);

        std::mem::take(&mut self.events)
    }

    fn poll_connecting<I: IoProvider>(&mut self, io: &mut I, now: u64) {
        let Some(socket) = self.socket else {
            return;
        };
        if !io.tcp_is_valid(&socket) {
            self.transport_failed(io, "Connection failed".to_string());
        } else if io.tcp_is_connected(&socket) {
            self.connection.connected();
            io.info(&format!("{}: Connected", self.key));
            self.push_status(None);
            self.polls = poll_requests(self.model())
                .into_iter()
                .map(|p| ScheduledPoll {
                    due_ms: now + p.delay_ms,
                    command: p.command,
                })
                .collect();
        }
    }

    fn poll_connected<I: IoProvider>(&mut self, io: &mut I) {
        let Some(socket) = self.socket else {
            return;
        };
        let mut buf = [0u8; RECV_BUF_SIZE];
        while let Some(len) = io.tcp_recv_raw(&socket, &mut buf) {
            if len == 0 {
                break;
            }
            for line in self.framer.push(&buf[..len]) {
                self.handle_line(io, &line);
            }
        }
        if !io.tcp_is_valid(&socket) {
            self.transport_failed(io, "Connection closed by processor".to_string());
        }
    }

    fn handle_line<I: IoProvider>(&mut self, io: &I, line: &str) {
        self.log_traffic(io, &format!("{}: < {}", self.key, line));

        match parse_line(self.model().family(), line) {
            Ok(delta) => {
                let changed = self.state.apply_delta(delta);
                self.notify(changed);
            }
            Err(e) => {
                let message = format!("Dropped status line '{}': {}", line, e);
                io.warn(&format!("{}: {}", self.key, message));
                self.events.push(ControllerEvent::Error { message });
            }
        }
    }

    fn notify(&mut self, changed: ChangedFields) {
        if changed.is_empty() {
            return;
        }
        self.events.push(ControllerEvent::StateChanged { changed });
        if changed.contains(ChangedFields::MUTE) {
            self.events
                .push(ControllerEvent::FeedbackChanged(FeedbackId::MuteStatus));
        }
    }

    fn send_due_polls<I: IoProvider>(&mut self, io: &mut I, now: u64) {
        while self.polls.front().is_some_and(|p| p.due_ms <= now) {
            let Some(poll) = self.polls.pop_front() else {
                break;
            };
            if let Err(e) = self.send_command(io, &poll.command) {
                io.warn(&format!("{}: Status query '{}' failed: {}", self.key, poll.command, e));
            }
        }
    }

    fn log_traffic<I: IoProvider>(&self, io: &I, msg: &str) {
        if self.config.verbose {
            io.info(msg);
        } else {
            io.debug(msg);
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Send one command line. Dropped with `NotConnected` when there is no
    /// live socket; nothing is queued.
    pub fn send_command<I: IoProvider>(
        &mut self,
        io: &mut I,
        command: &str,
    ) -> Result<(), CommandError> {
        let socket = match self.socket {
            Some(socket) if self.connection.can_send() => socket,
            _ => {
                io.debug(&format!("{}: Not connected, dropping '{}'", self.key, command));
                return Err(CommandError::NotConnected);
            }
        };
        io.tcp_send_line(&socket, command)?;
        self.log_traffic(io, &format!("{}: > {}", self.key, command));
        Ok(())
    }

    /// Carry out a host action.
    ///
    /// Actions the model does not offer and invalid options are rejected
    /// before anything is sent.
    pub fn execute<I: IoProvider>(&mut self, io: &mut I, action: &Action) -> Result<(), CommandError> {
        action.validate(self.model())?;
        io.debug(&format!("{}: Action {}", self.key, action.name()));

        let model = self.model();
        let unsupported = || CommandError::UnsupportedAction {
            action: action.name(),
            family: model.family(),
        };

        match action {
            Action::FaderIncreaseOnce => self.step_once(io, Direction::Increase),
            Action::FaderDecreaseOnce => self.step_once(io, Direction::Decrease),
            Action::FaderIncreaseTimer { rate } => self.start_ramp(io, Direction::Increase, *rate),
            Action::FaderDecreaseTimer { rate } => self.start_ramp(io, Direction::Decrease, *rate),
            Action::FaderIncreaseStop => {
                self.stop_ramp(io, Direction::Increase);
                Ok(())
            }
            Action::FaderDecreaseStop => {
                self.stop_ramp(io, Direction::Decrease);
                Ok(())
            }
            Action::FaderSetlevel { level } => {
                self.send_command(io, &format_set_fader_command(model, *level))
            }
            Action::SetFormatButton { format } => {
                let cmd = format_format_button_command(model, *format).ok_or_else(unsupported)?;
                self.send_command(io, &cmd)
            }
            Action::SetMacroPreset { preset } => {
                let cmd = format_macro_preset_command(model, *preset).ok_or_else(unsupported)?;
                self.send_command(io, &cmd)
            }
            Action::SetMacroName { name } => {
                let cmd = format_macro_name_command(model, name).ok_or_else(unsupported)?;
                self.send_command(io, &cmd)
            }
            Action::MuteOn => self.send_command(io, &format_mute_command(model, true)),
            Action::MuteOff => self.send_command(io, &format_mute_command(model, false)),
            Action::MuteToggle => {
                // CP650 resolves the toggle itself; local state waits for its report
                let cmd = format_mute_toggle_command(model, self.state.muted);
                self.send_command(io, &cmd)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Fader ramps
    // -------------------------------------------------------------------------

    /// Start (or restart) the ramp in `direction`, stepping every `interval_ms`.
    ///
    /// A fresh ramp steps immediately.
    pub fn start_ramp<I: IoProvider>(
        &mut self,
        io: &mut I,
        direction: Direction,
        interval_ms: u64,
    ) -> Result<(), CommandError> {
        let action = match direction {
            Direction::Increase => Action::FaderIncreaseTimer { rate: interval_ms },
            Direction::Decrease => Action::FaderDecreaseTimer { rate: interval_ms },
        };
        action.validate(self.config.model)?;
        let now = io.current_time_ms();
        self.ramps.start(direction, interval_ms, now);
        io.debug(&format!(
            "{}: Fader {} ramp every {} ms",
            self.key, direction, interval_ms
        ));
        self.run_ramps(io, now);
        Ok(())
    }

    /// Stop the ramp in `direction`. No step is sent after this returns.
    pub fn stop_ramp<I: IoProvider>(&mut self, io: &I, direction: Direction) -> bool {
        let stopped = self.ramps.stop(direction).is_some();
        if stopped {
            io.debug(&format!("{}: Fader {} ramp stopped", self.key, direction));
        }
        stopped
    }

    fn run_ramps<I: IoProvider>(&mut self, io: &mut I, now: u64) {
        for direction in self.ramps.due(now) {
            self.ramp_tick(io, direction);
        }
    }

    fn ramp_tick<I: IoProvider>(&mut self, io: &mut I, direction: Direction) {
        match self.step_fader(io, direction) {
            Ok(true) => {}
            Ok(false) => {
                self.ramps.stop(direction);
                io.info(&format!(
                    "{}: Fader {} ramp stopped at limit ({})",
                    self.key, direction, self.state.fader_level
                ));
            }
            Err(e) => {
                let message = format!("Skipped fader {} step: {}", direction, e);
                io.warn(&format!("{}: {}", self.key, message));
                self.events.push(ControllerEvent::Error { message });
            }
        }
    }

    fn step_once<I: IoProvider>(&mut self, io: &mut I, direction: Direction) -> Result<(), CommandError> {
        if !self.step_fader(io, direction)? {
            self.ramps.stop(direction);
            io.debug(&format!(
                "{}: Fader already at limit ({})",
                self.key, self.state.fader_level
            ));
        }
        Ok(())
    }

    /// One fader step from the last known level.
    ///
    /// Returns `Ok(false)` without sending when the step would leave the fader
    /// range. After a successful send the local level is updated right away;
    /// the processor's echo confirms it later.
    fn step_fader<I: IoProvider>(&mut self, io: &mut I, direction: Direction) -> Result<bool, CommandError> {
        let Some(next) = step_fader_level(direction, self.state.fader_level) else {
            return Ok(false);
        };
        self.send_command(io, &format_fader_level_command(self.model(), next))?;
        let changed = self.state.set_fader_level(next);
        self.notify(changed);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::io::mock::MockIo;
    use crate::protocol::FormatButton;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn connected(model: Model) -> (ProcessorController, MockIo) {
        let mut io = MockIo::new();
        let mut controller = ProcessorController::new(DeviceConfig::new("10.0.0.5", model));
        controller.connect(&mut io).unwrap();
        controller.poll(&mut io);
        io.take_sent();
        (controller, io)
    }

    fn feed(controller: &mut ProcessorController, io: &mut MockIo, data: &str) -> Vec<ControllerEvent> {
        io.push_incoming(data);
        controller.poll(io)
    }

    #[test]
    fn test_cp950_polls_on_connect() {
        let mut io = MockIo::new();
        let mut controller = ProcessorController::new(DeviceConfig::new("10.0.0.5", Model::Cp950));
        assert_eq!(controller.key(), "cp950@10.0.0.5:61408");

        controller.connect(&mut io).unwrap();
        assert_eq!(
            io.connect_addr,
            Some(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 5), 61408))
        );

        let events = controller.poll(&mut io);
        assert_eq!(
            events,
            vec![
                ControllerEvent::StatusChanged {
                    state: ConnectionState::Connecting,
                    message: None
                },
                ControllerEvent::StatusChanged {
                    state: ConnectionState::Connected,
                    message: None
                },
            ]
        );
        assert_eq!(io.take_sent(), vec!["sys.fader ?"]);

        io.advance(499);
        controller.poll(&mut io);
        assert!(io.take_sent().is_empty());

        io.advance(1);
        controller.poll(&mut io);
        assert_eq!(io.take_sent(), vec!["sys.mute ?"]);

        io.advance(500);
        controller.poll(&mut io);
        assert_eq!(io.take_sent(), vec!["sys.macro_preset ?"]);

        io.advance(500);
        controller.poll(&mut io);
        assert_eq!(io.take_sent(), vec!["sys.macro_name ?"]);

        io.advance(5000);
        controller.poll(&mut io);
        assert!(io.take_sent().is_empty());
    }

    #[test]
    fn test_cp650_polls_all() {
        let mut io = MockIo::new();
        let mut controller = ProcessorController::new(DeviceConfig::new("10.0.0.9", Model::Cp650));
        controller.connect(&mut io).unwrap();
        controller.poll(&mut io);
        assert_eq!(io.take_sent(), vec!["all=?"]);
        assert_eq!(io.connect_addr.unwrap().port(), 61412);
    }

    #[test]
    fn test_missing_host_stays_disconnected() {
        let mut io = MockIo::new();
        let mut controller = ProcessorController::new(DeviceConfig::default());
        assert_eq!(
            controller.connect(&mut io),
            Err(CommandError::Config(ConfigError::MissingHost))
        );
        assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
        assert!(io.socket.is_none());

        let events = controller.poll(&mut io);
        assert_eq!(
            events,
            vec![ControllerEvent::StatusChanged {
                state: ConnectionState::Disconnected,
                message: Some("No host configured".to_string())
            }]
        );
    }

    #[test]
    fn test_connect_refused() {
        let mut io = MockIo::new();
        io.refuse = true;
        let mut controller = ProcessorController::new(DeviceConfig::new("10.0.0.5", Model::Cp650));
        assert!(matches!(
            controller.connect(&mut io),
            Err(CommandError::Io(_))
        ));
        assert_eq!(controller.connection_state(), ConnectionState::Error);
        assert_eq!(controller.connection().backoff_ms(), 2000);
    }

    #[test]
    fn test_status_lines_update_state() {
        let (mut controller, mut io) = connected(Model::Cp650);
        let events = feed(&mut controller, &mut io, "fader_level=72\r\nmute=1\r\n");
        assert_eq!(
            events,
            vec![
                ControllerEvent::StateChanged {
                    changed: ChangedFields::FADER_LEVEL
                },
                ControllerEvent::StateChanged {
                    changed: ChangedFields::MUTE
                },
                ControllerEvent::FeedbackChanged(FeedbackId::MuteStatus),
            ]
        );
        let vars = controller.state().to_variables();
        assert_eq!(vars.fader_level, "7.2");
        assert_eq!(vars.mute_status.as_deref(), Some("Muted"));
        assert!(controller.state().feedback(FeedbackId::MuteStatus));
    }

    #[test]
    fn test_partial_lines_across_reads() {
        let (mut controller, mut io) = connected(Model::Cp650);
        assert!(feed(&mut controller, &mut io, "fader_le").is_empty());
        let events = feed(&mut controller, &mut io, "vel=40\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(controller.state().fader_level, 40);
    }

    #[test]
    fn test_parse_error_leaves_state() {
        let (mut controller, mut io) = connected(Model::Cp650);
        let events = feed(&mut controller, &mut io, "format_button=8\r\nfader_level=40\r\n");
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ControllerEvent::Error { .. }));
        assert_eq!(
            events[1],
            ControllerEvent::StateChanged {
                changed: ChangedFields::FADER_LEVEL
            }
        );
        assert_eq!(controller.state().format_button, None);
        assert_eq!(controller.state().fader_level, 40);
    }

    #[test]
    fn test_double_start_one_step_per_interval() {
        let (mut controller, mut io) = connected(Model::Cp650);
        let timer = Action::FaderIncreaseTimer { rate: 500 };
        controller.execute(&mut io, &timer).unwrap();
        controller.execute(&mut io, &timer).unwrap();
        assert_eq!(io.take_sent(), vec!["fader_level=86"]);

        for _ in 0..20 {
            io.advance(100);
            controller.poll(&mut io);
        }
        assert_eq!(
            io.take_sent(),
            vec![
                "fader_level=87",
                "fader_level=88",
                "fader_level=89",
                "fader_level=90"
            ]
        );
        assert_eq!(controller.state().fader_level, 90);
    }

    #[test]
    fn test_stop_prevents_next_tick() {
        let (mut controller, mut io) = connected(Model::Cp750);
        controller
            .execute(&mut io, &Action::FaderDecreaseTimer { rate: 500 })
            .unwrap();
        assert_eq!(io.take_sent(), vec!["cp750.sys.fader 84"]);

        io.advance(499);
        controller.poll(&mut io);
        controller.execute(&mut io, &Action::FaderDecreaseStop).unwrap();
        io.advance(1);
        controller.poll(&mut io);

        let sent = io.take_sent();
        assert!(!sent.iter().any(|c| c.contains("sys.fader 83")));
        assert!(!controller.ramps().is_running(Direction::Decrease));
    }

    #[test]
    fn test_ramp_auto_stops_at_limit() {
        let (mut controller, mut io) = connected(Model::Cp650);
        feed(&mut controller, &mut io, "fader_level=99\r\n");

        controller
            .execute(&mut io, &Action::FaderIncreaseTimer { rate: 100 })
            .unwrap();
        io.advance(100);
        controller.poll(&mut io);
        io.advance(100);
        controller.poll(&mut io);

        assert_eq!(io.take_sent(), vec!["fader_level=100"]);
        assert!(!controller.ramps().is_running(Direction::Increase));
    }

    #[test]
    fn test_ramp_keeps_running_while_disconnected() {
        let (mut controller, mut io) = connected(Model::Cp650);
        controller
            .execute(&mut io, &Action::FaderIncreaseTimer { rate: 500 })
            .unwrap();
        io.take_sent();

        io.closed = true;
        io.advance(500);
        let events = controller.poll(&mut io);
        assert!(events.iter().any(|e| matches!(
            e,
            ControllerEvent::StatusChanged {
                state: ConnectionState::Error,
                ..
            }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, ControllerEvent::Error { .. })));
        assert!(controller.ramps().is_running(Direction::Increase));
        assert_eq!(controller.state().fader_level, 86);
    }

    #[test]
    fn test_once_at_limit_sends_nothing() {
        let (mut controller, mut io) = connected(Model::Cp850);
        feed(&mut controller, &mut io, "sys.fader 0\r\n");
        controller
            .execute(&mut io, &Action::FaderDecreaseOnce)
            .unwrap();
        assert!(io.take_sent().is_empty());

        controller
            .execute(&mut io, &Action::FaderIncreaseOnce)
            .unwrap();
        assert_eq!(io.take_sent(), vec!["sys.fader 1"]);
        assert_eq!(controller.state().fader_level, 1);
    }

    #[test]
    fn test_modern_mute_toggle_follows_state() {
        let (mut controller, mut io) = connected(Model::Cp950);
        controller.execute(&mut io, &Action::MuteToggle).unwrap();
        assert_eq!(io.take_sent(), vec!["sys.mute 1"]);

        feed(&mut controller, &mut io, "sys.mute 1\r\n");
        controller.execute(&mut io, &Action::MuteToggle).unwrap();
        assert_eq!(io.take_sent(), vec!["sys.mute 0"]);
    }

    #[test]
    fn test_classic_mute_toggle_is_fire_and_forget() {
        let (mut controller, mut io) = connected(Model::Cp650);
        feed(&mut controller, &mut io, "mute=1\r\n");
        controller.execute(&mut io, &Action::MuteToggle).unwrap();
        assert_eq!(io.take_sent(), vec!["mute=2"]);
        assert_eq!(controller.state().muted, Some(true));
    }

    #[test]
    fn test_cp750_macro_preset() {
        let (mut controller, mut io) = connected(Model::Cp750);
        controller
            .execute(&mut io, &Action::SetMacroPreset { preset: 3 })
            .unwrap();
        assert_eq!(io.take_sent(), vec!["cp750.sys.macro_preset 3"]);

        feed(&mut controller, &mut io, "cp750.sys.macro_name Feature Flat\r\n");
        assert_eq!(
            controller.state().macro_name.as_deref(),
            Some("Feature Flat")
        );
    }

    #[test]
    fn test_set_level_and_format() {
        let (mut controller, mut io) = connected(Model::Cp650);
        controller
            .execute(&mut io, &Action::FaderSetlevel { level: 7.0 })
            .unwrap();
        controller
            .execute(
                &mut io,
                &Action::SetFormatButton {
                    format: FormatButton::Format10,
                },
            )
            .unwrap();
        assert_eq!(io.take_sent(), vec!["fader_level=70", "format_button=3"]);
        // Absolute level waits for the processor's report
        assert_eq!(controller.state().fader_level, 85);
    }

    #[test]
    fn test_unsupported_action_sends_nothing() {
        let (mut controller, mut io) = connected(Model::Cp650);
        let result = controller.execute(&mut io, &Action::SetMacroPreset { preset: 3 });
        assert!(matches!(
            result,
            Err(CommandError::UnsupportedAction { .. })
        ));
        assert!(io.take_sent().is_empty());
    }

    #[test]
    fn test_oversized_timer_rate_is_rejected() {
        let (mut controller, mut io) = connected(Model::Cp650);
        io.advance(1000);
        let result = controller.execute(
            &mut io,
            &Action::FaderIncreaseTimer { rate: u64::MAX },
        );
        assert!(matches!(result, Err(CommandError::InvalidOption { .. })));
        assert!(!controller.ramps().is_running(Direction::Increase));

        let result = controller.start_ramp(&mut io, Direction::Decrease, u64::MAX);
        assert!(matches!(result, Err(CommandError::InvalidOption { .. })));
        assert!(!controller.ramps().is_running(Direction::Decrease));

        io.advance(1000);
        controller.poll(&mut io);
        assert!(io.take_sent().is_empty());
    }

    #[test]
    fn test_macro_name_with_line_break_sends_nothing() {
        let (mut controller, mut io) = connected(Model::Cp950);
        let result = controller.execute(
            &mut io,
            &Action::SetMacroName {
                name: "Feature\r\nsys.mute 1".to_string(),
            },
        );
        assert!(matches!(result, Err(CommandError::InvalidOption { .. })));
        assert!(io.take_sent().is_empty());

        controller
            .execute(
                &mut io,
                &Action::SetMacroName {
                    name: "Feature".to_string(),
                },
            )
            .unwrap();
        assert_eq!(io.take_sent(), vec!["sys.macro_name Feature"]);
    }

    #[test]
    fn test_not_connected() {
        let mut io = MockIo::new();
        let mut controller = ProcessorController::new(DeviceConfig::new("10.0.0.5", Model::Cp650));
        assert_eq!(
            controller.execute(&mut io, &Action::MuteOn),
            Err(CommandError::NotConnected)
        );
        assert!(io.take_sent().is_empty());
    }

    #[test]
    fn test_reconfigure_resets_target() {
        let (mut controller, mut io) = connected(Model::Cp650);
        feed(&mut controller, &mut io, "fader_level=72\r\n");
        controller
            .execute(&mut io, &Action::FaderIncreaseTimer { rate: 500 })
            .unwrap();
        io.take_sent();

        controller
            .reconfigure(&mut io, DeviceConfig::new("10.0.0.6", Model::Cp950))
            .unwrap();
        assert!(!controller.ramps().is_running(Direction::Increase));
        assert_eq!(controller.state().fader_level, 85);
        assert_eq!(controller.key(), "cp950@10.0.0.6:61408");

        controller.poll(&mut io);
        assert_eq!(io.take_sent(), vec!["sys.fader ?"]);
    }

    #[test]
    fn test_reconfigure_same_target_keeps_state() {
        let (mut controller, mut io) = connected(Model::Cp650);
        feed(&mut controller, &mut io, "fader_level=72\r\n");

        let mut config = DeviceConfig::new("10.0.0.5", Model::Cp650);
        config.verbose = true;
        controller.reconfigure(&mut io, config).unwrap();
        assert_eq!(controller.state().fader_level, 72);
    }

    #[test]
    fn test_verbose_logs_traffic_at_info() {
        let mut io = MockIo::new();
        let mut config = DeviceConfig::new("10.0.0.5", Model::Cp650);
        config.verbose = true;
        let mut controller = ProcessorController::new(config);
        controller.connect(&mut io).unwrap();
        controller.poll(&mut io);

        let logs = io.logs.borrow();
        assert!(logs
            .iter()
            .any(|l| l == "INFO cp650@10.0.0.5:61412: > all=?"));
    }

    #[test]
    fn test_shutdown_blocks_connect() {
        let (mut controller, mut io) = connected(Model::Cp650);
        controller.shutdown(&mut io);
        assert_eq!(controller.connection_state(), ConnectionState::ShuttingDown);
        assert_eq!(
            controller.connect(&mut io),
            Err(CommandError::NotConnected)
        );
    }
}
