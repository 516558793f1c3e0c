//! Processor service: runs a [`ProcessorController`] inside a tokio subsystem.
//!
//! The service is the only owner of the controller and its sockets. Everything
//! else talks to it through a cloneable [`ProcessorHandle`]: actions and
//! reconfiguration go in over an mpsc channel, [`StateUpdate`]s come out on a
//! broadcast channel.
//!
//! ```rust,ignore
//! let (service, handle) = ProcessorService::new(config, true);
//! subsys.start(SubsystemBuilder::new("processor", |s| service.run(s)));
//!
//! let mut updates = handle.subscribe();
//! handle.execute(Action::MuteToggle).await?;
//! while let Ok(update) = updates.recv().await {
//!     println!("{}", update.variables.fader_level);
//! }
//! ```

use std::io::Write;
use std::time::Duration;

use cinema_core::{
    Action, CommandError, ConnectionState, ControllerEvent, DeviceConfig, FeedbackId,
    IoProvider, ProcessorController, Variables,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::socket_io::SocketIoProvider;

/// How often the controller is polled
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

const REQUEST_QUEUE_SIZE: usize = 32;
const UPDATE_QUEUE_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Command(#[from] CommandError),
    #[error("Processor service has stopped")]
    Closed,
    #[error("I/O operation failed")]
    Io(#[from] std::io::Error),
    #[error("Cannot serialize state update")]
    Json(#[from] serde_json::Error),
}

/// Outcome channel of a request
pub type Reply = oneshot::Sender<Result<(), CommandError>>;

/// Requests from handles to the service
#[derive(Debug)]
pub enum ServiceRequest {
    Action { action: Action, reply: Option<Reply> },
    Reconfigure { config: DeviceConfig, reply: Option<Reply> },
}

/// Snapshot published for every connection status event and after state
/// changes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateUpdate {
    /// `<model>@<host>:<port>`
    pub key: String,
    pub status: ConnectionState,
    /// Reason for the last error or disconnect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub variables: Variables,
    /// The `mute_status` feedback
    pub muted: bool,
}

impl StateUpdate {
    fn new(
        controller: &ProcessorController,
        status: ConnectionState,
        message: Option<String>,
    ) -> Self {
        StateUpdate {
            key: controller.key().to_string(),
            status,
            message,
            variables: controller.state().to_variables(),
            muted: controller.state().feedback(FeedbackId::MuteStatus),
        }
    }
}

/// Cloneable front end of a running [`ProcessorService`]
#[derive(Clone, Debug)]
pub struct ProcessorHandle {
    request_tx: mpsc::Sender<ServiceRequest>,
    update_tx: broadcast::Sender<StateUpdate>,
}

impl ProcessorHandle {
    /// Run an action and wait for the outcome
    pub async fn execute(&self, action: Action) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.request(ServiceRequest::Action {
            action,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| ServiceError::Closed)??;
        Ok(())
    }

    /// Switch the service to a new configuration and wait until the new
    /// connection attempt has started
    pub async fn reconfigure(&self, config: DeviceConfig) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.request(ServiceRequest::Reconfigure {
            config,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| ServiceError::Closed)??;
        Ok(())
    }

    async fn request(&self, request: ServiceRequest) -> Result<(), ServiceError> {
        self.request_tx
            .send(request)
            .await
            .map_err(|_| ServiceError::Closed)
    }

    /// Receive every [`StateUpdate`] published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.update_tx.subscribe()
    }
}

/// Owns the controller and drives it from the tokio runtime
pub struct ProcessorService {
    controller: ProcessorController,
    io: SocketIoProvider,
    /// Reconnect after transport failures
    reconnect: bool,
    poll_interval: Duration,
    request_rx: mpsc::Receiver<ServiceRequest>,
    update_tx: broadcast::Sender<StateUpdate>,
    /// When the next reconnect attempt is due
    retry_at_ms: Option<u64>,
}

impl ProcessorService {
    pub fn new(config: DeviceConfig, reconnect: bool) -> (Self, ProcessorHandle) {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let (update_tx, _) = broadcast::channel(UPDATE_QUEUE_SIZE);

        let service = ProcessorService {
            controller: ProcessorController::new(config),
            io: SocketIoProvider::new(),
            reconnect,
            poll_interval: POLL_INTERVAL,
            request_rx,
            update_tx: update_tx.clone(),
            retry_at_ms: None,
        };
        let handle = ProcessorHandle {
            request_tx,
            update_tx,
        };
        (service, handle)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn key(&self) -> &str {
        self.controller.key()
    }

    /// Run until shutdown is requested.
    pub async fn run(mut self, subsys: SubsystemHandle) -> Result<(), ServiceError> {
        log::info!("{}: Starting processor service", self.key());

        self.connect();

        let mut poll_timer = interval(self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::info!("{}: Shutdown requested", self.key());
                    break;
                }
                _ = poll_timer.tick() => {
                    self.poll();
                }
                Some(request) = self.request_rx.recv() => {
                    self.handle_request(request);
                    self.poll();
                }
            }
        }

        self.controller.shutdown(&mut self.io);
        let events = self.controller.poll(&mut self.io);
        self.handle_events(events);

        log::info!("{}: Processor service finished", self.key());
        Ok(())
    }

    fn connect(&mut self) {
        self.retry_at_ms = None;
        let result = self.controller.connect(&mut self.io);
        self.log_connect_result(result);
    }

    fn log_connect_result(&self, result: Result<(), CommandError>) {
        match result {
            Ok(()) => {}
            Err(CommandError::Config(e)) => {
                log::error!("{}: {}, not connecting", self.key(), e);
            }
            // Transport failures come back as a status event and are retried there
            Err(e) => log::debug!("{}: Connect failed: {}", self.key(), e),
        }
    }

    fn poll(&mut self) {
        if let Some(at) = self.retry_at_ms {
            if self.io.current_time_ms() >= at {
                log::info!("{}: Reconnecting", self.key());
                self.connect();
            }
        }

        let events = self.controller.poll(&mut self.io);
        self.handle_events(events);
    }

    fn handle_request(&mut self, request: ServiceRequest) {
        match request {
            ServiceRequest::Action { action, reply } => {
                let result = self.controller.execute(&mut self.io, &action);
                if let Err(e) = &result {
                    log::warn!("{}: {} failed: {}", self.key(), action.name(), e);
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            ServiceRequest::Reconfigure { config, reply } => {
                self.retry_at_ms = None;
                let result = self.controller.reconfigure(&mut self.io, config);
                self.log_connect_result(result.clone());
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        }
    }

    /// Publish one update per status event, in order, and one more for
    /// state changes that came after the last of them.
    fn handle_events(&mut self, events: Vec<ControllerEvent>) {
        let mut state_changed = false;

        for event in events {
            match event {
                ControllerEvent::StatusChanged { state, message } => {
                    log::debug!("{}: Status {}", self.key(), state);
                    if state == ConnectionState::Error {
                        self.schedule_reconnect();
                    }
                    self.publish(StateUpdate::new(&self.controller, state, message));
                    state_changed = false;
                }
                ControllerEvent::StateChanged { changed } => {
                    log::debug!("{}: Changed {:?}", self.key(), changed);
                    state_changed = true;
                }
                ControllerEvent::FeedbackChanged(id) => {
                    log::debug!("{}: Feedback {} changed", self.key(), id.as_str());
                }
                // Already logged by the controller
                ControllerEvent::Error { .. } => {}
            }
        }

        if state_changed {
            let status = self.controller.connection_state();
            self.publish(StateUpdate::new(&self.controller, status, None));
        }
    }

    fn publish(&self, update: StateUpdate) {
        // Nobody listening is fine
        let _ = self.update_tx.send(update);
    }

    fn schedule_reconnect(&mut self) {
        if !self.reconnect || self.retry_at_ms.is_some() {
            return;
        }
        let backoff = self.controller.connection().backoff_ms();
        log::info!("{}: Reconnecting in {} ms", self.key(), backoff);
        self.retry_at_ms = Some(self.io.current_time_ms() + backoff);
    }
}

/// Print every state update as one JSON line on stdout.
pub async fn forward_output(handle: ProcessorHandle, subsys: SubsystemHandle) -> Result<(), ServiceError> {
    let mut rx = handle.subscribe();

    loop {
        tokio::select! { biased;
            _ = subsys.on_shutdown_requested() => {
                return Ok(());
            },
            r = rx.recv() => {
                match r {
                    Ok(update) => {
                        let mut line = serde_json::to_vec(&update)?;
                        line.push(b'\n');
                        let mut stdout = std::io::stdout().lock();
                        if let Err(e) = stdout.write_all(&line).and_then(|_| stdout.flush()) {
                            subsys.request_shutdown();
                            return Err(e.into());
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("stdout: skipped {} state updates", n);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Ok(());
                    }
                };
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinema_core::{ChangedFields, Model};
    use std::net::TcpListener;
    use std::time::Instant;

    /// Config for a localhost port nobody listens on
    fn closed_port_config() -> DeviceConfig {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        DeviceConfig::new("127.0.0.1", Model::Cp850).with_port(port)
    }

    fn poll_until(service: &mut ProcessorService, mut done: impl FnMut(&ProcessorService) -> bool) {
        let start = Instant::now();
        while !done(&*service) {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out polling service");
            service.poll();
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn failures(service: &ProcessorService) -> u32 {
        service.controller.connection().failure_count()
    }

    #[test]
    fn test_state_update_json() {
        let controller = ProcessorController::new(DeviceConfig::new("10.0.0.5", Model::Cp950));
        let update = StateUpdate::new(&controller, controller.connection_state(), None);
        assert_eq!(update.key, "cp950@10.0.0.5:61408");
        assert!(!update.muted);

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "Disconnected");
        assert_eq!(json["variables"]["fader_level"], "8.5");
        assert!(json.get("message").is_none());
        assert!(json["variables"].get("mute_status").is_none());
    }

    #[tokio::test]
    async fn test_handle_without_service() {
        let (service, handle) =
            ProcessorService::new(DeviceConfig::new("10.0.0.5", Model::Cp650), false);
        drop(service);

        let result = handle.execute(Action::MuteOn).await;
        assert!(matches!(result, Err(ServiceError::Closed)));
    }

    #[test]
    fn test_config_error_is_not_retried() {
        let (mut service, handle) = ProcessorService::new(DeviceConfig::default(), true);
        let mut updates = handle.subscribe();

        service.connect();
        service.poll();

        assert_eq!(service.retry_at_ms, None);
        let update = updates.try_recv().unwrap();
        assert_eq!(update.status, ConnectionState::Disconnected);
        assert_eq!(update.message.as_deref(), Some("No host configured"));
    }

    #[test]
    fn test_transport_error_schedules_reconnect() {
        let (mut service, _handle) = ProcessorService::new(closed_port_config(), true);

        let before = service.io.current_time_ms();
        service.connect();
        poll_until(&mut service, |s| failures(s) == 1 && s.retry_at_ms.is_some());
        let after = service.io.current_time_ms();

        let backoff = service.controller.connection().backoff_ms();
        assert_eq!(backoff, 2000);
        let at = service.retry_at_ms.unwrap();
        assert!(at >= before + backoff && at <= after + backoff);

        // Not due yet
        service.poll();
        assert_eq!(failures(&service), 1);
        assert_eq!(service.retry_at_ms, Some(at));

        // Once the deadline passes the service connects again
        let due = service.io.current_time_ms();
        service.retry_at_ms = Some(due);
        poll_until(&mut service, |s| failures(s) == 2 && s.retry_at_ms.is_some());
        let next = service.retry_at_ms.unwrap();
        assert_eq!(service.controller.connection().backoff_ms(), 4000);
        assert!(next >= due + 4000);
    }

    #[test]
    fn test_no_reconnect_leaves_error() {
        let (mut service, _handle) = ProcessorService::new(closed_port_config(), false);

        service.connect();
        poll_until(&mut service, |s| {
            s.controller.connection_state() == ConnectionState::Error
        });
        for _ in 0..5 {
            service.poll();
        }
        assert_eq!(service.retry_at_ms, None);
        assert_eq!(failures(&service), 1);
        assert_eq!(service.controller.connection_state(), ConnectionState::Error);
    }

    #[test]
    fn test_every_status_is_published() {
        let (mut service, handle) =
            ProcessorService::new(DeviceConfig::new("10.0.0.5", Model::Cp650), false);
        let mut updates = handle.subscribe();

        service.handle_events(vec![
            ControllerEvent::StatusChanged {
                state: ConnectionState::Connecting,
                message: None,
            },
            ControllerEvent::StatusChanged {
                state: ConnectionState::Error,
                message: Some("Connection failed".to_string()),
            },
        ]);

        let first = updates.try_recv().unwrap();
        assert_eq!(first.status, ConnectionState::Connecting);
        assert_eq!(first.message, None);
        let second = updates.try_recv().unwrap();
        assert_eq!(second.status, ConnectionState::Error);
        assert_eq!(second.message.as_deref(), Some("Connection failed"));
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_state_changes_publish_once() {
        let (mut service, handle) =
            ProcessorService::new(DeviceConfig::new("10.0.0.5", Model::Cp650), false);
        let mut updates = handle.subscribe();

        service.handle_events(vec![
            ControllerEvent::StateChanged {
                changed: ChangedFields::FADER_LEVEL,
            },
            ControllerEvent::StateChanged {
                changed: ChangedFields::MUTE,
            },
        ]);
        let update = updates.try_recv().unwrap();
        assert_eq!(update.status, ConnectionState::Disconnected);
        assert!(updates.try_recv().is_err());

        // A status event already carries the new state
        service.handle_events(vec![
            ControllerEvent::StateChanged {
                changed: ChangedFields::FADER_LEVEL,
            },
            ControllerEvent::StatusChanged {
                state: ConnectionState::Disconnected,
                message: None,
            },
        ]);
        assert!(updates.try_recv().is_ok());
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_action_reply() {
        let (mut service, _handle) =
            ProcessorService::new(DeviceConfig::new("10.0.0.5", Model::Cp650), false);
        let (reply, mut rx) = oneshot::channel();

        service.handle_request(ServiceRequest::Action {
            action: Action::SetMacroPreset { preset: 2 },
            reply: Some(reply),
        });
        assert!(matches!(
            rx.try_recv(),
            Ok(Err(CommandError::UnsupportedAction { .. }))
        ));
    }
}
