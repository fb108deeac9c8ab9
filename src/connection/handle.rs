//! Handle and event types shared between the manager task and its users.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use url::Url;

use super::state::{ConnectionStatus, LinkState};
use crate::error::{AppResult, ControlError};
use crate::input::CommandSink;
use crate::protocol::Command;
use crate::settings::{DeviceSetting, DeviceSettings};

/// Notification emitted by the connection manager, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// The link moved to a new state.
    StateChanged(LinkState),
    /// The UI-facing status changed. Never emitted for an identical status.
    StatusChanged(ConnectionStatus),
    /// The device pushed a setting.
    Setting(DeviceSetting),
    /// The video stream was re-attached after an open.
    StreamReloaded(Url),
    /// A reconnect attempt will start after the given delay.
    ReconnectScheduled(Duration),
    /// A write failed; all session state was discarded.
    SessionReset,
}

#[derive(Debug)]
pub(crate) enum Request {
    Start,
    Send(Command),
    Stop,
}

/// Cloneable handle to a running connection manager.
///
/// Input adapters only ever `send`; opening and closing the link is the
/// manager's business. Dropping the last handle shuts the manager down.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    pub(crate) requests: mpsc::UnboundedSender<Request>,
    pub(crate) events: broadcast::Sender<ControlEvent>,
    pub(crate) status: watch::Receiver<ConnectionStatus>,
    pub(crate) state: watch::Receiver<LinkState>,
    pub(crate) settings: watch::Receiver<DeviceSettings>,
}

impl ControlHandle {
    /// Start connecting. No effect unless the manager is `Idle`.
    pub fn start(&self) -> AppResult<()> {
        self.request(Request::Start)
    }

    /// Close the link and stay `Idle` (no reconnect).
    pub fn stop(&self) -> AppResult<()> {
        self.request(Request::Stop)
    }

    /// Queue a command for the car.
    ///
    /// Dropped with a diagnostic if the link is not open when the manager
    /// processes it.
    pub fn send(&self, command: Command) -> AppResult<()> {
        self.request(Request::Send(command))
    }

    /// Subscribe to manager events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Current UI-facing status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watch the UI-facing status.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Current link state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Watch the link state.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Last settings the device announced on the current link.
    #[must_use]
    pub fn settings(&self) -> DeviceSettings {
        *self.settings.borrow()
    }

    /// Wait until the link is open, up to `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> AppResult<()> {
        let mut status = self.status.clone();
        let result = match tokio::time::timeout(timeout, status.wait_for(|s| s.connected)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ControlError::ManagerClosed),
            Err(_) => Err(ControlError::ConnectTimeout(timeout)),
        };
        result
    }

    fn request(&self, request: Request) -> AppResult<()> {
        self.requests
            .send(request)
            .map_err(|_| ControlError::ManagerClosed)
    }
}

impl CommandSink for ControlHandle {
    fn send_command(&self, command: Command) {
        if let Err(e) = self.send(command) {
            tracing::warn!(command = %command, "Command not delivered: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::connection::ConnectionManager;
    use crate::endpoint::DeviceEndpoint;
    use crate::stream::StreamSlot;
    use crate::transport::mock::MockConnector;

    fn detached_handle() -> ControlHandle {
        let endpoint = DeviceEndpoint::new("car.local").unwrap();
        let (manager, handle) = ConnectionManager::new(
            Default::default(),
            &endpoint,
            MockConnector::new(),
            StreamSlot::new(),
        )
        .unwrap();
        drop(manager);
        handle
    }

    #[test]
    fn requests_fail_once_manager_is_gone() {
        let handle = detached_handle();
        assert!(matches!(handle.start(), Err(ControlError::ManagerClosed)));
        assert!(matches!(
            handle.send(Command::ToggleFlash),
            Err(ControlError::ManagerClosed)
        ));
        assert_eq!(handle.state(), LinkState::Idle);
        assert_eq!(handle.status(), ConnectionStatus::disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_connected_fails_once_manager_is_gone() {
        let handle = detached_handle();
        assert!(matches!(
            handle.wait_connected(Duration::from_secs(1)).await,
            Err(ControlError::ManagerClosed)
        ));
    }

    #[traced_test]
    #[test]
    fn command_sink_reports_undelivered_commands() {
        let handle = detached_handle();
        handle.send_command(Command::ToggleFlash);
        assert!(logs_contain("Command not delivered"));
    }
}
