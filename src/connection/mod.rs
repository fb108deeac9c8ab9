//! Connection manager: the control channel's state machine.
//!
//! One task owns the link to the car and everything whose lifetime is tied to
//! it:
//! - the handshake (bounded by `connect_timeout`)
//! - the heartbeat interval and its missed-pong counter
//! - the delayed video-stream re-attach after every open
//! - the fixed reconnect backoff after every close
//!
//! Each state is one async method that owns its timers as locals. Leaving the
//! state drops them, so a heartbeat or backoff can never fire against a link
//! that has already been replaced. Other components talk to the task through
//! a cloneable [`ControlHandle`] and observe it through [`ControlEvent`]s and
//! `watch` snapshots.
//!
//! # Liveness
//!
//! Every heartbeat tick sends a `ping`, then increments the missed-pong
//! counter. Once the counter reaches the threshold the link is force-closed
//! without waiting for the transport to notice, which bounds detection of a
//! silent peer to `interval * max_missed_pongs`. Any `pong-` frame resets the
//! counter and carries the device's signal reading.
//!
//! # Write failures
//!
//! A failed write means the session is in an unknown state. The manager
//! resets it: closes the link, discards device settings, signal and stream,
//! emits [`ControlEvent::SessionReset`] and goes through the normal
//! reconnect path.

mod handle;
mod state;

pub use handle::{ControlEvent, ControlHandle};
pub use state::{
    ConnectionStatus, HeartbeatConfig, HeartbeatState, HeartbeatVerdict, LinkState,
    ManagerConfig, ReconnectConfig,
};

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

use handle::Request;

use crate::endpoint::DeviceEndpoint;
use crate::error::{AppResult, ControlError};
use crate::protocol::{Command, DeviceMessage};
use crate::settings::{DeviceSetting, DeviceSettings};
use crate::stream::VideoStream;
use crate::transport::{Connector, Link, TransportEvent};

const EVENT_CAPACITY: usize = 64;

enum Phase {
    Idle,
    Connecting,
    Open(Link),
    Closed,
    Shutdown,
}

/// The connection manager task.
///
/// ```rust,ignore
/// let (manager, handle) = ConnectionManager::new(
///     ManagerConfig::default(),
///     &DeviceEndpoint::new("car.local")?,
///     WebSocketConnector::new(),
///     StreamSlot::new(),
/// )?;
/// manager.spawn();
/// handle.start()?;
/// handle.send(Command::ToggleFlash)?;
/// ```
pub struct ConnectionManager<C, S> {
    config: ManagerConfig,
    control_url: Url,
    stream_url: Url,
    connector: Arc<C>,
    stream: S,
    requests: mpsc::UnboundedReceiver<Request>,
    events: broadcast::Sender<ControlEvent>,
    status: watch::Sender<ConnectionStatus>,
    state: watch::Sender<LinkState>,
    settings: watch::Sender<DeviceSettings>,
}

impl<C: Connector, S: VideoStream> ConnectionManager<C, S> {
    /// Create an idle manager and the first handle to it.
    pub fn new(
        config: ManagerConfig,
        endpoint: &DeviceEndpoint,
        connector: C,
        stream: S,
    ) -> AppResult<(Self, ControlHandle)> {
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, status_rx) = watch::channel(ConnectionStatus::disconnected());
        let (state, state_rx) = watch::channel(LinkState::Idle);
        let (settings, settings_rx) = watch::channel(DeviceSettings::default());

        let handle = ControlHandle {
            requests: requests_tx,
            events: events.clone(),
            status: status_rx,
            state: state_rx,
            settings: settings_rx,
        };

        let manager = Self {
            config,
            control_url: endpoint.control_url()?,
            stream_url: endpoint.stream_url()?,
            connector: Arc::new(connector),
            stream,
            requests,
            events,
            status,
            state,
            settings,
        };
        Ok((manager, handle))
    }

    /// Run the manager on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the state machine until every handle is dropped.
    pub async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Connecting => self.connecting().await,
                Phase::Open(link) => self.open(link).await,
                Phase::Closed => self.closed().await,
                Phase::Shutdown => break,
            };
        }
        self.set_state(LinkState::Idle);
        self.publish_status(ConnectionStatus::disconnected());
        tracing::debug!("Connection manager stopped");
    }

    async fn idle(&mut self) -> Phase {
        self.set_state(LinkState::Idle);
        loop {
            match self.requests.recv().await {
                Some(Request::Start) => return Phase::Connecting,
                Some(Request::Send(command)) => {
                    tracing::warn!(command = %command, "No open connection, command dropped; connecting");
                    return Phase::Connecting;
                }
                Some(Request::Stop) => tracing::debug!("Stop requested while idle"),
                None => return Phase::Shutdown,
            }
        }
    }

    async fn connecting(&mut self) -> Phase {
        self.set_state(LinkState::Connecting);
        tracing::info!(url = %self.control_url, "Connecting to car");

        let connector = Arc::clone(&self.connector);
        let url = self.control_url.clone();
        let timeout = self.config.reconnect.connect_timeout;
        let attempt = async move {
            match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(ControlError::ConnectTimeout(timeout)),
            }
        };
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok(link) => Phase::Open(link),
                        Err(e) => {
                            tracing::warn!("Connection to {} failed: {}", self.control_url, e);
                            self.mark_closed();
                            Phase::Closed
                        }
                    };
                }
                request = self.requests.recv() => {
                    if let Some(next) = self.offline_request(request) {
                        return next;
                    }
                }
            }
        }
    }

    async fn open(&mut self, mut link: Link) -> Phase {
        self.set_state(LinkState::Open);
        self.publish_status(ConnectionStatus::connected());
        tracing::info!(url = %self.control_url, "Control channel open");

        // Force the device to start a fresh stream instead of resuming a stale one.
        self.stream.detach();
        let reload = tokio::time::sleep(self.config.stream_reload_delay);
        tokio::pin!(reload);
        let mut reload_pending = true;

        let period = self.config.heartbeat.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = HeartbeatState::new(self.config.heartbeat.max_missed_pongs);

        loop {
            tokio::select! {
                () = &mut reload, if reload_pending => {
                    reload_pending = false;
                    self.stream.attach(&self.stream_url);
                    self.emit(ControlEvent::StreamReloaded(self.stream_url.clone()));
                }
                _ = ticker.tick() => {
                    if let Err(e) = link.send_text(&Command::Ping.encode()) {
                        return self.reset_session(link, &e);
                    }
                    if heartbeat.on_tick() == HeartbeatVerdict::Expired {
                        tracing::warn!(
                            missed = heartbeat.missed_pongs(),
                            "Too many missed pongs, reconnecting"
                        );
                        return self.close_link(link);
                    }
                }
                event = link.next_event() => {
                    match event {
                        Some(TransportEvent::Message(text)) => self.on_message(&text, &mut heartbeat),
                        Some(TransportEvent::Error(reason)) => {
                            tracing::warn!("Control channel error: {}", reason);
                            return self.close_link(link);
                        }
                        Some(TransportEvent::Closed) | None => {
                            tracing::info!("Control channel closed by peer");
                            return self.close_link(link);
                        }
                    }
                }
                request = self.requests.recv() => {
                    match request {
                        Some(Request::Send(command)) => {
                            let text = command.encode();
                            tracing::debug!(command = %text, "Sending command");
                            if let Err(e) = link.send_text(&text) {
                                return self.reset_session(link, &e);
                            }
                        }
                        Some(Request::Start) => tracing::debug!("Start requested while open"),
                        Some(Request::Stop) => {
                            tracing::info!("Stopping control channel");
                            self.release_link(link);
                            return Phase::Idle;
                        }
                        None => {
                            self.release_link(link);
                            return Phase::Shutdown;
                        }
                    }
                }
            }
        }
    }

    async fn closed(&mut self) -> Phase {
        let delay = self.config.reconnect.delay;
        tracing::info!("Reconnecting in {:.1}s", delay.as_secs_f64());
        self.emit(ControlEvent::ReconnectScheduled(delay));

        let backoff = tokio::time::sleep(delay);
        tokio::pin!(backoff);

        loop {
            tokio::select! {
                () = &mut backoff => return Phase::Connecting,
                request = self.requests.recv() => {
                    if let Some(next) = self.offline_request(request) {
                        return next;
                    }
                }
            }
        }
    }

    /// Requests that arrive while `Connecting` or `Closed`.
    fn offline_request(&mut self, request: Option<Request>) -> Option<Phase> {
        match request {
            Some(Request::Send(command)) => {
                let state = *self.state.borrow();
                tracing::warn!(command = %command, state = %state, "No open connection, command dropped");
                None
            }
            Some(Request::Start) => {
                let state = *self.state.borrow();
                tracing::debug!(state = %state, "Connection already pending");
                None
            }
            Some(Request::Stop) => {
                tracing::info!("Stopping, pending reconnect cancelled");
                self.publish_status(ConnectionStatus::disconnected());
                Some(Phase::Idle)
            }
            None => Some(Phase::Shutdown),
        }
    }

    fn on_message(&mut self, text: &str, heartbeat: &mut HeartbeatState) {
        let message = DeviceMessage::parse(text);

        if let DeviceMessage::Pong { signal, .. } = &message {
            heartbeat.on_pong();
            self.publish_status(ConnectionStatus {
                connected: true,
                signal: *signal,
            });
        }

        match DeviceSetting::from_message(&message) {
            Some(setting) => self.apply_setting(setting),
            None if !message.is_pong() => {
                tracing::debug!(message = text, "Ignoring unrecognized device message");
            }
            None => {}
        }
    }

    fn apply_setting(&mut self, setting: DeviceSetting) {
        if self.settings.send_if_modified(|settings| settings.apply(setting)) {
            tracing::debug!(?setting, "Device setting updated");
            self.emit(ControlEvent::Setting(setting));
        }
    }

    /// Force-close after a failure; a reconnect follows.
    fn close_link(&mut self, mut link: Link) -> Phase {
        link.close();
        self.mark_closed();
        Phase::Closed
    }

    /// Close on request; no reconnect follows.
    fn release_link(&mut self, mut link: Link) {
        link.close();
        self.publish_status(ConnectionStatus::disconnected());
        self.clear_settings();
    }

    fn reset_session(&mut self, link: Link, error: &ControlError) -> Phase {
        tracing::error!("Write to control channel failed, resetting session: {}", error);
        let next = self.close_link(link);
        self.stream.detach();
        self.emit(ControlEvent::SessionReset);
        next
    }

    fn mark_closed(&mut self) {
        self.set_state(LinkState::Closed);
        self.publish_status(ConnectionStatus::disconnected());
        self.clear_settings();
    }

    fn clear_settings(&mut self) {
        self.settings.send_if_modified(|settings| {
            let had_any = *settings != DeviceSettings::default();
            settings.clear();
            had_any
        });
    }

    fn set_state(&mut self, state: LinkState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::debug!(state = %state, "Link state changed");
            self.emit(ControlEvent::StateChanged(state));
        }
    }

    /// Publish only real changes; observers never see a repeated status.
    fn publish_status(&mut self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            self.emit(ControlEvent::StatusChanged(status));
        }
    }

    fn emit(&self, event: ControlEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
