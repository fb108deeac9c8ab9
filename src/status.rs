//! Status presenter.
//!
//! Turns connection-manager events into what the user sees: a connection
//! banner, the enabled state of the controls, the WiFi signal indicator and
//! the device-pushed settings. Rendering goes through the [`StatusView`]
//! trait; [`ConsoleView`] prints to a terminal.
//!
//! The banner is re-rendered only when the connected flag actually changes,
//! so a stream of pongs never flickers it. The connected banner hides itself
//! after `hide_delay`; the disconnected banner stays until the next change.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::connection::{ConnectionStatus, ControlEvent};
use crate::protocol::{SignalStrength, WifiMode};
use crate::settings::DeviceSetting;

/// Default time the connected banner stays visible.
pub const DEFAULT_HIDE_DELAY: Duration = Duration::from_secs(3);

/// Banner text while connected.
pub const CONNECTED_TEXT: &str = "🟢 Connected ✅";

/// Banner text while disconnected.
pub const DISCONNECTED_TEXT: &str = "🔴 Disconnected ❌";

/// Coarse signal quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalQuality {
    /// Attenuation up to 55 dB.
    Excellent,
    /// Up to 75 dB.
    Good,
    /// Up to 85 dB.
    Weak,
    /// Anything weaker.
    Poor,
}

impl SignalQuality {
    /// Bucket a reading.
    #[must_use]
    pub fn from_signal(signal: SignalStrength) -> Self {
        match signal.attenuation() {
            0..=55 => Self::Excellent,
            56..=75 => Self::Good,
            76..=85 => Self::Weak,
            _ => Self::Poor,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Weak => "weak",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the signal indicator shows for one reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalIndicator {
    /// Quality bucket.
    pub quality: SignalQuality,
    /// Text such as `-48dBm`.
    pub label: String,
}

impl SignalIndicator {
    /// Indicator for a reading; `None` hides the indicator.
    #[must_use]
    pub fn from_reading(signal: Option<SignalStrength>) -> Option<Self> {
        signal.map(|signal| Self {
            quality: SignalQuality::from_signal(signal),
            label: format!("{}dBm", signal.dbm()),
        })
    }
}

/// Connection banner variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    /// Link open.
    Connected,
    /// Link down.
    Disconnected,
}

impl Banner {
    /// User-facing text.
    #[must_use]
    pub fn text(&self) -> &'static str {
        match self {
            Self::Connected => CONNECTED_TEXT,
            Self::Disconnected => DISCONNECTED_TEXT,
        }
    }
}

/// Output surface of the presenter.
pub trait StatusView: Send {
    /// Show the banner (replacing whatever is shown).
    fn show_banner(&mut self, banner: Banner);

    /// Hide the banner.
    fn hide_banner(&mut self);

    /// Enable or disable the car controls.
    fn set_controls_enabled(&mut self, enabled: bool);

    /// Show the signal indicator, or hide it with `None`.
    fn show_signal(&mut self, indicator: Option<&SignalIndicator>);

    /// Reflect a device-pushed setting.
    fn show_setting(&mut self, setting: DeviceSetting);
}

/// Drives a [`StatusView`] from connection status and device settings.
#[derive(Debug)]
pub struct StatusPresenter<V> {
    view: V,
    hide_delay: Duration,
    hide_at: Option<Instant>,
    last_connected: Option<bool>,
    last_signal: Option<SignalStrength>,
}

impl<V: StatusView> StatusPresenter<V> {
    /// Presenter with controls disabled and nothing rendered yet.
    pub fn new(mut view: V, hide_delay: Duration) -> Self {
        view.set_controls_enabled(false);
        Self {
            view,
            hide_delay,
            hide_at: None,
            last_connected: None,
            last_signal: None,
        }
    }

    /// The view being driven.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// When the connected banner is due to hide.
    #[must_use]
    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    /// Render a status snapshot.
    pub fn render_status(&mut self, status: ConnectionStatus) {
        if self.last_connected != Some(status.connected) {
            self.last_connected = Some(status.connected);
            self.view.set_controls_enabled(status.connected);
            if status.connected {
                self.view.show_banner(Banner::Connected);
                self.hide_at = Some(Instant::now() + self.hide_delay);
            } else {
                self.view.show_banner(Banner::Disconnected);
                self.hide_at = None;
            }
        }

        if self.last_signal != status.signal {
            self.last_signal = status.signal;
            let indicator = SignalIndicator::from_reading(status.signal);
            self.view.show_signal(indicator.as_ref());
        }
    }

    /// Render a device-pushed setting.
    pub fn render_setting(&mut self, setting: DeviceSetting) {
        self.view.show_setting(setting);
    }

    /// Hide the connected banner if its time has come.
    pub fn hide_if_due(&mut self, now: Instant) {
        if self.hide_at.is_some_and(|at| at <= now) {
            self.hide_at = None;
            self.view.hide_banner();
        }
    }

    /// Apply one manager event.
    pub fn handle(&mut self, event: &ControlEvent) {
        match event {
            ControlEvent::StatusChanged(status) => self.render_status(*status),
            ControlEvent::Setting(setting) => self.render_setting(*setting),
            _ => {}
        }
    }

    /// Follow the manager until its event stream ends.
    ///
    /// `status` is the manager's status snapshot; the presenter re-renders
    /// from it whenever it falls behind the event stream.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<ControlEvent>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> V {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle(&event),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Status presenter lagged by {} events, resyncing", n);
                        let latest = *status.borrow();
                        self.render_status(latest);
                    }
                    Err(RecvError::Closed) => break,
                },
                () = hide_due(self.hide_at) => self.hide_if_due(Instant::now()),
            }
        }
        self.view
    }
}

async fn hide_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Line-oriented view for terminals.
pub struct ConsoleView<W> {
    out: W,
}

impl ConsoleView<std::io::Stdout> {
    /// View printing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleView<W> {
    /// View printing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::debug!("Console write failed: {}", e);
        }
    }
}

impl<W: Write + Send> StatusView for ConsoleView<W> {
    fn show_banner(&mut self, banner: Banner) {
        self.line(format_args!("{}", banner.text()));
    }

    fn hide_banner(&mut self) {}

    fn set_controls_enabled(&mut self, enabled: bool) {
        tracing::debug!(enabled, "Controls toggled");
    }

    fn show_signal(&mut self, indicator: Option<&SignalIndicator>) {
        if let Some(indicator) = indicator {
            self.line(format_args!("📶 {} ({})", indicator.label, indicator.quality));
        }
    }

    fn show_setting(&mut self, setting: DeviceSetting) {
        match setting {
            DeviceSetting::Flash(on) => {
                self.line(format_args!("💡 Flash {}", if on { "ON" } else { "OFF" }));
            }
            DeviceSetting::FrameSize(size) => {
                let (width, height) = size.dimensions();
                self.line(format_args!("🖼️  Frame size {size} ({width}x{height})"));
            }
            DeviceSetting::Wifi(WifiMode::Station) => {
                self.line(format_args!("📡 WiFi station mode ('wifi' switches to AP)"));
            }
            DeviceSetting::Wifi(WifiMode::AccessPoint) => {
                self.line(format_args!("📡 WiFi access-point mode ('wifi' opens network setup)"));
            }
        }
    }
}

impl<W> fmt::Debug for ConsoleView<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleView").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameSize;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Banner(Banner),
        Hide,
        Controls(bool),
        Signal(Option<SignalIndicator>),
        Setting(DeviceSetting),
    }

    #[derive(Debug, Default)]
    struct RecordingView {
        calls: Vec<Call>,
    }

    impl StatusView for RecordingView {
        fn show_banner(&mut self, banner: Banner) {
            self.calls.push(Call::Banner(banner));
        }
        fn hide_banner(&mut self) {
            self.calls.push(Call::Hide);
        }
        fn set_controls_enabled(&mut self, enabled: bool) {
            self.calls.push(Call::Controls(enabled));
        }
        fn show_signal(&mut self, indicator: Option<&SignalIndicator>) {
            self.calls.push(Call::Signal(indicator.cloned()));
        }
        fn show_setting(&mut self, setting: DeviceSetting) {
            self.calls.push(Call::Setting(setting));
        }
    }

    fn with_signal(db: u16) -> ConnectionStatus {
        ConnectionStatus {
            connected: true,
            signal: SignalStrength::from_attenuation(db),
        }
    }

    #[test]
    fn quality_thresholds() {
        let quality = |db| SignalIndicator::from_reading(SignalStrength::from_attenuation(db));
        assert_eq!(quality(0), None);
        assert_eq!(quality(55).unwrap().quality, SignalQuality::Excellent);
        assert_eq!(quality(56).unwrap().quality, SignalQuality::Good);
        assert_eq!(quality(75).unwrap().quality, SignalQuality::Good);
        assert_eq!(quality(85).unwrap().quality, SignalQuality::Weak);
        assert_eq!(quality(86).unwrap().quality, SignalQuality::Poor);
        assert_eq!(quality(48).unwrap().label, "-48dBm");
    }

    #[tokio::test(start_paused = true)]
    async fn banner_renders_once_per_connected_change() {
        let mut presenter = StatusPresenter::new(RecordingView::default(), DEFAULT_HIDE_DELAY);

        presenter.render_status(ConnectionStatus::connected());
        presenter.render_status(ConnectionStatus::connected());
        presenter.render_status(with_signal(48));
        presenter.render_status(with_signal(48));
        presenter.render_status(ConnectionStatus::disconnected());
        presenter.render_status(ConnectionStatus::disconnected());

        let indicator = SignalIndicator::from_reading(SignalStrength::from_attenuation(48));
        assert_eq!(
            presenter.view().calls,
            vec![
                Call::Controls(false),
                Call::Controls(true),
                Call::Banner(Banner::Connected),
                Call::Signal(indicator),
                Call::Controls(false),
                Call::Banner(Banner::Disconnected),
                Call::Signal(None),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connected_banner_hides_and_disconnect_cancels_hide() {
        let mut presenter = StatusPresenter::new(RecordingView::default(), DEFAULT_HIDE_DELAY);
        presenter.render_status(ConnectionStatus::connected());
        let deadline = presenter.hide_deadline().unwrap();

        presenter.hide_if_due(deadline - Duration::from_millis(1));
        assert!(!presenter.view().calls.contains(&Call::Hide));

        presenter.render_status(ConnectionStatus::disconnected());
        assert_eq!(presenter.hide_deadline(), None);
        presenter.hide_if_due(deadline);
        assert!(!presenter.view().calls.contains(&Call::Hide));

        presenter.render_status(ConnectionStatus::connected());
        let deadline = presenter.hide_deadline().unwrap();
        presenter.hide_if_due(deadline);
        assert_eq!(presenter.view().calls.last(), Some(&Call::Hide));
    }

    #[tokio::test(start_paused = true)]
    async fn run_follows_events_and_hides_banner() {
        let (tx, rx) = broadcast::channel(16);
        let (_status_tx, status_rx) = watch::channel(ConnectionStatus::connected());
        let presenter = StatusPresenter::new(RecordingView::default(), DEFAULT_HIDE_DELAY);
        let task = tokio::spawn(presenter.run(rx, status_rx));

        tx.send(ControlEvent::StatusChanged(ConnectionStatus::connected()))
            .unwrap();
        tx.send(ControlEvent::Setting(DeviceSetting::FrameSize(FrameSize::Vga)))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        drop(tx);

        let view = task.await.unwrap();
        assert_eq!(
            view.calls,
            vec![
                Call::Controls(false),
                Call::Controls(true),
                Call::Banner(Banner::Connected),
                Call::Setting(DeviceSetting::FrameSize(FrameSize::Vga)),
                Call::Hide,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lagging_presenter_resyncs_from_status_snapshot() {
        let (tx, rx) = broadcast::channel(1);
        let (_status_tx, status_rx) = watch::channel(with_signal(48));

        // Capacity 1: the status change is overwritten before the presenter runs.
        tx.send(ControlEvent::StatusChanged(with_signal(48))).unwrap();
        tx.send(ControlEvent::Setting(DeviceSetting::Flash(true)))
            .unwrap();
        let presenter = StatusPresenter::new(RecordingView::default(), DEFAULT_HIDE_DELAY);
        let task = tokio::spawn(presenter.run(rx, status_rx));
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(tx);

        let view = task.await.unwrap();
        let indicator = SignalIndicator::from_reading(SignalStrength::from_attenuation(48));
        assert_eq!(
            view.calls,
            vec![
                Call::Controls(false),
                Call::Controls(true),
                Call::Banner(Banner::Connected),
                Call::Signal(indicator),
                Call::Setting(DeviceSetting::Flash(true)),
            ]
        );
    }

    #[test]
    fn console_view_prints_banner_texts() {
        let mut view = ConsoleView::new(Vec::new());
        view.show_banner(Banner::Connected);
        view.show_banner(Banner::Disconnected);
        view.show_signal(SignalIndicator::from_reading(SignalStrength::from_attenuation(90)).as_ref());
        view.show_setting(DeviceSetting::Flash(true));

        let text = String::from_utf8(view.into_inner()).unwrap();
        assert_eq!(
            text,
            "🟢 Connected ✅\n🔴 Disconnected ❌\n📶 -90dBm (poor)\n💡 Flash ON\n"
        );
    }
}
