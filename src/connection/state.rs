//! Connection state, liveness bookkeeping and manager configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::SignalStrength;

/// Lifecycle state of the control link.
///
/// ```text
/// Idle ──start()/send()──> Connecting ──handshake ok──> Open
///  ▲                          │  ▲                        │
///  │                   failure│  │backoff elapsed   error / close /
///  │                          ▼  │                  missed pongs
///  └──────stop()──────────── Closed <─────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    /// Not started, or stopped explicitly. No reconnect pending.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Link usable; heartbeat running.
    Open,
    /// Link gone; a reconnect is scheduled.
    Closed,
}

impl LinkState {
    /// True while a link exists or is being established.
    #[must_use]
    pub fn is_live_or_pending(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    /// Short label for display.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting...",
            Self::Open => "Open",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// UI-facing connection status. Only the connection manager writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Whether the control link is open.
    pub connected: bool,
    /// Most recent signal reading from a pong on the current link.
    pub signal: Option<SignalStrength>,
}

impl ConnectionStatus {
    /// Freshly opened link, no reading yet.
    #[must_use]
    pub fn connected() -> Self {
        Self {
            connected: true,
            signal: None,
        }
    }

    /// No link.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }
}

/// Heartbeat settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Probe period (P).
    pub interval: Duration,
    /// Consecutive unanswered ticks after which the link is declared dead.
    pub max_missed_pongs: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_missed_pongs: 2,
        }
    }
}

impl HeartbeatConfig {
    /// Worst-case time to notice a silent peer.
    #[must_use]
    pub fn detection_latency(&self) -> Duration {
        self.interval * self.max_missed_pongs
    }
}

/// Reconnect settings. The delay is fixed: the car is on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Wait between `Closed` and the next `Connecting`.
    pub delay: Duration,
    /// Upper bound for one handshake.
    pub connect_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything the connection manager needs to know about timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Heartbeat settings.
    pub heartbeat: HeartbeatConfig,
    /// Reconnect settings.
    pub reconnect: ReconnectConfig,
    /// Delay between opening the link and re-attaching the video stream.
    pub stream_reload_delay: Duration,
}

impl Default for ManagerConfig {
    /// Defaults matching the car firmware's web UI.
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectConfig::default(),
            stream_reload_delay: Duration::from_secs(1),
        }
    }
}

/// What a heartbeat tick asks the manager to do once its probe is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatVerdict {
    /// Keep the link and wait for a pong.
    Waiting,
    /// Too many probes went unanswered: force-close the link.
    Expired,
}

/// Missed-pong counter for one open link.
///
/// Lives exactly as long as the link is `Open`; the interval driving it is
/// owned by the same scope, so neither can outlive the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatState {
    missed_pongs: u32,
    max_missed_pongs: u32,
}

impl HeartbeatState {
    /// Counter at zero.
    #[must_use]
    pub fn new(max_missed_pongs: u32) -> Self {
        Self {
            missed_pongs: 0,
            max_missed_pongs: max_missed_pongs.max(1),
        }
    }

    /// Account for one elapsed period. Called after the tick's probe is sent.
    pub fn on_tick(&mut self) -> HeartbeatVerdict {
        self.missed_pongs = self.missed_pongs.saturating_add(1);
        if self.missed_pongs >= self.max_missed_pongs {
            HeartbeatVerdict::Expired
        } else {
            HeartbeatVerdict::Waiting
        }
    }

    /// Any liveness response resets the counter.
    pub fn on_pong(&mut self) {
        self.missed_pongs = 0;
    }

    /// Current count.
    #[must_use]
    pub fn missed_pongs(&self) -> u32 {
        self.missed_pongs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_expires_at_threshold() {
        let mut heartbeat = HeartbeatState::new(2);
        assert_eq!(heartbeat.on_tick(), HeartbeatVerdict::Waiting);
        assert_eq!(heartbeat.on_tick(), HeartbeatVerdict::Expired);
    }

    #[test]
    fn pong_resets_counter_from_any_value() {
        let mut heartbeat = HeartbeatState::new(10);
        for ticks in 0..9 {
            for _ in 0..ticks {
                heartbeat.on_tick();
            }
            heartbeat.on_pong();
            assert_eq!(heartbeat.missed_pongs(), 0);
        }
    }

    #[test]
    fn pong_between_ticks_keeps_link_alive() {
        let mut heartbeat = HeartbeatState::new(2);
        for _ in 0..100 {
            assert_eq!(heartbeat.on_tick(), HeartbeatVerdict::Waiting);
            heartbeat.on_pong();
        }
    }

    #[test]
    fn zero_threshold_is_treated_as_one() {
        let mut heartbeat = HeartbeatState::new(0);
        assert_eq!(heartbeat.on_tick(), HeartbeatVerdict::Expired);
    }

    #[test]
    fn detection_latency_is_interval_times_threshold() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.detection_latency(), Duration::from_secs(4));
    }

    #[test]
    fn connection_status_equality_drives_notifications() {
        assert_eq!(ConnectionStatus::disconnected(), ConnectionStatus::default());
        assert_ne!(ConnectionStatus::connected(), ConnectionStatus::disconnected());
        let with_signal = ConnectionStatus {
            connected: true,
            signal: SignalStrength::from_attenuation(50),
        };
        assert_ne!(with_signal, ConnectionStatus::connected());
    }

    #[test]
    fn link_state_labels() {
        assert_eq!(LinkState::Idle.label(), "Idle");
        assert_eq!(LinkState::Connecting.label(), "Connecting...");
        assert!(LinkState::Open.is_live_or_pending());
        assert!(!LinkState::Closed.is_live_or_pending());
    }
}
