//! Configuration using Figment.
//!
//! Configuration is layered, later sources winning:
//! 1. Built-in defaults (the car firmware's own web UI timings)
//! 2. `config/wificar.toml` (or the file given with `--config`)
//! 3. Environment variables prefixed with `WIFICAR_`, `__` separating
//!    sections from keys (`WIFICAR_DEVICE__HOST=192.168.4.1`)
//!
//! Command-line overrides are applied by the binary after loading.
//! Durations are human-readable strings (`"2s"`, `"100ms"`).
//!
//! # Example
//! ```no_run
//! use wificar_remote::config::ControlConfig;
//!
//! let config = ControlConfig::load()?;
//! config.validate()?;
//! println!("Car at {}", config.endpoint()?.control_url()?);
//! # Ok::<(), wificar_remote::error::ControlError>(())
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::connection::{HeartbeatConfig, ManagerConfig, ReconnectConfig};
use crate::endpoint::{self, DeviceEndpoint, EndpointLayout};
use crate::error::{AppResult, ControlError};
use crate::logging::{self, OutputFormat};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/wificar.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "WIFICAR_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Where the car is.
    pub device: DeviceConfig,
    /// Connection and UI timings.
    pub timing: TimingConfig,
    /// Input adapter tuning.
    pub input: InputConfig,
    /// Logging output.
    pub logging: LoggingConfig,
}

/// Device address and service layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Host name or address; URLs are accepted and reduced to their host.
    pub host: String,
    /// Control WebSocket port.
    pub control_port: u16,
    /// Control WebSocket path.
    pub control_path: String,
    /// Video stream port.
    pub stream_port: u16,
    /// Video stream path.
    pub stream_path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let layout = EndpointLayout::default();
        Self {
            host: endpoint::DEFAULT_HOST.to_string(),
            control_port: layout.control_port,
            control_path: layout.control_path,
            stream_port: layout.stream_port,
            stream_path: layout.stream_path,
        }
    }
}

/// Timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Heartbeat period.
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Unanswered heartbeats before the link is declared dead.
    pub max_missed_pongs: u32,
    /// Wait before reconnecting.
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
    /// Upper bound for one connection attempt.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Delay between opening the link and re-attaching the video stream.
    #[serde(with = "humantime_serde")]
    pub stream_reload_delay: Duration,
    /// Re-send period for held movement keys.
    #[serde(with = "humantime_serde")]
    pub movement_repeat: Duration,
    /// How long the "connected" banner stays up.
    #[serde(with = "humantime_serde")]
    pub status_hide_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let manager = ManagerConfig::default();
        Self {
            heartbeat_interval: manager.heartbeat.interval,
            max_missed_pongs: manager.heartbeat.max_missed_pongs,
            reconnect_delay: manager.reconnect.delay,
            connect_timeout: manager.reconnect.connect_timeout,
            stream_reload_delay: manager.stream_reload_delay,
            movement_repeat: crate::input::movement::DEFAULT_REPEAT,
            status_hide_delay: crate::status::DEFAULT_HIDE_DELAY,
        }
    }
}

/// Input tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Pointer-to-servo scale for camera drags.
    pub drag_sensitivity: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            drag_sensitivity: crate::input::camera::DEFAULT_SENSITIVITY,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub level: String,
    /// Output format.
    pub format: OutputFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Compact,
        }
    }
}

impl ControlConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment. A missing file is
    /// not an error; the defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Ok(Self::figment(path.as_ref(), ENV_PREFIX).extract()?)
    }

    fn figment(path: &Path, env_prefix: &str) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(env_prefix).split("__"))
    }

    /// Check values that deserialize fine but make no sense.
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: String| Err(ControlError::Configuration(msg));

        logging::parse_log_level(&self.logging.level).map_err(ControlError::Configuration)?;

        let timing = &self.timing;
        for (name, value) in [
            ("heartbeat_interval", timing.heartbeat_interval),
            ("reconnect_delay", timing.reconnect_delay),
            ("connect_timeout", timing.connect_timeout),
            ("movement_repeat", timing.movement_repeat),
        ] {
            if value.is_zero() {
                return invalid(format!("timing.{name} must be greater than zero"));
            }
        }

        if timing.max_missed_pongs == 0 {
            return invalid("timing.max_missed_pongs must be at least 1".to_string());
        }

        let device = &self.device;
        if device.control_port == 0 || device.stream_port == 0 {
            return invalid("device ports must be non-zero".to_string());
        }

        let sensitivity = self.input.drag_sensitivity;
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return invalid(format!(
                "input.drag_sensitivity must be a positive number, got {sensitivity}"
            ));
        }

        self.endpoint()?;
        Ok(())
    }

    /// Endpoint described by the `device` section.
    pub fn endpoint(&self) -> AppResult<DeviceEndpoint> {
        let layout = EndpointLayout {
            control_port: self.device.control_port,
            control_path: self.device.control_path.clone(),
            stream_port: self.device.stream_port,
            stream_path: self.device.stream_path.clone(),
        };
        Ok(DeviceEndpoint::with_layout(&self.device.host, layout)?)
    }

    /// Connection manager settings.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            heartbeat: HeartbeatConfig {
                interval: self.timing.heartbeat_interval,
                max_missed_pongs: self.timing.max_missed_pongs,
            },
            reconnect: ReconnectConfig {
                delay: self.timing.reconnect_delay,
                connect_timeout: self.timing.connect_timeout,
            },
            stream_reload_delay: self.timing.stream_reload_delay,
        }
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| ControlError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_firmware_ui() {
        let config = ControlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.manager_config(), ManagerConfig::default());
        assert_eq!(config.timing.movement_repeat, Duration::from_millis(100));
        assert_eq!(config.timing.status_hide_delay, Duration::from_secs(3));
        assert_eq!(
            config.endpoint().unwrap().control_url().unwrap().as_str(),
            "ws://car.local:82/ws"
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            ControlConfig::figment(&dir.path().join("absent.toml"), "WIFICAR_TEST_ABSENT_")
                .extract::<ControlConfig>()
                .unwrap();
        assert_eq!(config, ControlConfig::default());
    }

    #[test]
    fn file_overrides_defaults_partially() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[device]
host = "192.168.4.1"

[timing]
heartbeat_interval = "500ms"
max_missed_pongs = 3

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = ControlConfig::figment(file.path(), "WIFICAR_TEST_FILE_")
            .extract::<ControlConfig>()
            .unwrap();
        assert_eq!(config.device.host, "192.168.4.1");
        assert_eq!(config.device.control_port, 82);
        assert_eq!(config.timing.heartbeat_interval, Duration::from_millis(500));
        assert_eq!(config.timing.max_missed_pongs, 3);
        assert_eq!(config.timing.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.logging.format, OutputFormat::Json);
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[device]\nhost = \"from-file.local\"").unwrap();
        std::env::set_var("WIFICAR_TEST_ENV_DEVICE__HOST", "from-env.local");
        std::env::set_var("WIFICAR_TEST_ENV_TIMING__RECONNECT_DELAY", "5s");

        let config = ControlConfig::figment(file.path(), "WIFICAR_TEST_ENV_")
            .extract::<ControlConfig>()
            .unwrap();
        assert_eq!(config.device.host, "from-env.local");
        assert_eq!(config.timing.reconnect_delay, Duration::from_secs(5));
    }

    #[test]
    fn malformed_duration_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nheartbeat_interval = \"soon\"").unwrap();
        assert!(matches!(
            ControlConfig::load_from(file.path()),
            Err(ControlError::Config(_))
        ));
    }

    #[test]
    fn validation_rejects_nonsense() {
        let mut config = ControlConfig::default();
        config.timing.heartbeat_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ControlError::Configuration(_))));

        let mut config = ControlConfig::default();
        config.timing.max_missed_pongs = 0;
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.input.drag_sensitivity = -1.0;
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.device.stream_path = "stream".to_string();
        assert!(matches!(config.validate(), Err(ControlError::Endpoint(_))));

        let mut config = ControlConfig::default();
        config.device.host = "  ".to_string();
        assert!(matches!(config.validate(), Err(ControlError::Endpoint(_))));
    }

    #[test]
    fn effective_config_round_trips_through_toml() {
        let text = ControlConfig::default().to_toml().unwrap();
        assert!(text.contains("heartbeat_interval = \"2s\""));
        let parsed: ControlConfig = Figment::from(Toml::string(&text)).extract().unwrap();
        assert_eq!(parsed, ControlConfig::default());
    }
}
