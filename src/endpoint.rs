//! Device endpoint resolution and URL derivation.
//!
//! The car serves three things from one host:
//! - the control channel, a WebSocket at `ws://<host>:82/ws`
//! - the MJPEG video stream at `http://<host>:81/stream`
//! - the WiFi provisioning portal at `http://<host>/wifi?`
//!
//! [`DeviceEndpoint`] holds the normalized host plus the port/path layout and
//! hands out validated [`Url`]s for each of them.
//!
//! # Host Normalization
//!
//! [`normalize_host`] accepts the forms people actually type:
//! - bare names and addresses (`car.local`, `192.168.4.1`)
//! - host with a port (`192.168.4.1:82`, the port is dropped)
//! - full URLs copied from a browser (`http://car.local:82/`)
//! - IPv6 literals (`[fe80::1]`)
//!
//! # Example
//!
//! ```
//! use wificar_remote::endpoint::DeviceEndpoint;
//!
//! let endpoint = DeviceEndpoint::new("http://car.local:82/")?;
//! assert_eq!(endpoint.control_url()?.as_str(), "ws://car.local:82/ws");
//! assert_eq!(endpoint.stream_url()?.as_str(), "http://car.local:81/stream");
//! # Ok::<(), wificar_remote::endpoint::EndpointError>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// mDNS name announced by the car firmware.
pub const DEFAULT_HOST: &str = "car.local";

/// Port of the control WebSocket server.
pub const DEFAULT_CONTROL_PORT: u16 = 82;

/// Path of the control WebSocket.
pub const DEFAULT_CONTROL_PATH: &str = "/ws";

/// Port of the video stream server.
pub const DEFAULT_STREAM_PORT: u16 = 81;

/// Path of the video stream.
pub const DEFAULT_STREAM_PATH: &str = "/stream";

/// Path of the WiFi provisioning portal (served on port 80).
pub const WIFI_SETUP_PATH: &str = "/wifi";

/// Endpoint validation error with user-friendly messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// Input was empty or whitespace-only.
    #[error("Host cannot be empty")]
    EmptyHost,

    /// The host (or a URL built from it) failed to parse.
    #[error("Invalid host '{host}': {reason}")]
    InvalidHost {
        /// Host as given.
        host: String,
        /// Parser message.
        reason: String,
    },

    /// A configured path does not start with `/`.
    #[error("Path '{0}' must start with '/'")]
    InvalidPath(String),
}

/// Port and path layout of the device's HTTP services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointLayout {
    /// Control WebSocket port.
    pub control_port: u16,
    /// Control WebSocket path.
    pub control_path: String,
    /// Video stream port.
    pub stream_port: u16,
    /// Video stream path.
    pub stream_path: String,
}

impl Default for EndpointLayout {
    fn default() -> Self {
        Self {
            control_port: DEFAULT_CONTROL_PORT,
            control_path: DEFAULT_CONTROL_PATH.to_string(),
            stream_port: DEFAULT_STREAM_PORT,
            stream_path: DEFAULT_STREAM_PATH.to_string(),
        }
    }
}

/// Validated device host together with its service layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    host: String,
    layout: EndpointLayout,
}

impl DeviceEndpoint {
    /// Create an endpoint with the firmware's default ports and paths.
    pub fn new(host: &str) -> Result<Self, EndpointError> {
        Self::with_layout(host, EndpointLayout::default())
    }

    /// Create an endpoint with a custom port/path layout.
    pub fn with_layout(host: &str, layout: EndpointLayout) -> Result<Self, EndpointError> {
        for path in [&layout.control_path, &layout.stream_path] {
            if !path.starts_with('/') {
                return Err(EndpointError::InvalidPath(path.clone()));
            }
        }

        let endpoint = Self {
            host: normalize_host(host)?,
            layout,
        };

        // Surface URL problems at construction instead of on first connect.
        endpoint.control_url()?;
        endpoint.stream_url()?;
        Ok(endpoint)
    }

    /// Returns the normalized host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port/path layout.
    #[must_use]
    pub fn layout(&self) -> &EndpointLayout {
        &self.layout
    }

    /// URL of the control WebSocket.
    pub fn control_url(&self) -> Result<Url, EndpointError> {
        self.build(
            "ws",
            Some(self.layout.control_port),
            &self.layout.control_path,
            None,
        )
    }

    /// URL of the video stream.
    pub fn stream_url(&self) -> Result<Url, EndpointError> {
        self.build(
            "http",
            Some(self.layout.stream_port),
            &self.layout.stream_path,
            None,
        )
    }

    /// URL of the WiFi provisioning portal.
    ///
    /// The trailing empty query matches what the firmware's portal expects.
    pub fn wifi_setup_url(&self) -> Result<Url, EndpointError> {
        self.build("http", None, WIFI_SETUP_PATH, Some(""))
    }

    fn build(
        &self,
        scheme: &str,
        port: Option<u16>,
        path: &str,
        query: Option<&str>,
    ) -> Result<Url, EndpointError> {
        let authority = match port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        };
        let mut url = Url::parse(&format!("{scheme}://{authority}{path}")).map_err(|e| {
            EndpointError::InvalidHost {
                host: self.host.clone(),
                reason: e.to_string(),
            }
        })?;
        url.set_query(query);
        Ok(url)
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)
    }
}

/// Reduce user input to a bare host name or address.
///
/// Scheme, port, path and query are discarded; IPv6 literals keep their
/// brackets so they can be embedded in URLs.
pub fn normalize_host(input: &str) -> Result<String, EndpointError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(EndpointError::EmptyHost);
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("http://{input}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| EndpointError::InvalidHost {
        host: input.to_string(),
        reason: e.to_string(),
    })?;

    match url.host() {
        Some(host) => Ok(host.to_string().to_lowercase()),
        None => Err(EndpointError::InvalidHost {
            host: input.to_string(),
            reason: "no host found".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let endpoint = DeviceEndpoint::new(DEFAULT_HOST).unwrap();
        assert_eq!(endpoint.host(), "car.local");
        assert_eq!(endpoint.control_url().unwrap().as_str(), "ws://car.local:82/ws");
        assert_eq!(
            endpoint.stream_url().unwrap().as_str(),
            "http://car.local:81/stream"
        );
        assert_eq!(
            endpoint.wifi_setup_url().unwrap().as_str(),
            "http://car.local/wifi?"
        );
    }

    #[test]
    fn test_normalize_bare_address() {
        assert_eq!(normalize_host("192.168.4.1").unwrap(), "192.168.4.1");
    }

    #[test]
    fn test_normalize_drops_port_and_path() {
        assert_eq!(normalize_host("192.168.4.1:82").unwrap(), "192.168.4.1");
        assert_eq!(normalize_host("http://Car.Local:82/index").unwrap(), "car.local");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize_host("  car.local  ").unwrap(), "car.local");
    }

    #[test]
    fn test_normalize_ipv6() {
        assert_eq!(normalize_host("[fe80::1]").unwrap(), "[fe80::1]");
        let endpoint = DeviceEndpoint::new("[fe80::1]").unwrap();
        assert_eq!(endpoint.control_url().unwrap().as_str(), "ws://[fe80::1]:82/ws");
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize_host("").unwrap_err(), EndpointError::EmptyHost);
        assert_eq!(normalize_host("   ").unwrap_err(), EndpointError::EmptyHost);
    }

    #[test]
    fn test_invalid_host() {
        let err = normalize_host("http://exa mple").unwrap_err();
        assert!(matches!(err, EndpointError::InvalidHost { .. }));
    }

    #[test]
    fn test_custom_layout() {
        let layout = EndpointLayout {
            control_port: 8082,
            control_path: "/control".into(),
            stream_port: 8081,
            stream_path: "/mjpeg".into(),
        };
        let endpoint = DeviceEndpoint::with_layout("10.0.0.7", layout).unwrap();
        assert_eq!(
            endpoint.control_url().unwrap().as_str(),
            "ws://10.0.0.7:8082/control"
        );
        assert_eq!(
            endpoint.stream_url().unwrap().as_str(),
            "http://10.0.0.7:8081/mjpeg"
        );
    }

    #[test]
    fn test_layout_rejects_relative_path() {
        let layout = EndpointLayout {
            control_path: "ws".into(),
            ..EndpointLayout::default()
        };
        let err = DeviceEndpoint::with_layout("car.local", layout).unwrap_err();
        assert_eq!(err, EndpointError::InvalidPath("ws".into()));
    }
}
