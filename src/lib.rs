//! # WiFi Car Remote
//!
//! Control client for the ESP32 camera car. The car exposes a text-command
//! WebSocket (`ws://<host>:82/ws`) and an MJPEG stream
//! (`http://<host>:81/stream`); this crate keeps the control channel alive
//! across flaky WiFi, turns user input into wire commands and reports
//! connection health and device settings back to whatever renders them.
//!
//! ## Crate Structure
//!
//! - **`connection`**: The `ConnectionManager` actor. It owns the link and
//!   runs the heartbeat (liveness probing with a missed-pong threshold) and
//!   fixed-delay reconnects. Users talk to it through a `ControlHandle`.
//! - **`protocol`**: Wire format. Command encoding (movement from held
//!   directions, pan/tilt, flash, frame size) and parsing of device messages.
//! - **`transport`**: The `Connector` seam, with a real WebSocket transport
//!   and a scriptable mock.
//! - **`settings`**: Device-pushed settings (flash, frame size, WiFi mode).
//! - **`stream`**: The video-stream collaborator re-armed on every reconnect.
//! - **`status`**: Status presenter: connection banner, controls, signal
//!   indicator.
//! - **`input`**: Movement, camera-drag and console adapters.
//! - **`endpoint`**: Host normalization and service URLs.
//! - **`config`** / **`logging`** / **`error`**: Figment configuration,
//!   tracing setup and the `ControlError` type.

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod input;
pub mod logging;
pub mod protocol;
pub mod settings;
pub mod status;
pub mod stream;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionStatus, ControlEvent, ControlHandle, LinkState};
pub use error::{AppResult, ControlError};
