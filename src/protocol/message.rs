//! Inbound device messages.
//!
//! The car pushes short tagged strings, `<TAG>-<payload>`. Only the first
//! `-` separates tag from payload. Unknown tags and malformed payloads parse
//! to [`DeviceMessage::Unrecognized`] and are ignored by the caller.

use serde::{Deserialize, Serialize};

use super::frame_size::FrameSize;

const PONG_TAG: &str = "pong";
const FLASH_TAG: &str = "Flash";
const FRAME_SIZE_TAG: &str = "FRAMESIZE";
const WIFI_TAG: &str = "WIFI";

/// WiFi signal reading reported by the device.
///
/// The value is the absolute RSSI in dB (attenuation): lower is stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalStrength(u16);

impl SignalStrength {
    /// Wrap an attenuation value. Zero means "no reading" and yields `None`.
    #[must_use]
    pub fn from_attenuation(db: u16) -> Option<Self> {
        (db != 0).then_some(Self(db))
    }

    /// Attenuation in dB.
    #[must_use]
    pub fn attenuation(&self) -> u16 {
        self.0
    }

    /// RSSI in dBm (negative).
    #[must_use]
    pub fn dbm(&self) -> i32 {
        -i32::from(self.0)
    }
}

/// Network mode the car is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WifiMode {
    /// Joined an existing network.
    Station,
    /// Serving its own access point.
    AccessPoint,
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Liveness response. Newer firmware appends the flash state.
    Pong {
        /// Signal reading, `None` when the device reported 0 or garbage.
        signal: Option<SignalStrength>,
        /// Flash state piggybacked on the pong.
        flash: Option<bool>,
    },
    /// Flash LED state.
    Flash(bool),
    /// Current camera frame size.
    FrameSize(FrameSize),
    /// Current network mode.
    Wifi(WifiMode),
    /// Anything else.
    Unrecognized(String),
}

impl DeviceMessage {
    /// Parse one text frame. Never fails.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let unrecognized = || Self::Unrecognized(text.to_string());
        let Some((tag, payload)) = text.split_once('-') else {
            return unrecognized();
        };

        match tag {
            PONG_TAG => {
                let (signal, flash) = match payload.split_once('-') {
                    Some((signal, flash)) => (signal, parse_flash(flash)),
                    None => (payload, None),
                };
                let signal = signal
                    .trim()
                    .parse::<u16>()
                    .ok()
                    .and_then(SignalStrength::from_attenuation);
                Self::Pong { signal, flash }
            }
            FLASH_TAG => parse_flash(payload).map_or_else(unrecognized, Self::Flash),
            FRAME_SIZE_TAG => payload
                .parse::<FrameSize>()
                .map_or_else(|_| unrecognized(), Self::FrameSize),
            WIFI_TAG => match payload {
                "1" => Self::Wifi(WifiMode::Station),
                "0" => Self::Wifi(WifiMode::AccessPoint),
                _ => unrecognized(),
            },
            _ => unrecognized(),
        }
    }

    /// True for liveness responses.
    #[must_use]
    pub fn is_pong(&self) -> bool {
        matches!(self, Self::Pong { .. })
    }
}

fn parse_flash(payload: &str) -> Option<bool> {
    match payload {
        "ON" => Some(true),
        "OFF" => Some(false),
        _ => None,
    }
}
