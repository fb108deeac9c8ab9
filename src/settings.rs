//! Device-pushed settings.
//!
//! The car announces its flash state, frame size and network mode when a
//! client connects and whenever they change. These announcements are
//! authoritative: they overwrite whatever the UI currently shows. Nothing is
//! kept across reconnects; the manager clears the snapshot when the link
//! closes and the device re-announces on the next connect.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::endpoint::{DeviceEndpoint, EndpointError};
use crate::protocol::{Command, DeviceMessage, FrameSize, WifiMode};

/// One device-pushed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSetting {
    /// Flash LED on/off.
    Flash(bool),
    /// Camera frame size.
    FrameSize(FrameSize),
    /// Network mode.
    Wifi(WifiMode),
}

impl DeviceSetting {
    /// Extract the settings carried by an inbound message.
    ///
    /// A pong can piggyback the flash state; every other message carries at
    /// most one setting.
    #[must_use]
    pub fn from_message(message: &DeviceMessage) -> Option<Self> {
        match message {
            DeviceMessage::Pong { flash, .. } => flash.map(Self::Flash),
            DeviceMessage::Flash(on) => Some(Self::Flash(*on)),
            DeviceMessage::FrameSize(size) => Some(Self::FrameSize(*size)),
            DeviceMessage::Wifi(mode) => Some(Self::Wifi(*mode)),
            DeviceMessage::Unrecognized(_) => None,
        }
    }
}

/// Last known device settings. `None` means "not announced yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Flash LED state.
    pub flash: Option<bool>,
    /// Camera frame size.
    pub frame_size: Option<FrameSize>,
    /// Network mode.
    pub wifi_mode: Option<WifiMode>,
}

impl DeviceSettings {
    /// Overwrite the matching field. Returns true if the snapshot changed.
    pub fn apply(&mut self, setting: DeviceSetting) -> bool {
        let before = *self;
        match setting {
            DeviceSetting::Flash(on) => self.flash = Some(on),
            DeviceSetting::FrameSize(size) => self.frame_size = Some(size),
            DeviceSetting::Wifi(mode) => self.wifi_mode = Some(mode),
        }
        before != *self
    }

    /// Forget everything (link closed).
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// What the "switch WiFi mode" button does right now.
    pub fn wifi_mode_action(
        &self,
        endpoint: &DeviceEndpoint,
    ) -> Result<WifiModeAction, EndpointError> {
        Ok(match self.wifi_mode {
            Some(WifiMode::Station) => WifiModeAction::Send(Command::Reset),
            Some(WifiMode::AccessPoint) => WifiModeAction::OpenSetupPage(endpoint.wifi_setup_url()?),
            None => WifiModeAction::Unavailable,
        })
    }
}

/// Result of pressing the WiFi-mode toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiModeAction {
    /// In station mode: tell the car to forget its network and reboot as AP.
    Send(Command),
    /// In AP mode: the user has to pick a network in the provisioning portal.
    OpenSetupPage(Url),
    /// The device has not announced its mode on this connection.
    Unavailable,
}
