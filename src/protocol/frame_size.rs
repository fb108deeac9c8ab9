//! Camera frame sizes understood by the ESP32 camera driver.
//!
//! The firmware exchanges frame sizes by their driver constant names
//! (`FRAMESIZE_QVGA`, ...), both in `frameSize_<name>` commands and in
//! `FRAMESIZE-<name>` announcements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Frame size of the camera sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FrameSize {
    F96x96,
    Qqvga,
    Qcif,
    Hqvga,
    F240x240,
    Qvga,
    Cif,
    Hvga,
    Vga,
    Svga,
    Xga,
    Hd,
    Sxga,
    Uxga,
    Fhd,
    PHd,
    P3mp,
    Qxga,
    Qhd,
    Wqxga,
    PFhd,
    Qsxga,
}

impl FrameSize {
    /// Every frame size, smallest first.
    pub const ALL: [FrameSize; 22] = [
        Self::F96x96,
        Self::Qqvga,
        Self::Qcif,
        Self::Hqvga,
        Self::F240x240,
        Self::Qvga,
        Self::Cif,
        Self::Hvga,
        Self::Vga,
        Self::Svga,
        Self::Xga,
        Self::Hd,
        Self::Sxga,
        Self::Uxga,
        Self::Fhd,
        Self::PHd,
        Self::P3mp,
        Self::Qxga,
        Self::Qhd,
        Self::Wqxga,
        Self::PFhd,
        Self::Qsxga,
    ];

    /// Driver constant name used on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::F96x96 => "FRAMESIZE_96X96",
            Self::Qqvga => "FRAMESIZE_QQVGA",
            Self::Qcif => "FRAMESIZE_QCIF",
            Self::Hqvga => "FRAMESIZE_HQVGA",
            Self::F240x240 => "FRAMESIZE_240X240",
            Self::Qvga => "FRAMESIZE_QVGA",
            Self::Cif => "FRAMESIZE_CIF",
            Self::Hvga => "FRAMESIZE_HVGA",
            Self::Vga => "FRAMESIZE_VGA",
            Self::Svga => "FRAMESIZE_SVGA",
            Self::Xga => "FRAMESIZE_XGA",
            Self::Hd => "FRAMESIZE_HD",
            Self::Sxga => "FRAMESIZE_SXGA",
            Self::Uxga => "FRAMESIZE_UXGA",
            Self::Fhd => "FRAMESIZE_FHD",
            Self::PHd => "FRAMESIZE_P_HD",
            Self::P3mp => "FRAMESIZE_P_3MP",
            Self::Qxga => "FRAMESIZE_QXGA",
            Self::Qhd => "FRAMESIZE_QHD",
            Self::Wqxga => "FRAMESIZE_WQXGA",
            Self::PFhd => "FRAMESIZE_P_FHD",
            Self::Qsxga => "FRAMESIZE_QSXGA",
        }
    }

    /// Pixel dimensions (width, height).
    #[must_use]
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::F96x96 => (96, 96),
            Self::Qqvga => (160, 120),
            Self::Qcif => (176, 144),
            Self::Hqvga => (240, 176),
            Self::F240x240 => (240, 240),
            Self::Qvga => (320, 240),
            Self::Cif => (400, 296),
            Self::Hvga => (480, 320),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Xga => (1024, 768),
            Self::Hd => (1280, 720),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
            Self::Fhd => (1920, 1080),
            Self::PHd => (720, 1280),
            Self::P3mp => (864, 1536),
            Self::Qxga => (2048, 1536),
            Self::Qhd => (2560, 1440),
            Self::Wqxga => (2560, 1600),
            Self::PFhd => (1080, 1920),
            Self::Qsxga => (2560, 1920),
        }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for FrameSize {
    type Err = ControlError;

    /// Accepts the wire name, or the same name without the `FRAMESIZE_`
    /// prefix, in any case (`FRAMESIZE_VGA`, `vga`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let wanted = if upper.starts_with("FRAMESIZE_") {
            upper
        } else {
            format!("FRAMESIZE_{upper}")
        };

        Self::ALL
            .into_iter()
            .find(|size| size.wire_name() == wanted)
            .ok_or_else(|| ControlError::UnknownCommand(format!("frame size '{s}'")))
    }
}
