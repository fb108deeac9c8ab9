//! Wire protocol shared by the client and the car firmware.
//!
//! All frames are plain text. Outbound frames are produced by the
//! [`command`] encoder, inbound frames are parsed by [`message`].

pub mod command;
pub mod frame_size;
pub mod message;

pub use command::{
    encode_movement, Command, Direction, HeldIntents, Movement, PanTilt, PAN_TILT_LIMIT,
};
pub use frame_size::FrameSize;
pub use message::{DeviceMessage, SignalStrength, WifiMode};
