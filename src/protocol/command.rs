//! Command encoder: user intents to wire-format command strings.
//!
//! Everything here is a pure mapping. Movement is derived from the set of
//! currently held directions; contradictory combinations collapse to `stop`
//! instead of picking one of the directions.
//!
//! | Intent | Wire |
//! |---|---|
//! | single direction | `forward`, `backward`, `left`, `right` |
//! | one vertical + one horizontal | `forward-left`, `backward-right`, ... |
//! | anything else | `stop` |
//! | liveness probe | `ping` |
//! | flash toggle | `toggleFlash` |
//! | frame size | `frameSize_FRAMESIZE_VGA` |
//! | camera pan/tilt | `cameraDrag_<x>_<y>` with x, y in [-100, 100] |
//! | forget WiFi + reboot | `reset` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::frame_size::FrameSize;
use crate::error::ControlError;

/// Upper bound of the symmetric pan/tilt range.
pub const PAN_TILT_LIMIT: i32 = 100;

/// Wire token of the liveness probe.
pub const PING: &str = "ping";

/// Wire token that halts the motors.
pub const STOP: &str = "stop";

/// A directional intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Drive forward.
    Forward,
    /// Drive backward.
    Backward,
    /// Turn left.
    Left,
    /// Turn right.
    Right,
}

impl Direction {
    /// All directions.
    pub const ALL: [Direction; 4] = [
        Self::Forward,
        Self::Backward,
        Self::Left,
        Self::Right,
    ];

    /// Keyboard mapping used by the browser UI (`w`/`s`/`a`/`d`).
    #[must_use]
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'w' => Some(Self::Forward),
            's' => Some(Self::Backward),
            'a' => Some(Self::Left),
            'd' => Some(Self::Right),
            _ => None,
        }
    }

    /// Wire token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// True for forward/backward.
    #[must_use]
    pub fn is_vertical(self) -> bool {
        matches!(self, Self::Forward | Self::Backward)
    }

    fn bit(self) -> u8 {
        match self {
            Self::Forward => 1 << 0,
            Self::Backward => 1 << 1,
            Self::Left => 1 << 2,
            Self::Right => 1 << 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of directions currently held by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HeldIntents(u8);

impl HeldIntents {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Adds a direction. Returns false if it was already held.
    pub fn insert(&mut self, direction: Direction) -> bool {
        let was_held = self.contains(direction);
        self.0 |= direction.bit();
        !was_held
    }

    /// Removes a direction. Returns false if it was not held.
    pub fn remove(&mut self, direction: Direction) -> bool {
        let was_held = self.contains(direction);
        self.0 &= !direction.bit();
        was_held
    }

    /// Releases every direction.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Whether `direction` is held.
    #[must_use]
    pub fn contains(&self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Number of held directions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// True when nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Held directions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(|d| self.contains(*d))
    }
}

impl FromIterator<Direction> for HeldIntents {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut held = Self::new();
        for direction in iter {
            held.insert(direction);
        }
        held
    }
}

/// Encoded movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    /// Exactly one direction held.
    Single(Direction),
    /// One vertical and one horizontal direction held: `(vertical, horizontal)`.
    Combined(Direction, Direction),
    /// Nothing held, or a contradictory combination.
    Stop,
}

impl Movement {
    /// Encode the held-intent set. This is a pure function of the set.
    #[must_use]
    pub fn from_held(held: &HeldIntents) -> Self {
        let mut directions = held.iter();
        match (directions.next(), directions.next(), directions.next()) {
            (Some(only), None, None) => Self::Single(only),
            (Some(a), Some(b), None) if a.is_vertical() != b.is_vertical() => {
                let (vertical, horizontal) = if a.is_vertical() { (a, b) } else { (b, a) };
                Self::Combined(vertical, horizontal)
            }
            _ => Self::Stop,
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(direction) => write!(f, "{direction}"),
            Self::Combined(vertical, horizontal) => write!(f, "{vertical}-{horizontal}"),
            Self::Stop => f.write_str(STOP),
        }
    }
}

/// Encode a held-intent set straight to its wire string.
#[must_use]
pub fn encode_movement(held: &HeldIntents) -> String {
    Movement::from_held(held).to_string()
}

/// Camera pan/tilt offset, always inside `[-PAN_TILT_LIMIT, PAN_TILT_LIMIT]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanTilt {
    x: i32,
    y: i32,
}

impl PanTilt {
    /// Centered camera.
    pub const CENTER: PanTilt = PanTilt { x: 0, y: 0 };

    /// Build from integer offsets, clamping both axes.
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: x.clamp(-PAN_TILT_LIMIT, PAN_TILT_LIMIT),
            y: y.clamp(-PAN_TILT_LIMIT, PAN_TILT_LIMIT),
        }
    }

    /// Build from raw (fractional) offsets: clamp, then round.
    #[must_use]
    pub fn from_raw(x: f64, y: f64) -> Self {
        let limit = f64::from(PAN_TILT_LIMIT);
        let axis = |value: f64| {
            if value.is_nan() {
                0
            } else {
                value.clamp(-limit, limit).round() as i32
            }
        };
        Self::new(axis(x), axis(y))
    }

    /// Horizontal offset.
    #[must_use]
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Vertical offset.
    #[must_use]
    pub fn y(&self) -> i32 {
        self.y
    }
}

/// One command sent to the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Drive / turn / stop.
    Move(Movement),
    /// Liveness probe.
    Ping,
    /// Toggle the flash LED.
    ToggleFlash,
    /// Change the camera frame size.
    SetFrameSize(FrameSize),
    /// Move the camera servos.
    CameraDrag(PanTilt),
    /// Forget WiFi credentials and reboot into access-point mode.
    Reset,
}

impl Command {
    /// Movement command for a held-intent set.
    #[must_use]
    pub fn movement(held: &HeldIntents) -> Self {
        Self::Move(Movement::from_held(held))
    }

    /// Stop command.
    #[must_use]
    pub fn stop() -> Self {
        Self::Move(Movement::Stop)
    }

    /// Wire encoding.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move(movement) => write!(f, "{movement}"),
            Self::Ping => f.write_str(PING),
            Self::ToggleFlash => f.write_str("toggleFlash"),
            Self::SetFrameSize(size) => write!(f, "frameSize_{size}"),
            Self::CameraDrag(offset) => write!(f, "cameraDrag_{}_{}", offset.x, offset.y),
            Self::Reset => f.write_str("reset"),
        }
    }
}

impl FromStr for Command {
    type Err = ControlError;

    /// Parse a wire command. Pan/tilt values outside the range are clamped
    /// rather than rejected, matching what the encoder would have produced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ControlError::UnknownCommand(s.to_string());
        let s = s.trim();

        match s {
            PING => return Ok(Self::Ping),
            STOP => return Ok(Self::stop()),
            "toggleFlash" => return Ok(Self::ToggleFlash),
            "reset" => return Ok(Self::Reset),
            _ => {}
        }

        if let Some(name) = s.strip_prefix("frameSize_") {
            return name.parse().map(Self::SetFrameSize);
        }

        if let Some(rest) = s.strip_prefix("cameraDrag_") {
            let (x, y) = rest.split_once('_').ok_or_else(unknown)?;
            let x: i32 = x.parse().map_err(|_| unknown())?;
            let y: i32 = y.parse().map_err(|_| unknown())?;
            return Ok(Self::CameraDrag(PanTilt::new(x, y)));
        }

        let direction = |token: &str| Direction::ALL.into_iter().find(|d| d.as_str() == token);
        let held: HeldIntents = match s.split_once('-') {
            Some((vertical, horizontal)) => {
                let vertical = direction(vertical).filter(|d| d.is_vertical());
                let horizontal = direction(horizontal).filter(|d| !d.is_vertical());
                match (vertical, horizontal) {
                    (Some(v), Some(h)) => [v, h].into_iter().collect(),
                    _ => return Err(unknown()),
                }
            }
            None => [direction(s).ok_or_else(unknown)?].into_iter().collect(),
        };
        Ok(Self::movement(&held))
    }
}
