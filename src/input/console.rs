//! Line commands for the terminal client.

use std::str::FromStr;

use crate::error::ControlError;
use crate::protocol::{Command, Direction, FrameSize};

/// Help text printed by the `help` command.
pub const HELP: &str = "\
Commands:
  +w / -w        press / release a direction (w, a, s, d)
  stop           release all directions
  flash          toggle the flash LED
  frame <NAME>   set the frame size (e.g. VGA, FRAMESIZE_SVGA)
  pan <dx> <dy>  drag the camera by a screen-space delta
  center         re-center the camera
  wifi           switch WiFi mode (station: reset, AP: show setup page)
  raw <command>  send a wire command as-is (e.g. forward-left)
  status         show connection status and device settings
  help           show this text
  quit           exit";

/// One parsed console line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleAction {
    /// Hold a direction.
    Press(Direction),
    /// Let go of a direction.
    Release(Direction),
    /// Let go of everything.
    Stop,
    /// Toggle the flash LED.
    Flash,
    /// Change the frame size.
    Frame(FrameSize),
    /// Drag the camera by a screen-space delta.
    Pan {
        /// Horizontal delta, screen pixels.
        dx: f64,
        /// Vertical delta, screen pixels (down is positive).
        dy: f64,
    },
    /// Re-center the camera.
    Center,
    /// Press the WiFi-mode toggle.
    Wifi,
    /// Send a wire command unchanged.
    Raw(Command),
    /// Print status.
    Status,
    /// Print help.
    Help,
    /// Exit.
    Quit,
}

impl FromStr for ConsoleAction {
    type Err = ControlError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let unknown = || ControlError::UnknownCommand(line.trim().to_string());
        let mut words = line.split_whitespace();
        let head = words.next().ok_or_else(unknown)?;
        let rest: Vec<&str> = words.collect();

        if let Some(key) = head.strip_prefix('+') {
            return single_key(key).map(Self::Press).ok_or_else(unknown);
        }
        if let Some(key) = head.strip_prefix('-') {
            return single_key(key).map(Self::Release).ok_or_else(unknown);
        }

        let action = match (head.to_ascii_lowercase().as_str(), rest.as_slice()) {
            ("stop", []) => Self::Stop,
            ("flash", []) => Self::Flash,
            ("frame", [name]) => Self::Frame(name.parse()?),
            ("pan", [dx, dy]) => Self::Pan {
                dx: dx.parse().map_err(|_| unknown())?,
                dy: dy.parse().map_err(|_| unknown())?,
            },
            ("center", []) => Self::Center,
            ("wifi", []) => Self::Wifi,
            ("raw", [command]) => Self::Raw(command.parse()?),
            ("status", []) => Self::Status,
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            _ => return Err(unknown()),
        };
        Ok(action)
    }
}

fn single_key(key: &str) -> Option<Direction> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Direction::from_key(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        assert_eq!(
            "+w".parse::<ConsoleAction>().unwrap(),
            ConsoleAction::Press(Direction::Forward)
        );
        assert_eq!(
            "-D".parse::<ConsoleAction>().unwrap(),
            ConsoleAction::Release(Direction::Right)
        );
        assert!("+x".parse::<ConsoleAction>().is_err());
        assert!("+wa".parse::<ConsoleAction>().is_err());
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            "frame vga".parse::<ConsoleAction>().unwrap(),
            ConsoleAction::Frame(FrameSize::Vga)
        );
        assert_eq!(
            "pan 10 -5.5".parse::<ConsoleAction>().unwrap(),
            ConsoleAction::Pan { dx: 10.0, dy: -5.5 }
        );
        assert_eq!(
            "raw forward-left".parse::<ConsoleAction>().unwrap(),
            ConsoleAction::Raw("forward-left".parse().unwrap())
        );
        assert!("frame HUGE".parse::<ConsoleAction>().is_err());
        assert!("pan 10".parse::<ConsoleAction>().is_err());
    }

    #[test]
    fn plain_words() {
        assert_eq!("  Flash ".parse::<ConsoleAction>().unwrap(), ConsoleAction::Flash);
        assert_eq!("quit".parse::<ConsoleAction>().unwrap(), ConsoleAction::Quit);
        assert_eq!("?".parse::<ConsoleAction>().unwrap(), ConsoleAction::Help);
        assert!("".parse::<ConsoleAction>().is_err());
        assert!("stop now".parse::<ConsoleAction>().is_err());
    }
}
