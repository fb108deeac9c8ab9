//! Input adapters.
//!
//! Adapters turn user gestures into [`Command`]s and hand them to a
//! [`CommandSink`]. They never see the link: whether a command reaches the
//! car is the connection manager's business.
//!
//! - [`movement::MovementController`] - held directions with a repeat timer
//! - [`camera::CameraDrag`] - pointer drags to pan/tilt offsets
//! - [`console::ConsoleAction`] - line commands for the terminal client

pub mod camera;
pub mod console;
pub mod movement;

pub use camera::CameraDrag;
pub use console::ConsoleAction;
pub use movement::{MovementController, MovementInput};

use std::sync::Arc;

use crate::protocol::Command;

/// Destination for commands produced by input adapters.
///
/// Fire-and-forget: delivery failures are the sink's to report.
pub trait CommandSink: Send + Sync {
    /// Hand one command over.
    fn send_command(&self, command: Command);
}

impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    fn send_command(&self, command: Command) {
        (**self).send_command(command);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::CommandSink;
    use crate::protocol::Command;

    /// Sink that records everything it is given.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        commands: Mutex<Vec<Command>>,
    }

    impl RecordingSink {
        pub(crate) fn wire(&self) -> Vec<String> {
            self.commands.lock().iter().map(Command::encode).collect()
        }

        pub(crate) fn take(&self) -> Vec<String> {
            let wire = self.wire();
            self.commands.lock().clear();
            wire
        }
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, command: Command) {
            self.commands.lock().push(command);
        }
    }
}
