//! Movement adapter.
//!
//! Tracks which directions are held. Every effective press or release sends
//! the re-encoded movement right away; while anything is held the current
//! movement is re-sent every `repeat` so the car keeps driving. Releasing the
//! last direction sends `stop` and drops the repeat deadline.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::CommandSink;
use crate::protocol::{Command, Direction, HeldIntents};

/// Default re-send period while a direction is held.
pub const DEFAULT_REPEAT: Duration = Duration::from_millis(100);

/// One movement gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementInput {
    /// Direction pressed (key down, button down, touch start).
    Press(Direction),
    /// Direction released.
    Release(Direction),
    /// Everything released (focus lost, `stop` typed).
    ReleaseAll,
}

impl MovementInput {
    /// Map a key event. `w`/`a`/`s`/`d`, case-insensitive.
    #[must_use]
    pub fn from_key(key: char, pressed: bool) -> Option<Self> {
        let direction = Direction::from_key(key)?;
        Some(if pressed {
            Self::Press(direction)
        } else {
            Self::Release(direction)
        })
    }
}

/// Held-direction state plus its repeat deadline.
#[derive(Debug)]
pub struct MovementController<S> {
    sink: S,
    held: HeldIntents,
    repeat: Duration,
    next_repeat: Option<Instant>,
}

impl<S: CommandSink> MovementController<S> {
    /// Controller with nothing held.
    pub fn new(sink: S, repeat: Duration) -> Self {
        Self {
            sink,
            held: HeldIntents::new(),
            repeat,
            next_repeat: None,
        }
    }

    /// Directions currently held.
    #[must_use]
    pub fn held(&self) -> HeldIntents {
        self.held
    }

    /// When the next repeat is due, if anything is held.
    #[must_use]
    pub fn next_repeat(&self) -> Option<Instant> {
        self.next_repeat
    }

    /// Press a direction. Pressing a held direction does nothing.
    pub fn press(&mut self, direction: Direction) -> bool {
        let changed = self.held.insert(direction);
        if changed {
            self.send_current();
        }
        changed
    }

    /// Release a direction. Releasing a direction that is not held does nothing.
    pub fn release(&mut self, direction: Direction) -> bool {
        let changed = self.held.remove(direction);
        if changed {
            self.send_current();
        }
        changed
    }

    /// Release everything and send `stop`.
    pub fn release_all(&mut self) {
        self.held.clear();
        self.send_current();
    }

    /// Apply one gesture.
    pub fn apply(&mut self, input: MovementInput) {
        match input {
            MovementInput::Press(direction) => {
                self.press(direction);
            }
            MovementInput::Release(direction) => {
                self.release(direction);
            }
            MovementInput::ReleaseAll => self.release_all(),
        }
    }

    /// Re-send the current movement if anything is held.
    pub fn repeat(&mut self) {
        if self.held.is_empty() {
            self.next_repeat = None;
            return;
        }
        self.sink.send_command(Command::movement(&self.held));
        self.next_repeat = Some(Instant::now() + self.repeat);
    }

    /// Consume gestures until the channel closes, then release everything.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<MovementInput>) {
        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.apply(input),
                    None => break,
                },
                () = repeat_due(self.next_repeat) => self.repeat(),
            }
        }
        if !self.held.is_empty() {
            self.release_all();
        }
        tracing::debug!("Movement input closed");
    }

    fn send_current(&mut self) {
        self.sink.send_command(Command::movement(&self.held));
        if self.held.is_empty() {
            self.next_repeat = None;
        } else if self.next_repeat.is_none() {
            self.next_repeat = Some(Instant::now() + self.repeat);
        }
    }
}

async fn repeat_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::input::testing::RecordingSink;
    use Direction::*;

    fn controller() -> (MovementController<Arc<RecordingSink>>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (MovementController::new(sink.clone(), DEFAULT_REPEAT), sink)
    }

    #[test]
    fn press_and_release_send_reencoded_movement() {
        let (mut movement, sink) = controller();

        assert!(movement.press(Forward));
        assert!(movement.press(Left));
        assert!(movement.release(Forward));
        assert!(movement.release(Left));

        assert_eq!(sink.wire(), vec!["forward", "forward-left", "left", "stop"]);
        assert!(movement.next_repeat().is_none());
    }

    #[test]
    fn repeated_press_and_stray_release_are_ignored() {
        let (mut movement, sink) = controller();

        assert!(movement.press(Right));
        assert!(!movement.press(Right));
        assert!(!movement.release(Backward));

        assert_eq!(sink.wire(), vec!["right"]);
    }

    #[test]
    fn contradictory_keys_stop() {
        let (mut movement, sink) = controller();
        movement.press(Left);
        movement.press(Right);
        assert_eq!(sink.take(), vec!["left", "stop"]);
        assert!(movement.next_repeat().is_some());
    }

    #[test]
    fn key_mapping() {
        assert_eq!(
            MovementInput::from_key('W', true),
            Some(MovementInput::Press(Forward))
        );
        assert_eq!(
            MovementInput::from_key('d', false),
            Some(MovementInput::Release(Right))
        );
        assert_eq!(MovementInput::from_key('x', true), None);
    }

    #[tokio::test(start_paused = true)]
    async fn held_direction_repeats_until_released() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(MovementController::new(sink.clone(), DEFAULT_REPEAT).run(rx));

        tx.send(MovementInput::Press(Forward)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(sink.take(), vec!["forward"; 4]);

        tx.send(MovementInput::Release(Forward)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.take(), vec!["stop"]);

        drop(tx);
        task.await.unwrap();
        assert!(sink.wire().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_input_releases_held_directions() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(MovementController::new(sink.clone(), DEFAULT_REPEAT).run(rx));

        tx.send(MovementInput::Press(Backward)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(sink.wire(), vec!["backward", "stop"]);
    }
}
