//! Camera drag adapter.
//!
//! Pointer motion pans and tilts the camera. The offset is kept as integers:
//! each step adds the scaled delta, clamps to the servo range and rounds, so
//! a slow drag accumulates exactly the way the car's own web UI does.

use super::CommandSink;
use crate::protocol::{Command, PanTilt};

/// Default pointer-to-servo scale.
pub const DEFAULT_SENSITIVITY: f64 = 0.8;

/// Pan/tilt state driven by pointer drags.
#[derive(Debug)]
pub struct CameraDrag<S> {
    sink: S,
    sensitivity: f64,
    position: PanTilt,
    anchor: Option<(f64, f64)>,
}

impl<S: CommandSink> CameraDrag<S> {
    /// Centered camera, no drag in progress.
    pub fn new(sink: S, sensitivity: f64) -> Self {
        Self {
            sink,
            sensitivity,
            position: PanTilt::CENTER,
            anchor: None,
        }
    }

    /// Current offset.
    #[must_use]
    pub fn position(&self) -> PanTilt {
        self.position
    }

    /// Whether a drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }

    /// Pointer went down at screen coordinates `(x, y)`.
    pub fn begin(&mut self, x: f64, y: f64) {
        self.anchor = Some((x, y));
    }

    /// Pointer moved to `(x, y)`. Ignored unless a drag is in progress.
    pub fn drag_to(&mut self, x: f64, y: f64) -> Option<PanTilt> {
        let (start_x, start_y) = self.anchor?;
        self.anchor = Some((x, y));
        Some(self.nudge(x - start_x, y - start_y))
    }

    /// Pointer went up.
    pub fn end(&mut self) {
        self.anchor = None;
    }

    /// Apply one screen-space delta. Screen y grows downwards, tilt grows up.
    pub fn nudge(&mut self, dx: f64, dy: f64) -> PanTilt {
        let x = f64::from(self.position.x()) + dx * self.sensitivity;
        let y = f64::from(self.position.y()) - dy * self.sensitivity;
        self.move_to(PanTilt::from_raw(x, y))
    }

    /// Re-center the camera.
    pub fn reset(&mut self) -> PanTilt {
        self.move_to(PanTilt::CENTER)
    }

    fn move_to(&mut self, position: PanTilt) -> PanTilt {
        self.position = position;
        self.sink.send_command(Command::CameraDrag(position));
        position
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::input::testing::RecordingSink;

    fn camera() -> (CameraDrag<Arc<RecordingSink>>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (CameraDrag::new(sink.clone(), DEFAULT_SENSITIVITY), sink)
    }

    #[test]
    fn drag_scales_and_inverts_y() {
        let (mut camera, sink) = camera();
        camera.begin(100.0, 100.0);
        assert_eq!(camera.drag_to(110.0, 90.0), Some(PanTilt::new(8, 8)));
        assert_eq!(camera.drag_to(110.0, 95.0), Some(PanTilt::new(8, 4)));
        assert_eq!(sink.wire(), vec!["cameraDrag_8_8", "cameraDrag_8_4"]);
    }

    #[test]
    fn drag_clamps_to_servo_range() {
        let (mut camera, sink) = camera();
        camera.begin(0.0, 0.0);
        camera.drag_to(1000.0, 1000.0);
        assert_eq!(camera.position(), PanTilt::new(100, -100));
        assert_eq!(sink.take(), vec!["cameraDrag_100_-100"]);

        camera.reset();
        assert_eq!(camera.position(), PanTilt::CENTER);
        assert_eq!(sink.take(), vec!["cameraDrag_0_0"]);
    }

    #[test]
    fn motion_without_drag_is_ignored() {
        let (mut camera, sink) = camera();
        assert_eq!(camera.drag_to(10.0, 10.0), None);

        camera.begin(0.0, 0.0);
        camera.end();
        assert!(!camera.is_dragging());
        assert_eq!(camera.drag_to(10.0, 10.0), None);
        assert!(sink.wire().is_empty());
    }

    #[test]
    fn small_steps_round_each_time() {
        let (mut camera, _sink) = camera();
        // 0.8 * 0.5 = 0.4 rounds to zero on every step.
        for _ in 0..10 {
            camera.nudge(0.5, 0.0);
        }
        assert_eq!(camera.position(), PanTilt::CENTER);
    }
}
