//! Pointer-driven seeking on the timeline.
//!
//! While the pointer is held the target only moves a preview marker; the
//! player is touched once, on release.

use tracing::debug;

use crate::clock::AudioEngine;
use crate::error::PlaybackError;
use crate::player::Player;

/// Normalized position under a pointer at `x` over a timeline starting at
/// `left` and `width` units wide. A zero-width timeline maps everything to 0.
pub fn position_from_pointer(x: f64, left: f64, width: f64) -> f64 {
    if !(width > 0.0) || x.is_nan() {
        return 0.0;
    }
    ((x - left) / width).clamp(0.0, 1.0)
}

#[derive(Clone, Debug, Default)]
pub struct SeekController {
    left: f64,
    width: f64,
    /// Preview position while a drag is in progress
    drag: Option<f64>,
}

impl SeekController {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width, drag: None }
    }

    /// Timeline geometry changed (resize, scroll).
    pub fn set_bounds(&mut self, left: f64, width: f64) {
        self.left = left;
        self.width = width;
    }

    pub fn pointer_down(&mut self, x: f64) -> f64 {
        let position = position_from_pointer(x, self.left, self.width);
        self.drag = Some(position);
        position
    }

    /// Move the preview marker. Ignored unless a drag is in progress.
    pub fn pointer_move(&mut self, x: f64) -> Option<f64> {
        let preview = self.drag.as_mut()?;
        *preview = position_from_pointer(x, self.left, self.width);
        Some(*preview)
    }

    /// Commit the drag. A playing transport restarts from the release point;
    /// otherwise the playhead is only moved.
    pub fn pointer_up<E: AudioEngine>(&mut self, x: f64, player: &mut Player<E>) -> Result<f64, PlaybackError> {
        self.drag = None;
        let position = position_from_pointer(x, self.left, self.width);
        debug!(position, "seek committed");
        if player.state().is_playing() {
            player.play(Some(position))?;
        } else {
            player.seek(position)?;
        }
        Ok(position)
    }

    /// Drop the drag without seeking.
    pub fn cancel(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Current preview position, if dragging.
    pub fn preview(&self) -> Option<f64> {
        self.drag
    }
}
