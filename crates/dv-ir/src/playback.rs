//! Playback state and normalized positions.

/// Where the transport is. Exactly one variant is active at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing {
        /// Transport reading when this run of the clock started
        started_at_transport_seconds: f64,
    },
    Paused {
        paused_normalized_position: f64,
        paused_transport_seconds: f64,
    },
}

impl PlaybackState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, PlaybackState::Stopped)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused { .. })
    }

    /// Short name for status lines and logs.
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing { .. } => "playing",
            PlaybackState::Paused { .. } => "paused",
        }
    }
}

/// Clamp a playhead value into `[0, 1]`. NaN maps to the start.
pub fn clamp_position(position: f64) -> f64 {
    if position.is_nan() {
        0.0
    } else {
        position.clamp(0.0, 1.0)
    }
}

/// Normalize a transport reading against the effective duration.
///
/// A piece with no length is always at its end.
pub fn normalize(transport_seconds: f64, effective_duration: f64) -> f64 {
    if !(effective_duration > 0.0) {
        return 1.0;
    }
    clamp_position(transport_seconds / effective_duration)
}
