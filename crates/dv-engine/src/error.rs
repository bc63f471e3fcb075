//! Error types for the playback core.

use dv_ir::InvalidTempo;
use thiserror::Error;

/// Failure reported by an audio engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The audio context may not produce sound yet (device missing or
    /// activation refused). Recoverable: activation is retried on `start`.
    #[error("audio engine is not ready")]
    NotReady,
    /// The engine refused a request.
    #[error("audio engine rejected request: {0}")]
    Rejected(String),
}

/// A drum sound could not be loaded for a pitch.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("could not load sample for pitch {pitch}: {reason}")]
pub struct SampleLoadError {
    pub pitch: u8,
    pub reason: String,
}

impl SampleLoadError {
    pub fn new(pitch: u8, reason: impl Into<String>) -> Self {
        Self { pitch, reason: reason.into() }
    }
}

/// Errors surfaced by transport operations.
///
/// Every variant leaves the player in a consistent state: a failed
/// transition ends in `Stopped` with no handles outstanding.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PlaybackError {
    /// Tempo or ratio not positive. The previous tempo is kept.
    #[error(transparent)]
    InvalidTempo(#[from] InvalidTempo),
    /// Audio context blocked; retried on the next `play`.
    #[error("audio engine is not ready")]
    EngineNotReady,
    /// A sample failed to load. Its notes are skipped.
    #[error(transparent)]
    SampleLoadFailure(#[from] SampleLoadError),
    /// The engine rejected a schedule call; the play transition was aborted.
    #[error("scheduling failed: {0}")]
    SchedulingFailure(String),
    /// A transport call was made before any file was loaded.
    #[error("no file loaded")]
    NoFileLoaded,
}

impl From<EngineError> for PlaybackError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotReady => PlaybackError::EngineNotReady,
            EngineError::Rejected(reason) => PlaybackError::SchedulingFailure(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_taxonomy() {
        assert_eq!(PlaybackError::from(EngineError::NotReady), PlaybackError::EngineNotReady);
        assert_eq!(
            PlaybackError::from(EngineError::Rejected("queue full".into())),
            PlaybackError::SchedulingFailure("queue full".into())
        );
    }

    #[test]
    fn messages_name_the_cause() {
        let err = PlaybackError::from(SampleLoadError::new(38, "missing snare.wav"));
        assert_eq!(err.to_string(), "could not load sample for pitch 38: missing snare.wav");
        let err = PlaybackError::from(InvalidTempo::Bpm(-1.0));
        assert!(err.to_string().contains("-1"));
    }
}
