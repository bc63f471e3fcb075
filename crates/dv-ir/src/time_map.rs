//! Score time ↔ transport time.
//!
//! Notes are authored in *score seconds* at the file's native tempo. The
//! audio clock runs in *transport seconds*. The two are related by the
//! tempo ratio `user_bpm / native_bpm`: a ratio of 2.0 plays twice as fast,
//! so a note at score 2.0 s sounds at transport 1.0 s.

use thiserror::Error;

/// Tempo assumed when nothing says otherwise.
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// A tempo or tempo ratio that cannot drive playback.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum InvalidTempo {
    #[error("invalid tempo {0} BPM: must be positive and finite")]
    Bpm(f64),
    #[error("invalid tempo ratio {0}: must be positive and finite")]
    Ratio(f64),
}

fn check_ratio(ratio: f64) -> Result<f64, InvalidTempo> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(ratio)
    } else {
        Err(InvalidTempo::Ratio(ratio))
    }
}

fn check_bpm(bpm: f64) -> Result<f64, InvalidTempo> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(InvalidTempo::Bpm(bpm))
    }
}

/// Convert score seconds to transport seconds.
pub fn to_transport_seconds(score_seconds: f64, ratio: f64) -> Result<f64, InvalidTempo> {
    Ok(score_seconds / check_ratio(ratio)?)
}

/// Convert transport seconds back to score seconds.
pub fn to_score_seconds(transport_seconds: f64, ratio: f64) -> Result<f64, InvalidTempo> {
    Ok(transport_seconds * check_ratio(ratio)?)
}

/// Length of the piece in transport seconds at `ratio`.
pub fn effective_duration(native_duration_seconds: f64, ratio: f64) -> Result<f64, InvalidTempo> {
    Ok(native_duration_seconds / check_ratio(ratio)?)
}

/// Native and user tempo. The ratio between them is always positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoState {
    native_bpm: f64,
    user_bpm: f64,
}

impl Default for TempoState {
    fn default() -> Self {
        Self { native_bpm: DEFAULT_TEMPO_BPM, user_bpm: DEFAULT_TEMPO_BPM }
    }
}

impl TempoState {
    pub fn new(native_bpm: f64, user_bpm: f64) -> Result<Self, InvalidTempo> {
        let native_bpm = check_bpm(native_bpm)?;
        let user_bpm = check_bpm(user_bpm)?;
        check_ratio(user_bpm / native_bpm)?;
        Ok(Self { native_bpm, user_bpm })
    }

    /// A tempo state playing at the native tempo.
    pub fn native(native_bpm: f64) -> Result<Self, InvalidTempo> {
        Self::new(native_bpm, native_bpm)
    }

    pub fn native_bpm(&self) -> f64 {
        self.native_bpm
    }

    pub fn user_bpm(&self) -> f64 {
        self.user_bpm
    }

    /// `user_bpm / native_bpm`.
    pub fn ratio(&self) -> f64 {
        self.user_bpm / self.native_bpm
    }

    /// Change the user tempo. On error the previous tempo is kept.
    pub fn set_user_bpm(&mut self, bpm: f64) -> Result<(), InvalidTempo> {
        *self = Self::new(self.native_bpm, bpm)?;
        Ok(())
    }

    /// Change the native tempo (new file). On error the previous tempo is kept.
    pub fn set_native_bpm(&mut self, bpm: f64) -> Result<(), InvalidTempo> {
        *self = Self::new(bpm, self.user_bpm)?;
        Ok(())
    }

    pub fn to_transport(&self, score_seconds: f64) -> f64 {
        score_seconds / self.ratio()
    }

    pub fn to_score(&self, transport_seconds: f64) -> f64 {
        transport_seconds * self.ratio()
    }

    pub fn effective_duration(&self, native_duration_seconds: f64) -> f64 {
        native_duration_seconds / self.ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        let scale = a.abs().max(b.abs()).max(1.0);
        (a - b).abs() <= 1e-9 * scale
    }

    #[test]
    fn round_trip_is_exact_within_tolerance() {
        for &ratio in &[0.01, 0.25, 0.5, 1.0, 1.37, 2.0, 7.5, 100.0] {
            for &score in &[0.0, 0.001, 1.0, 2.5, 60.0, 3599.99] {
                let t = to_transport_seconds(score, ratio).unwrap();
                let back = to_score_seconds(t, ratio).unwrap();
                assert!(close(back, score), "ratio {} score {} -> {}", ratio, score, back);
            }
        }
    }

    #[test]
    fn double_tempo_halves_transport_time() {
        assert_eq!(to_transport_seconds(2.0, 2.0).unwrap(), 1.0);
        assert_eq!(effective_duration(4.0, 2.0).unwrap(), 2.0);
    }

    #[test]
    fn non_positive_ratio_is_rejected() {
        assert_eq!(to_transport_seconds(1.0, 0.0), Err(InvalidTempo::Ratio(0.0)));
        assert_eq!(to_score_seconds(1.0, -1.0), Err(InvalidTempo::Ratio(-1.0)));
        assert!(effective_duration(1.0, f64::NAN).is_err());
    }

    #[test]
    fn tempo_state_ratio() {
        let tempo = TempoState::new(120.0, 240.0).unwrap();
        assert_eq!(tempo.ratio(), 2.0);
        assert_eq!(tempo.to_transport(2.0), 1.0);
    }

    #[test]
    fn invalid_user_tempo_keeps_prior() {
        let mut tempo = TempoState::new(120.0, 90.0).unwrap();
        assert_eq!(tempo.set_user_bpm(0.0), Err(InvalidTempo::Bpm(0.0)));
        assert_eq!(tempo.set_user_bpm(-30.0), Err(InvalidTempo::Bpm(-30.0)));
        assert_eq!(tempo.user_bpm(), 90.0);
    }

    #[test]
    fn invalid_tempo_message() {
        let err = InvalidTempo::Bpm(0.0);
        assert_eq!(
            alloc::format!("{}", err),
            "invalid tempo 0 BPM: must be positive and finite"
        );
    }
}
