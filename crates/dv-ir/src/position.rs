//! Bar/beat readout of a playhead position.

use core::fmt;

use arrayvec::ArrayString;

use crate::drum_file::TimeSignature;
use crate::playback::clamp_position;

/// A 1-based `measure.beat.subdivision` position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarPosition {
    pub measure: u32,
    pub beat: u32,
    pub subdivision: u32,
}

impl fmt::Display for BarPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.measure, self.beat, self.subdivision)
    }
}

fn seconds_per_beat(native_tempo_bpm: f64) -> f64 {
    60.0 / native_tempo_bpm
}

/// Convert a normalized position into bars and beats.
///
/// Computed in score time, so the readout names the same bar at any
/// playback tempo. `subdivisions` is the number of grid steps per beat.
pub fn bar_position(
    normalized: f64,
    duration_seconds: f64,
    native_tempo_bpm: f64,
    time_signature: TimeSignature,
    subdivisions: u32,
) -> BarPosition {
    let beats_per_bar = time_signature.numerator.max(1) as f64;
    let score_seconds = clamp_position(normalized) * duration_seconds.max(0.0);
    let beats = if native_tempo_bpm > 0.0 {
        score_seconds / seconds_per_beat(native_tempo_bpm)
    } else {
        0.0
    };

    let measure = libm::floor(beats / beats_per_bar) as u32 + 1;
    let beat = libm::floor(beats % beats_per_bar) as u32 + 1;
    let fraction = beats - libm::floor(beats);
    let subdivision = libm::floor(fraction * subdivisions.max(1) as f64) as u32 + 1;

    BarPosition { measure, beat, subdivision }
}

/// `bar_position` formatted as `"m.b.s"`.
pub fn position_label(
    normalized: f64,
    duration_seconds: f64,
    native_tempo_bpm: f64,
    time_signature: TimeSignature,
    subdivisions: u32,
) -> ArrayString<32> {
    use core::fmt::Write;

    let pos = bar_position(normalized, duration_seconds, native_tempo_bpm, time_signature, subdivisions);
    let mut label = ArrayString::new();
    let _ = write!(label, "{}", pos);
    label
}

/// Number of whole bars spanned by the piece (at least one).
pub fn measure_count(duration_seconds: f64, native_tempo_bpm: f64, time_signature: TimeSignature) -> u32 {
    if !(native_tempo_bpm > 0.0) || !(duration_seconds > 0.0) {
        return 1;
    }
    let total_beats = duration_seconds / seconds_per_beat(native_tempo_bpm);
    let bars = libm::ceil(total_beats / time_signature.numerator.max(1) as f64);
    (bars as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUR_FOUR: TimeSignature = TimeSignature::new(4, 4);

    #[test]
    fn start_is_one_one_one() {
        let pos = bar_position(0.0, 8.0, 120.0, FOUR_FOUR, 4);
        assert_eq!(pos, BarPosition { measure: 1, beat: 1, subdivision: 1 });
    }

    #[test]
    fn halfway_through_two_bars() {
        // 8 s at 120 BPM = 16 beats = 4 bars; halfway = beat 8 = bar 3 beat 1
        let label = position_label(0.5, 8.0, 120.0, FOUR_FOUR, 4);
        assert_eq!(label.as_str(), "3.1.1");
    }

    #[test]
    fn subdivision_within_beat() {
        // 0.75 s at 120 BPM = 1.5 beats -> bar 1, beat 2, second eighth
        let pos = bar_position(0.75 / 8.0, 8.0, 120.0, FOUR_FOUR, 2);
        assert_eq!(pos, BarPosition { measure: 1, beat: 2, subdivision: 2 });
    }

    #[test]
    fn three_four_wraps_after_three_beats() {
        // 1.5 s at 120 BPM = 3 beats -> start of bar 2 in 3/4
        let pos = bar_position(0.5, 3.0, 120.0, TimeSignature::new(3, 4), 4);
        assert_eq!(pos.measure, 2);
        assert_eq!(pos.beat, 1);
    }

    #[test]
    fn measure_count_rounds_up() {
        // 5 s at 120 BPM = 10 beats = 2.5 bars -> 3
        assert_eq!(measure_count(5.0, 120.0, FOUR_FOUR), 3);
        assert_eq!(measure_count(0.0, 120.0, FOUR_FOUR), 1);
    }
}
