//! Voice: one-shot playback of a drum sample.

use dv_ir::{Sample, SampleKey};

/// Unity gain in Q15.
pub const UNITY_GAIN: u16 = 1 << 15;

/// A single voice producing audio from a sample.
#[derive(Clone, Copy, Debug)]
pub struct Voice {
    /// Which sample this voice plays.
    pub sample_key: SampleKey,
    /// Pitch that triggered the voice.
    pub pitch: u8,
    /// Current position in sample (16.16 fixed-point).
    pub position: u64,
    /// Playback increment (16.16 fixed-point).
    pub increment: u64,
    /// Gain in Q15 (32768 = unity).
    pub gain: u16,
    /// Is the voice currently producing audio?
    pub playing: bool,
}

impl Voice {
    /// Start a voice at the beginning of `sample`, resampled to `output_rate`.
    pub fn new(sample_key: SampleKey, pitch: u8, sample: &Sample, output_rate: u32, gain: f32) -> Self {
        Self {
            sample_key,
            pitch,
            position: 0,
            increment: increment_for(sample.sample_rate, output_rate),
            gain: gain_to_q15(gain),
            playing: !sample.is_empty(),
        }
    }

    /// Render one frame from `sample` and advance. Returns (left, right)
    /// ready to be summed into 32-bit accumulators.
    pub fn render(&mut self, sample: &Sample) -> (i32, i32) {
        if !self.playing {
            return (0, 0);
        }

        let (l, r) = sample.data.get_stereo_interpolated(self.position);
        let gain = self.gain as i32;
        let out = ((l as i32 * gain) >> 15, (r as i32 * gain) >> 15);

        self.position += self.increment;
        if (self.position >> 16) as usize >= sample.len() {
            self.playing = false;
        }
        out
    }
}

/// 16.16 step through a sample recorded at `sample_rate` played at `output_rate`.
pub fn increment_for(sample_rate: u32, output_rate: u32) -> u64 {
    if output_rate == 0 {
        return 1 << 16;
    }
    ((sample_rate as u64) << 16) / output_rate as u64
}

fn gain_to_q15(gain: f32) -> u16 {
    (gain.clamp(0.0, 1.0) * UNITY_GAIN as f32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_ir::SampleData;
    use slotmap::SlotMap;

    fn test_sample(data: Vec<i16>, rate: u32) -> Sample {
        let mut s = Sample::new("test");
        s.data = SampleData::Mono(data);
        s.sample_rate = rate;
        s
    }

    fn key_for(sample: &Sample) -> SampleKey {
        let mut bank: SlotMap<SampleKey, Sample> = SlotMap::with_key();
        bank.insert(sample.clone())
    }

    #[test]
    fn same_rate_steps_one_frame() {
        assert_eq!(increment_for(44100, 44100), 1 << 16);
        assert_eq!(increment_for(22050, 44100), 1 << 15);
    }

    #[test]
    fn unity_gain_passes_through() {
        let sample = test_sample(vec![1000, -1000, 500], 44100);
        let mut voice = Voice::new(key_for(&sample), 36, &sample, 44100, 1.0);
        assert_eq!(voice.render(&sample), (1000, 1000));
        assert_eq!(voice.render(&sample), (-1000, -1000));
    }

    #[test]
    fn half_gain_halves() {
        let sample = test_sample(vec![1000; 4], 44100);
        let mut voice = Voice::new(key_for(&sample), 36, &sample, 44100, 0.5);
        assert_eq!(voice.render(&sample), (500, 500));
    }

    #[test]
    fn stops_at_sample_end() {
        let sample = test_sample(vec![1000; 2], 44100);
        let mut voice = Voice::new(key_for(&sample), 36, &sample, 44100, 1.0);
        voice.render(&sample);
        assert!(voice.playing);
        voice.render(&sample);
        assert!(!voice.playing);
        assert_eq!(voice.render(&sample), (0, 0));
    }

    #[test]
    fn empty_sample_never_plays() {
        let sample = test_sample(vec![], 44100);
        let voice = Voice::new(key_for(&sample), 36, &sample, 44100, 1.0);
        assert!(!voice.playing);
    }
}
