//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

slotmap::new_key_type! {
    /// Key for referencing samples in a mixer's sample bank.
    pub struct SampleKey;
}

/// A one-shot drum sample.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name (usually the source file name)
    pub name: ArrayString<32>,
    /// Audio data
    pub data: SampleData,
    /// Recording rate in Hz
    pub sample_rate: u32,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Mono(Vec::new()),
            sample_rate: 44100,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        for c in name.chars() {
            if sample.name.try_push(c).is_err() {
                break;
            }
        }
        sample
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length in seconds at the recording rate.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Sample audio data, normalized to 16-bit at load time.
#[derive(Clone, Debug)]
pub enum SampleData {
    Mono(Vec<i16>),
    /// Stereo samples (left, right)
    Stereo(Vec<i16>, Vec<i16>),
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono(v) => v.len(),
            SampleData::Stereo(l, _) => l.len(),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channels in the sample data.
    pub fn num_channels(&self) -> u16 {
        match self {
            SampleData::Mono(_) => 1,
            SampleData::Stereo(_, _) => 2,
        }
    }

    /// Left/right values at a frame; mono is duplicated. Out of range is silence.
    pub fn get_stereo(&self, pos: usize) -> (i16, i16) {
        match self {
            SampleData::Mono(v) => {
                let s = v.get(pos).copied().unwrap_or(0);
                (s, s)
            }
            SampleData::Stereo(l, r) => (
                l.get(pos).copied().unwrap_or(0),
                r.get(pos).copied().unwrap_or(0),
            ),
        }
    }

    /// Linearly interpolated left/right values.
    ///
    /// `pos_fixed` is a 16.16 fixed-point position. Blends between the two
    /// nearest frames using the fractional part.
    pub fn get_stereo_interpolated(&self, pos_fixed: u64) -> (i16, i16) {
        let idx = (pos_fixed >> 16) as usize;
        let frac = (pos_fixed & 0xFFFF) as i64;

        let (al, ar) = self.get_stereo(idx);
        let (bl, br) = self.get_stereo(idx + 1);

        let lerp = |a: i16, b: i16| (a as i64 + (((b as i64 - a as i64) * frac) >> 16)) as i16;
        (lerp(al, bl), lerp(ar, br))
    }
}
