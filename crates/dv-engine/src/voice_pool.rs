//! VoicePool: fixed-capacity voice allocation.

use arrayvec::ArrayVec;
use dv_ir::{Sample, SampleKey};
use slotmap::SlotMap;

use crate::voice::Voice;

/// Maximum number of simultaneous voices.
pub const MAX_VOICES: usize = 64;

/// Voices in trigger order; the front is the oldest.
#[derive(Clone, Debug, Default)]
pub struct VoicePool {
    voices: ArrayVec<Voice, MAX_VOICES>,
}

impl VoicePool {
    pub fn new() -> Self {
        Self { voices: ArrayVec::new() }
    }

    /// Add a voice, stealing the oldest one when the pool is full.
    pub fn allocate(&mut self, voice: Voice) {
        if self.voices.is_full() {
            self.voices.remove(0);
        }
        self.voices.push(voice);
    }

    /// Stop every voice playing `key`.
    pub fn kill_sample(&mut self, key: SampleKey) {
        self.voices.retain(|v| v.sample_key != key);
    }

    pub fn kill_all(&mut self) {
        self.voices.clear();
    }

    /// Remove voices that have stopped playing.
    pub fn reap_finished(&mut self) {
        self.voices.retain(|v| v.playing);
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Sum one frame of every voice. Voices whose sample is gone stop.
    pub fn render_all(&mut self, bank: &SlotMap<SampleKey, Sample>) -> (i32, i32) {
        let mut left = 0;
        let mut right = 0;
        for voice in &mut self.voices {
            match bank.get(voice.sample_key) {
                Some(sample) => {
                    let (l, r) = voice.render(sample);
                    left += l;
                    right += r;
                }
                None => voice.playing = false,
            }
        }
        (left, right)
    }
}
