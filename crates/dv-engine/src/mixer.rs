//! Drum mixer: sample bank, kit table and voices.

use dv_ir::{Sample, SampleKey};
use slotmap::SlotMap;

use crate::clock::Trigger;
use crate::frame::Frame;
use crate::voice::Voice;
use crate::voice_pool::VoicePool;

/// Turns triggers into audio.
///
/// `trigger` and `render_frame` never allocate; sample installation does.
pub struct Mixer {
    sample_rate: u32,
    /// Owns all sample data
    bank: SlotMap<SampleKey, Sample>,
    /// Pitch → sample
    kit: [Option<SampleKey>; 128],
    voices: VoicePool,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bank: SlotMap::with_key(),
            kit: [None; 128],
            voices: VoicePool::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Make `sample` the sound for `pitch`, replacing (and silencing) any previous one.
    pub fn install(&mut self, pitch: u8, sample: Sample) -> SampleKey {
        let slot = &mut self.kit[(pitch & 0x7F) as usize];
        if let Some(old) = slot.take() {
            self.voices.kill_sample(old);
            self.bank.remove(old);
        }
        let key = self.bank.insert(sample);
        self.kit[(pitch & 0x7F) as usize] = Some(key);
        key
    }

    pub fn has_sample(&self, pitch: u8) -> bool {
        self.kit.get(pitch as usize).is_some_and(|k| k.is_some())
    }

    /// Start a voice for the trigger. Returns false if the pitch has no sample.
    pub fn trigger(&mut self, trigger: &Trigger) -> bool {
        let Some(key) = self.kit.get(trigger.pitch as usize).copied().flatten() else {
            return false;
        };
        let Some(sample) = self.bank.get(key) else {
            return false;
        };
        self.voices
            .allocate(Voice::new(key, trigger.pitch, sample, self.sample_rate, trigger.gain));
        true
    }

    /// Render one frame of all sounding voices.
    pub fn render_frame(&mut self) -> Frame {
        let (left, right) = self.voices.render_all(&self.bank);
        self.voices.reap_finished();
        Frame::from_accum(left, right)
    }

    pub fn render(&mut self, out: &mut [Frame]) {
        for frame in out {
            *frame = self.render_frame();
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    /// Cut every sounding voice.
    pub fn silence(&mut self) {
        self.voices.kill_all();
    }
}
