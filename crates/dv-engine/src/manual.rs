//! An audio engine driven by hand.
//!
//! Time only moves when [`ManualEngine::advance`] or
//! [`ManualEngine::render`] is called, which makes transport behaviour
//! reproducible. Used for tests and for offline rendering.

use std::collections::BTreeSet;

use dv_ir::Sample;
use tracing::trace;

use crate::clock::{AudioEngine, HandleId, Trigger};
use crate::error::EngineError;
use crate::event_queue::{PendingTrigger, TriggerQueue};
use crate::frame::Frame;
use crate::mixer::Mixer;

/// A trigger that fired.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiredTrigger {
    pub handle: HandleId,
    /// Requested transport time
    pub at: f64,
    /// Transport reading when it fired (later than `at` for late triggers)
    pub fired_at: f64,
    pub trigger: Trigger,
}

pub struct ManualEngine {
    active: bool,
    activation_allowed: bool,
    running: bool,
    position: f64,
    tempo_bpm: f64,
    tempo_calls: usize,
    next_handle: u64,
    queue: TriggerQueue,
    fired: Vec<FiredTrigger>,
    schedule_calls: usize,
    reject_after: Option<usize>,
    /// Time that keeps passing inside every `cancel_all`
    cancel_lag: f64,
    installed: BTreeSet<u8>,
    mixer: Option<Mixer>,
}

impl ManualEngine {
    /// An engine that is live from the start.
    pub fn new() -> Self {
        Self {
            active: true,
            activation_allowed: true,
            running: false,
            position: 0.0,
            tempo_bpm: 120.0,
            tempo_calls: 0,
            next_handle: 0,
            queue: TriggerQueue::new(),
            fired: Vec::new(),
            schedule_calls: 0,
            reject_after: None,
            cancel_lag: 0.0,
            installed: BTreeSet::new(),
            mixer: None,
        }
    }

    /// An engine whose audio context is blocked until [`allow_activation`](Self::allow_activation).
    pub fn blocked() -> Self {
        Self { active: false, activation_allowed: false, ..Self::new() }
    }

    /// A live engine that renders audio through a mixer.
    pub fn with_mixer(sample_rate: u32) -> Self {
        Self { mixer: Some(Mixer::new(sample_rate)), ..Self::new() }
    }

    /// Let the next `activate` succeed.
    pub fn allow_activation(&mut self) {
        self.activation_allowed = true;
    }

    /// Drop the audio context, as when a device disappears.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.activation_allowed = false;
        self.running = false;
    }

    /// Accept `count` more schedule calls, then reject every one after.
    pub fn reject_schedules_after(&mut self, count: usize) {
        self.reject_after = Some(self.schedule_calls + count);
    }

    pub fn accept_schedules(&mut self) {
        self.reject_after = None;
    }

    /// Let the clock run on for `seconds` inside each `cancel_all` before
    /// the queue is cleared, like a render thread that only sees the
    /// cancel at its next block.
    pub fn set_cancel_lag(&mut self, seconds: f64) {
        self.cancel_lag = seconds.max(0.0);
    }

    /// Move time forward by `seconds` if the clock is running.
    ///
    /// Fires like `render` does: triggers due at the current reading fire
    /// first, then every trigger strictly before the new reading. A trigger
    /// exactly at the new reading stays pending until the next step.
    pub fn advance(&mut self, seconds: f64) {
        if !self.running {
            return;
        }
        let target = self.position + seconds.max(0.0);
        while let Some(pending) = self.queue.pop_due(self.position) {
            self.fire(pending, self.position);
        }
        while let Some(pending) = self.queue.pop_before(target) {
            self.fire(pending, pending.at);
        }
        self.position = target;
    }

    /// Render `frames` frames of audio, firing triggers at sample accuracy.
    /// Without a mixer this only moves time.
    pub fn render(&mut self, frames: usize) -> Vec<Frame> {
        let mut out = Vec::with_capacity(frames);
        let rate = self.mixer.as_ref().map_or(44100, |m| m.sample_rate()) as f64;
        for _ in 0..frames {
            if self.running {
                while let Some(pending) = self.queue.pop_due(self.position) {
                    self.fire(pending, self.position);
                }
                self.position += 1.0 / rate;
            }
            out.push(self.mixer.as_mut().map_or(Frame::silence(), Mixer::render_frame));
        }
        out
    }

    fn fire(&mut self, pending: PendingTrigger, fired_at: f64) {
        trace!(handle = pending.handle.0, at = pending.at, fired_at, "trigger fired");
        if let Some(mixer) = self.mixer.as_mut() {
            mixer.trigger(&pending.trigger);
        }
        self.fired.push(FiredTrigger {
            handle: pending.handle,
            at: pending.at,
            fired_at,
            trigger: pending.trigger,
        });
    }

    pub fn fired(&self) -> &[FiredTrigger] {
        &self.fired
    }

    pub fn take_fired(&mut self) -> Vec<FiredTrigger> {
        std::mem::take(&mut self.fired)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingTrigger> {
        self.queue.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Total schedule calls made, accepted or not.
    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn tempo_calls(&self) -> usize {
        self.tempo_calls
    }

    pub fn installed_pitches(&self) -> &BTreeSet<u8> {
        &self.installed
    }

    pub fn mixer(&self) -> Option<&Mixer> {
        self.mixer.as_ref()
    }

    fn require_active(&self) -> Result<(), EngineError> {
        if self.active {
            Ok(())
        } else {
            Err(EngineError::NotReady)
        }
    }
}

impl Default for ManualEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for ManualEngine {
    fn activate(&mut self) -> Result<(), EngineError> {
        if self.activation_allowed {
            self.active = true;
            Ok(())
        } else {
            Err(EngineError::NotReady)
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn start(&mut self, from_seconds: f64) -> Result<(), EngineError> {
        self.require_active()?;
        self.position = from_seconds.max(0.0);
        self.running = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.running = false;
    }

    fn stop(&mut self) {
        self.running = false;
        self.position = 0.0;
    }

    fn seek(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.require_active()?;
        self.position = seconds.max(0.0);
        Ok(())
    }

    fn set_tempo(&mut self, bpm: f64) -> Result<(), EngineError> {
        self.require_active()?;
        self.tempo_bpm = bpm;
        self.tempo_calls += 1;
        Ok(())
    }

    fn schedule(&mut self, at_seconds: f64, trigger: Trigger) -> Result<HandleId, EngineError> {
        self.require_active()?;
        self.schedule_calls += 1;
        if self.reject_after.is_some_and(|limit| self.schedule_calls > limit) {
            return Err(EngineError::Rejected("schedule rejected".into()));
        }
        let handle = HandleId(self.next_handle);
        self.next_handle += 1;
        self.queue.push(PendingTrigger { at: at_seconds, handle, trigger });
        Ok(handle)
    }

    fn cancel(&mut self, handle: HandleId) {
        self.queue.cancel(handle);
    }

    fn cancel_all(&mut self) {
        if self.cancel_lag > 0.0 {
            self.advance(self.cancel_lag);
        }
        self.queue.clear();
    }

    fn now(&self) -> f64 {
        self.position
    }

    fn install_sample(&mut self, pitch: u8, sample: Sample) -> Result<(), EngineError> {
        self.require_active()?;
        if let Some(mixer) = self.mixer.as_mut() {
            mixer.install(pitch, sample);
        }
        self.installed.insert(pitch);
        Ok(())
    }

    fn has_sample(&self, pitch: u8) -> bool {
        self.installed.contains(&pitch)
    }
}
