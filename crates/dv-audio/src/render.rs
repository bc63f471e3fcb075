//! Render-thread side of the real-time engine.
//!
//! The controller talks to the render thread through a command ring and a
//! handful of atomics in [`Shared`]. The render thread owns the trigger
//! queue and the mixer outright; nothing on it takes a lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dv_engine::{Frame, HandleId, Mixer, PendingTrigger, Trigger, TriggerQueue};
use dv_ir::Sample;
use tracing::trace;

/// Frames rendered between two command drains.
pub const BLOCK_FRAMES: usize = 64;

/// Controller → render thread messages.
#[derive(Debug)]
pub enum Command {
    Schedule {
        handle: HandleId,
        at: f64,
        trigger: Trigger,
        /// Cancel epoch current when the trigger was scheduled
        epoch: u64,
    },
    Cancel(HandleId),
    InstallSample(u8, Box<Sample>),
}

/// State read and written by both threads.
#[derive(Debug, Default)]
pub struct Shared {
    /// Transport reading as `f64` bits
    position: AtomicU64,
    pub running: AtomicBool,
    /// Bumped by the controller on `cancel_all`
    pub cancel_epoch: AtomicU64,
    /// Last cancel epoch the render thread has applied
    pub observed_epoch: AtomicU64,
    /// Commands taken off the ring so far
    pub applied: AtomicU64,
    /// Frames finished by the render thread
    pub frames: AtomicU64,
    pub alive: AtomicBool,
    pub shutdown: AtomicBool,
}

impl Shared {
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    pub fn set_position(&self, seconds: f64) {
        self.position.store(seconds.to_bits(), Ordering::Release);
    }

    /// Move the reading from `from` to `to` unless it was set in between.
    fn advance(&self, from: f64, to: f64) {
        let _ = self.position.compare_exchange(
            from.to_bits(),
            to.to_bits(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Everything the render thread owns.
pub struct RenderState {
    mixer: Mixer,
    queue: TriggerQueue,
    epoch: u64,
    step: f64,
}

impl RenderState {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            mixer: Mixer::new(sample_rate),
            queue: TriggerQueue::with_capacity(4096),
            epoch: 0,
            step: 1.0 / sample_rate.max(1) as f64,
        }
    }

    /// Apply a pending `cancel_all`, then every queued command.
    pub fn sync(&mut self, shared: &Shared, mut next: impl FnMut() -> Option<Command>) {
        self.observe_epoch(shared);
        while let Some(command) = next() {
            self.apply(command);
            shared.applied.fetch_add(1, Ordering::AcqRel);
        }
        // A cancel_all issued while draining must not let the drained
        // schedules through.
        self.observe_epoch(shared);
    }

    fn observe_epoch(&mut self, shared: &Shared) {
        let wanted = shared.cancel_epoch.load(Ordering::Acquire);
        if wanted != self.epoch {
            trace!(dropped = self.queue.len(), epoch = wanted, "cancel all");
            self.queue.clear();
            self.epoch = wanted;
        }
        shared.observed_epoch.store(wanted, Ordering::Release);
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Schedule { handle, at, trigger, epoch } => {
                if epoch == self.epoch {
                    self.queue.push(PendingTrigger { at, handle, trigger });
                }
            }
            Command::Cancel(handle) => {
                self.queue.cancel(handle);
            }
            Command::InstallSample(pitch, sample) => {
                self.mixer.install(pitch, *sample);
            }
        }
    }

    /// Render one frame. While the clock runs, due triggers fire first and
    /// the reading then moves on by one sample period.
    ///
    /// `frames` is bumped once the reading has moved, so a controller that
    /// saw it change after clearing `running` knows no trigger fires past
    /// the reading it takes next.
    pub fn next_frame(&mut self, shared: &Shared) -> Frame {
        if shared.running.load(Ordering::SeqCst) {
            let now = shared.position();
            while let Some(pending) = self.queue.pop_due(now) {
                self.mixer.trigger(&pending.trigger);
            }
            shared.advance(now, now + self.step);
        }
        shared.frames.fetch_add(1, Ordering::SeqCst);
        self.mixer.render_frame()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_ir::SampleData;
    use std::collections::VecDeque;

    fn kick() -> Trigger {
        Trigger { pitch: 36, velocity: 1.0, gain: 0.5 }
    }

    fn schedule(handle: u64, at: f64, epoch: u64) -> Command {
        Command::Schedule { handle: HandleId(handle), at, trigger: kick(), epoch }
    }

    fn drain(state: &mut RenderState, shared: &Shared, commands: Vec<Command>) {
        let mut commands: VecDeque<Command> = commands.into();
        state.sync(shared, || commands.pop_front());
    }

    #[test]
    fn schedules_from_an_old_epoch_are_dropped() {
        let shared = Shared::default();
        let mut state = RenderState::new(100);
        shared.cancel_epoch.store(1, Ordering::Release);
        drain(&mut state, &shared, vec![schedule(0, 0.5, 0), schedule(1, 0.6, 1)]);
        assert_eq!(state.pending(), 1);
        assert_eq!(shared.observed_epoch.load(Ordering::Acquire), 1);
        assert_eq!(shared.applied.load(Ordering::Acquire), 2);
    }

    #[test]
    fn cancel_all_clears_queue() {
        let shared = Shared::default();
        let mut state = RenderState::new(100);
        drain(&mut state, &shared, vec![schedule(0, 0.5, 0), schedule(1, 0.6, 0)]);
        assert_eq!(state.pending(), 2);
        shared.cancel_epoch.fetch_add(1, Ordering::AcqRel);
        drain(&mut state, &shared, vec![]);
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn single_cancel_removes_handle() {
        let shared = Shared::default();
        let mut state = RenderState::new(100);
        drain(&mut state, &shared, vec![schedule(0, 0.5, 0), Command::Cancel(HandleId(0))]);
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn clock_advances_only_while_running() {
        let shared = Shared::default();
        let mut state = RenderState::new(100);
        state.next_frame(&shared);
        assert_eq!(shared.position(), 0.0);

        shared.running.store(true, Ordering::Release);
        for _ in 0..10 {
            state.next_frame(&shared);
        }
        assert!((shared.position() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn due_trigger_sounds() {
        let shared = Shared::default();
        let mut state = RenderState::new(100);
        let mut sample = Sample::new("kick");
        sample.data = SampleData::Mono(vec![10000; 10]);
        sample.sample_rate = 100;
        drain(
            &mut state,
            &shared,
            vec![Command::InstallSample(36, Box::new(sample)), schedule(0, 0.0, 0)],
        );
        shared.running.store(true, Ordering::Release);
        assert_eq!(state.next_frame(&shared), Frame::mono(5000));
        assert_eq!(state.mixer().active_voices(), 1);
    }

    #[test]
    fn paused_clock_fires_nothing_while_cancel_is_pending() {
        let shared = Shared::default();
        let mut state = RenderState::new(100);
        drain(&mut state, &shared, vec![schedule(0, 0.045, 0), schedule(1, 0.1, 0)]);
        shared.running.store(true, Ordering::SeqCst);
        for _ in 0..7 {
            state.next_frame(&shared);
        }
        assert_eq!(state.pending(), 1);

        // Controller pauses; the render thread keeps going until its next sync
        shared.running.store(false, Ordering::SeqCst);
        let reading = shared.position();
        for _ in 0..BLOCK_FRAMES {
            state.next_frame(&shared);
        }
        assert_eq!(shared.position(), reading);
        assert_eq!(state.pending(), 1);
        assert_eq!(shared.frames.load(Ordering::SeqCst), 7 + BLOCK_FRAMES as u64);

        shared.cancel_epoch.fetch_add(1, Ordering::AcqRel);
        drain(&mut state, &shared, vec![]);
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn fired_trigger_is_behind_the_reading() {
        let shared = Shared::default();
        let mut state = RenderState::new(100);
        drain(&mut state, &shared, vec![schedule(0, 0.05, 0)]);
        shared.running.store(true, Ordering::SeqCst);
        while state.pending() > 0 {
            state.next_frame(&shared);
        }
        assert!(shared.position() > 0.05);
    }

    #[test]
    fn controller_seek_wins_over_advance() {
        let shared = Shared::default();
        shared.set_position(1.0);
        shared.advance(0.5, 0.51);
        assert_eq!(shared.position(), 1.0);
    }
}
