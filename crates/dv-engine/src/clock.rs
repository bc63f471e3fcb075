//! Transport clock: the engine contract and the adapter over it.
//!
//! An [`AudioEngine`] owns the sample clock and dispatches scheduled
//! triggers to its voices. [`TransportClock`] is the thin stateful layer the
//! player talks to; it retries activation on `start` and tracks the tempo
//! last sent to the engine. It owns no note data.

use dv_ir::{Note, Sample};
use tracing::{debug, warn};

use crate::error::EngineError;

/// Opaque token for one scheduled trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

/// Linear velocity → gain factor applied per trigger.
pub const VELOCITY_GAIN: f32 = 0.5;

/// Gain for a note velocity in `[0, 1]`.
pub fn velocity_to_gain(velocity: f32) -> f32 {
    VELOCITY_GAIN * velocity.clamp(0.0, 1.0)
}

/// What to play when a scheduled time is reached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trigger {
    pub pitch: u8,
    pub velocity: f32,
    /// Playback loudness, fixed when the trigger is created
    pub gain: f32,
}

impl Trigger {
    pub fn for_note(note: &Note) -> Self {
        Self {
            pitch: note.pitch,
            velocity: note.velocity,
            gain: velocity_to_gain(note.velocity),
        }
    }
}

/// Contract between the playback core and an audio engine.
///
/// Transport seconds advance one per wall-clock second while running.
/// Calls that need a live audio context fail with [`EngineError::NotReady`]
/// until `activate` succeeds. `pause`, `stop`, `cancel`, `cancel_all` and
/// `now` never fail.
pub trait AudioEngine {
    /// Try to obtain a live audio context.
    fn activate(&mut self) -> Result<(), EngineError>;

    fn is_active(&self) -> bool;

    /// Begin advancing the clock from `from_seconds`.
    fn start(&mut self, from_seconds: f64) -> Result<(), EngineError>;

    /// Freeze the clock at its current reading.
    fn pause(&mut self);

    /// Halt and reset the reading to 0. Scheduled triggers are kept.
    fn stop(&mut self);

    /// Set the reading without starting or stopping the clock.
    fn seek(&mut self, seconds: f64) -> Result<(), EngineError>;

    /// Record the playback tempo. Elapsed transport time is not moved.
    fn set_tempo(&mut self, bpm: f64) -> Result<(), EngineError>;

    /// Fire `trigger` once, when the clock reaches `at_seconds` or as soon
    /// as possible after if that time has already passed.
    fn schedule(&mut self, at_seconds: f64, trigger: Trigger) -> Result<HandleId, EngineError>;

    /// After this returns `handle` never fires.
    fn cancel(&mut self, handle: HandleId);

    /// After this returns no previously scheduled trigger fires.
    fn cancel_all(&mut self);

    /// Current transport reading in seconds.
    fn now(&self) -> f64;

    /// Make `sample` the sound for `pitch`.
    fn install_sample(&mut self, pitch: u8, sample: Sample) -> Result<(), EngineError>;

    fn has_sample(&self, pitch: u8) -> bool;
}

/// Stateful wrapper over an [`AudioEngine`].
pub struct TransportClock<E> {
    engine: E,
    running: bool,
    tempo_bpm: Option<f64>,
}

impl<E: AudioEngine> TransportClock<E> {
    pub fn new(engine: E) -> Self {
        Self { engine, running: false, tempo_bpm: None }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Activate the engine if it is not live yet.
    pub fn ensure_active(&mut self) -> Result<(), EngineError> {
        if self.engine.is_active() {
            return Ok(());
        }
        debug!("activating audio engine");
        self.engine.activate().inspect_err(|err| warn!(%err, "audio engine activation failed"))
    }

    /// Start the clock from `from_seconds`, activating the engine first if needed.
    pub fn start(&mut self, from_seconds: f64) -> Result<(), EngineError> {
        self.ensure_active()?;
        self.engine.start(from_seconds)?;
        self.running = true;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.engine.pause();
        self.running = false;
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.running = false;
    }

    pub fn seek(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.engine.seek(seconds)
    }

    /// Forward the tempo to the engine, skipping the call if unchanged.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), EngineError> {
        if self.tempo_bpm == Some(bpm) {
            return Ok(());
        }
        self.engine.set_tempo(bpm)?;
        self.tempo_bpm = Some(bpm);
        Ok(())
    }

    pub fn schedule(&mut self, at_seconds: f64, trigger: Trigger) -> Result<HandleId, EngineError> {
        self.engine.schedule(at_seconds, trigger)
    }

    pub fn cancel(&mut self, handle: HandleId) {
        self.engine.cancel(handle);
    }

    pub fn cancel_all(&mut self) {
        self.engine.cancel_all();
    }

    pub fn now(&self) -> f64 {
        self.engine.now()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tempo_bpm(&self) -> Option<f64> {
        self.tempo_bpm
    }

    pub fn install_sample(&mut self, pitch: u8, sample: Sample) -> Result<(), EngineError> {
        self.engine.install_sample(pitch, sample)
    }

    pub fn has_sample(&self, pitch: u8) -> bool {
        self.engine.has_sample(pitch)
    }
}
