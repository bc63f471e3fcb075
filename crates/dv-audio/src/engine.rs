//! Real-time [`AudioEngine`] on the default output device.
//!
//! Activation spawns a render thread that opens the device, owns the mixer
//! and the trigger queue, and feeds frames to CPAL. The transport reading
//! is the render thread's sample counter, so it runs ahead of what is
//! audible by at most the output buffer.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel;
use dv_engine::{AudioEngine, EngineError, HandleId, Trigger};
use dv_ir::Sample;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, info, warn};

use crate::cpal_backend::CpalOutput;
use crate::render::{Command, RenderState, Shared, BLOCK_FRAMES};
use crate::error::AudioError;

/// Commands that fit in the ring before `schedule` has to wait.
const COMMAND_CAPACITY: usize = 8192;

struct RenderThread {
    commands: HeapProd<Command>,
    handle: Option<JoinHandle<()>>,
    sample_rate: u32,
}

pub struct CpalEngine {
    shared: Arc<Shared>,
    thread: Option<RenderThread>,
    next_handle: u64,
    /// Commands pushed so far
    sent: u64,
    tempo_bpm: f64,
    installed: BTreeSet<u8>,
}

impl CpalEngine {
    /// An inactive engine. Nothing touches the device until `activate`.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            thread: None,
            next_handle: 0,
            sent: 0,
            tempo_bpm: dv_ir::DEFAULT_TEMPO_BPM,
            installed: BTreeSet::new(),
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.thread.as_ref().map(|t| t.sample_rate)
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    fn spawn(&mut self) -> Result<RenderThread, AudioError> {
        let (producer, consumer) = HeapRb::<Command>::new(COMMAND_CAPACITY).split();
        let (ready_tx, ready_rx) = channel::bounded(1);
        let shared = self.shared.clone();
        shared.shutdown.store(false, Ordering::Release);

        let handle = thread::Builder::new()
            .name("drumview-render".into())
            .spawn(move || {
                // The CPAL stream is not Send; it lives and dies on this thread.
                let output = CpalOutput::new().and_then(|(mut output, frames)| {
                    output.build_stream(frames)?;
                    Ok(output)
                });
                match output {
                    Ok(output) => {
                        shared.alive.store(true, Ordering::Release);
                        let _ = ready_tx.send(Ok(output.sample_rate()));
                        render_loop(output, consumer, &shared);
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                    }
                }
            })
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioError::DeviceInit("render thread exited during startup".into()));
            }
        };
        Ok(RenderThread { commands: producer, handle: Some(handle), sample_rate })
    }

    fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    fn require_active(&mut self) -> Result<&mut RenderThread, EngineError> {
        if !self.is_alive() {
            return Err(EngineError::NotReady);
        }
        self.thread.as_mut().ok_or(EngineError::NotReady)
    }

    /// Push a command, waiting for room in the ring.
    fn send(&mut self, mut command: Command) -> Result<(), EngineError> {
        let shared = self.shared.clone();
        let thread = self.require_active()?;
        loop {
            match thread.commands.try_push(command) {
                Ok(()) => break,
                Err(back) => {
                    if !shared.alive.load(Ordering::Acquire) {
                        return Err(EngineError::NotReady);
                    }
                    command = back;
                    thread::yield_now();
                }
            }
        }
        self.sent += 1;
        Ok(())
    }

    /// Clear `running` and wait out the frame in flight, so nothing fires
    /// after this returns and the reading is past every fired trigger.
    fn freeze(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let seen = self.shared.frames.load(Ordering::SeqCst);
        while self.is_alive() && self.shared.frames.load(Ordering::SeqCst) == seen {
            thread::yield_now();
        }
    }

    /// Block until the render thread has taken every command sent so far.
    fn wait_applied(&self) {
        while self.is_alive() && self.shared.applied.load(Ordering::Acquire) < self.sent {
            thread::yield_now();
        }
    }
}

impl Default for CpalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.thread.as_mut().and_then(|t| t.handle.take()) {
            if handle.join().is_err() {
                error!("render thread panicked");
            }
        }
    }
}

impl AudioEngine for CpalEngine {
    fn activate(&mut self) -> Result<(), EngineError> {
        if self.is_alive() {
            return Ok(());
        }
        // A dead thread from an earlier activation is joined before a new one starts.
        if let Some(handle) = self.thread.take().and_then(|mut t| t.handle.take()) {
            self.shared.shutdown.store(true, Ordering::Release);
            let _ = handle.join();
        }
        match self.spawn() {
            Ok(thread) => {
                info!(sample_rate = thread.sample_rate, "audio engine active");
                self.thread = Some(thread);
                self.sent = 0;
                self.shared.applied.store(0, Ordering::Release);
                self.installed.clear();
                Ok(())
            }
            Err(err) => {
                warn!(%err, "could not open audio output");
                Err(EngineError::NotReady)
            }
        }
    }

    fn is_active(&self) -> bool {
        self.is_alive()
    }

    fn start(&mut self, from_seconds: f64) -> Result<(), EngineError> {
        self.require_active()?;
        self.shared.set_position(from_seconds.max(0.0));
        self.shared.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {
        self.freeze();
    }

    fn stop(&mut self) {
        self.freeze();
        self.shared.set_position(0.0);
    }

    fn seek(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.require_active()?;
        self.shared.set_position(seconds.max(0.0));
        Ok(())
    }

    fn set_tempo(&mut self, bpm: f64) -> Result<(), EngineError> {
        self.require_active()?;
        self.tempo_bpm = bpm;
        Ok(())
    }

    fn schedule(&mut self, at_seconds: f64, trigger: Trigger) -> Result<HandleId, EngineError> {
        let handle = HandleId(self.next_handle);
        let epoch = self.shared.cancel_epoch.load(Ordering::Acquire);
        self.send(Command::Schedule { handle, at: at_seconds, trigger, epoch })?;
        self.next_handle += 1;
        Ok(handle)
    }

    fn cancel(&mut self, handle: HandleId) {
        if self.send(Command::Cancel(handle)).is_ok() {
            self.wait_applied();
        }
    }

    fn cancel_all(&mut self) {
        let epoch = self.shared.cancel_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        while self.is_alive() && self.shared.observed_epoch.load(Ordering::Acquire) < epoch {
            thread::yield_now();
        }
        debug!(epoch, "all triggers cancelled");
    }

    fn now(&self) -> f64 {
        self.shared.position()
    }

    fn install_sample(&mut self, pitch: u8, sample: Sample) -> Result<(), EngineError> {
        self.send(Command::InstallSample(pitch, Box::new(sample)))?;
        self.installed.insert(pitch);
        Ok(())
    }

    fn has_sample(&self, pitch: u8) -> bool {
        self.installed.contains(&pitch)
    }
}

fn render_loop(mut output: CpalOutput, mut commands: HeapCons<Command>, shared: &Shared) {
    let mut state = RenderState::new(output.sample_rate());
    debug!("render thread running");

    'render: while !shared.shutdown.load(Ordering::Acquire) {
        state.sync(shared, || commands.try_pop());
        for _ in 0..BLOCK_FRAMES {
            let frame = state.next_frame(shared);
            if !output.write_spin(frame, &shared.shutdown) {
                break 'render;
            }
        }
    }

    shared.alive.store(false, Ordering::Release);
    shared.running.store(false, Ordering::Release);
    debug!("render thread exiting");
}
