//! Playback state machine.
//!
//! [`Player`] is the only owner of the [`PlaybackState`]. Every transition
//! runs to completion on the caller's thread and ends in a consistent state:
//! `Playing` only with the clock running and notes scheduled, `Paused` and
//! `Stopped` only with no triggers outstanding.
//!
//! Starting playback has three steps so that sample loading can happen in
//! between: [`Player::begin_play`] issues a [`PlayTicket`] under a new play
//! generation, [`Player::prepare`] loads sounds, and [`Player::commit`]
//! schedules and starts the clock. Any transition made in the meantime bumps
//! the generation and the late commit is discarded.

use std::collections::BTreeSet;

use arrayvec::ArrayString;
use crossbeam::channel::Receiver;
use dv_ir::{clamp_position, normalize, position_label, DrumFile, PlaybackState, TempoState};
use tracing::{debug, error, info, warn};

use crate::clock::{AudioEngine, TransportClock};
use crate::error::{EngineError, PlaybackError};
use crate::events::{EventBus, PlayerEvent};
use crate::scheduler::NoteScheduler;
use crate::source::SampleSource;
use crate::tracker::{FrameRequest, PositionTracker};

/// Proof that a play request was accepted under a given generation.
#[derive(Debug, PartialEq)]
pub struct PlayTicket {
    generation: u64,
    position: f64,
}

impl PlayTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Normalized start position of the request.
    pub fn position(&self) -> f64 {
        self.position
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Playback is running.
    Started,
    /// A later transition replaced this request; nothing was scheduled.
    Superseded,
}

/// What a tracker frame did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Not playing; no frame was due.
    Idle,
    /// The frame belonged to an earlier run and was ignored.
    Stale,
    /// Playhead moved to this normalized position.
    Advanced(f64),
    /// End reached with looping on; restarted from the top.
    Looped,
    /// End reached; playback stopped.
    Ended,
}

pub struct Player<E> {
    clock: TransportClock<E>,
    scheduler: NoteScheduler,
    tracker: PositionTracker,
    file: Option<DrumFile>,
    tempo: TempoState,
    state: PlaybackState,
    /// Last state sent to subscribers
    published_state: PlaybackState,
    /// Last known normalized position outside of `Playing`
    position: f64,
    loop_enabled: bool,
    generation: u64,
    /// Pitches whose sound could not be loaded for the current file
    unavailable: BTreeSet<u8>,
    source: Option<Box<dyn SampleSource + Send>>,
    events: EventBus,
}

impl<E: AudioEngine> Player<E> {
    pub fn new(engine: E) -> Self {
        Self {
            clock: TransportClock::new(engine),
            scheduler: NoteScheduler::new(),
            tracker: PositionTracker::new(),
            file: None,
            tempo: TempoState::default(),
            state: PlaybackState::Stopped,
            published_state: PlaybackState::Stopped,
            position: 0.0,
            loop_enabled: false,
            generation: 0,
            unavailable: BTreeSet::new(),
            source: None,
            events: EventBus::new(),
        }
    }

    /// Load drum sounds from `source` before each play.
    pub fn with_sample_source(mut self, source: impl SampleSource + Send + 'static) -> Self {
        self.set_sample_source(source);
        self
    }

    pub fn set_sample_source(&mut self, source: impl SampleSource + Send + 'static) {
        self.source = Some(Box::new(source));
        self.unavailable.clear();
    }

    // --- Accessors ---

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn file(&self) -> Option<&DrumFile> {
        self.file.as_ref()
    }

    pub fn tempo(&self) -> TempoState {
        self.tempo
    }

    pub fn is_looping(&self) -> bool {
        self.loop_enabled
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pitches skipped because their sound failed to load.
    pub fn unavailable_pitches(&self) -> &BTreeSet<u8> {
        &self.unavailable
    }

    pub fn clock(&self) -> &TransportClock<E> {
        &self.clock
    }

    pub fn engine(&self) -> &E {
        self.clock.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.clock.engine_mut()
    }

    /// Length of the piece in transport seconds at the current tempo.
    pub fn effective_duration(&self) -> f64 {
        self.file
            .as_ref()
            .map_or(0.0, |f| self.tempo.effective_duration(f.duration_seconds))
    }

    /// Normalized playhead. Read live from the clock while playing.
    pub fn position(&self) -> f64 {
        match self.state {
            PlaybackState::Playing { .. } => normalize(self.clock.now(), self.effective_duration()),
            PlaybackState::Paused { paused_normalized_position, .. } => paused_normalized_position,
            PlaybackState::Stopped => self.position,
        }
    }

    /// Bar/beat readout of the playhead, e.g. `"3.2.1"`.
    pub fn position_label(&self, subdivisions: u32) -> Option<ArrayString<32>> {
        let file = self.file.as_ref()?;
        Some(position_label(
            self.position(),
            file.duration_seconds,
            file.native_tempo_bpm,
            file.time_signature,
            subdivisions,
        ))
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    // --- File ---

    /// Replace the current file. Playback stops and the tempo resets to
    /// the file's native tempo.
    pub fn load(&mut self, file: DrumFile) -> Result<(), PlaybackError> {
        let tempo = TempoState::native(file.native_tempo_bpm)?;
        self.stop();
        info!(
            name = %file.name,
            notes = file.notes().len(),
            tempo = file.native_tempo_bpm,
            duration = file.duration_seconds,
            "file loaded"
        );
        self.tempo = tempo;
        self.unavailable.clear();
        self.file = Some(file);
        Ok(())
    }

    // --- Transport ---

    /// Start playing from `position`, or from the last known position.
    pub fn play(&mut self, position: Option<f64>) -> Result<CommitOutcome, PlaybackError> {
        let ticket = self.begin_play(position)?;
        self.prepare(&ticket)?;
        self.commit(ticket)
    }

    /// First step of `play`: stop whatever is running and claim a new generation.
    pub fn begin_play(&mut self, position: Option<f64>) -> Result<PlayTicket, PlaybackError> {
        if self.file.is_none() {
            return Err(PlaybackError::NoFileLoaded);
        }
        if self.state.is_playing() {
            self.clock.pause();
        }
        let target = clamp_position(position.unwrap_or_else(|| self.position()));

        self.generation += 1;
        self.halt();
        self.position = target;

        if let Err(err) = self.clock.ensure_active() {
            return Err(self.abort(err.into()));
        }
        debug!(generation = self.generation, position = target, "play requested");
        Ok(PlayTicket { generation: self.generation, position: target })
    }

    /// Second step of `play`: load the sound of every pitch in the file that
    /// the engine does not have yet. A pitch that fails is skipped for the
    /// rest of this file. Does nothing for a superseded ticket.
    pub fn prepare(&mut self, ticket: &PlayTicket) -> Result<(), PlaybackError> {
        if ticket.generation != self.generation {
            return Ok(());
        }
        let pitches: Vec<u8> = match &self.file {
            Some(file) => file
                .notes()
                .distinct_pitches()
                .into_iter()
                .filter(|p| !self.unavailable.contains(p) && !self.clock.has_sample(*p))
                .collect(),
            None => return Ok(()),
        };
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };

        let mut failure = None;
        for pitch in pitches {
            match source.load(pitch) {
                Ok(sample) => match self.clock.install_sample(pitch, sample) {
                    Ok(()) => debug!(pitch, "sample installed"),
                    Err(EngineError::NotReady) => {
                        failure = Some(PlaybackError::EngineNotReady);
                        break;
                    }
                    Err(EngineError::Rejected(reason)) => {
                        warn!(pitch, %reason, "engine refused sample, skipping its notes");
                        self.unavailable.insert(pitch);
                    }
                },
                Err(err) => {
                    warn!(%err, "skipping notes without a sound");
                    self.unavailable.insert(pitch);
                }
            }
        }

        match failure {
            Some(err) => Err(self.abort(err)),
            None => Ok(()),
        }
    }

    /// Final step of `play`: schedule from the ticket's position and start
    /// the clock, unless another transition happened since `begin_play`.
    pub fn commit(&mut self, ticket: PlayTicket) -> Result<CommitOutcome, PlaybackError> {
        if ticket.generation != self.generation {
            warn!(
                ticket = ticket.generation,
                current = self.generation,
                "play superseded before commit"
            );
            return Ok(CommitOutcome::Superseded);
        }
        match self.run_from(ticket.position) {
            Ok(()) => Ok(CommitOutcome::Started),
            Err(err) => Err(self.abort(err)),
        }
    }

    /// Freeze playback, remembering where it stopped.
    pub fn pause(&mut self) {
        self.generation += 1;
        if self.state.is_playing() {
            // Freeze first: nothing fires after the reading is taken.
            self.clock.pause();
            let now = self.clock.now();
            let position = normalize(now, self.effective_duration());
            self.scheduler.cancel_all(&mut self.clock);
            self.tracker.halt();
            self.state = PlaybackState::Paused {
                paused_normalized_position: position,
                paused_transport_seconds: now,
            };
            self.position = position;
            debug!(position, transport = now, "paused");
            self.events.publish(PlayerEvent::PositionChanged(position));
        }
        self.publish_state();
    }

    /// Continue from the paused position. Replays `play` so every trigger
    /// belongs to a fresh scheduling pass. From `Stopped` this is `play(None)`;
    /// while playing it does nothing.
    pub fn resume(&mut self) -> Result<CommitOutcome, PlaybackError> {
        match self.state {
            PlaybackState::Paused { paused_normalized_position, .. } => {
                self.play(Some(paused_normalized_position))
            }
            PlaybackState::Playing { .. } => Ok(CommitOutcome::Started),
            PlaybackState::Stopped => self.play(None),
        }
    }

    /// Cancel everything, reset the clock and return to the start.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.clock.stop();
        self.scheduler.cancel_all(&mut self.clock);
        self.tracker.halt();
        self.state = PlaybackState::Stopped;
        self.position = 0.0;
        debug!("stopped");
        self.events.publish(PlayerEvent::PositionChanged(0.0));
        self.publish_state();
    }

    /// Move the playhead. Playing restarts from the new position; paused
    /// and stopped only record it for the next play.
    pub fn seek(&mut self, position: f64) -> Result<(), PlaybackError> {
        if self.file.is_none() {
            return Err(PlaybackError::NoFileLoaded);
        }
        let position = clamp_position(position);
        match self.state {
            PlaybackState::Playing { .. } => {
                self.play(Some(position))?;
                return Ok(());
            }
            PlaybackState::Paused { .. } => {
                self.state = PlaybackState::Paused {
                    paused_normalized_position: position,
                    paused_transport_seconds: position * self.effective_duration(),
                };
            }
            PlaybackState::Stopped => {}
        }
        self.generation += 1;
        self.position = position;
        debug!(position, state = self.state.name(), "playhead moved");
        self.events.publish(PlayerEvent::PositionChanged(position));
        self.publish_state();
        Ok(())
    }

    /// Change the user tempo, keeping the musical position.
    ///
    /// While playing, the position under the old ratio is converted to
    /// transport seconds under the new one and every note not yet passed is
    /// rescheduled. While paused the recorded transport seconds are rescaled.
    /// An invalid tempo is rejected and the previous one kept.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<(), PlaybackError> {
        let mut tempo = self.tempo;
        tempo.set_user_bpm(bpm)?;

        match self.state {
            PlaybackState::Playing { .. } => {
                self.clock.pause();
                let position = self.position();
                self.generation += 1;
                self.tempo = tempo;
                self.scheduler.cancel_all(&mut self.clock);
                self.tracker.halt();
                if let Err(err) = self.run_from(position) {
                    return Err(self.abort(err));
                }
            }
            PlaybackState::Paused { paused_normalized_position, .. } => {
                self.tempo = tempo;
                self.state = PlaybackState::Paused {
                    paused_normalized_position,
                    paused_transport_seconds: paused_normalized_position * self.effective_duration(),
                };
                self.publish_state();
            }
            PlaybackState::Stopped => self.tempo = tempo,
        }
        debug!(bpm, ratio = self.tempo.ratio(), "tempo changed");
        Ok(())
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    // --- Position tracking ---

    /// Ask for the next animation frame. `None` when not playing.
    pub fn request_frame(&self) -> Option<FrameRequest> {
        if !self.state.is_playing() {
            return None;
        }
        self.tracker.request().filter(|r| r.generation == self.generation)
    }

    /// Run a frame: read the clock, publish the playhead, and handle the
    /// end of the track. A request from an earlier run does nothing.
    pub fn on_frame(&mut self, request: FrameRequest) -> Result<FrameOutcome, PlaybackError> {
        if !self.state.is_playing() || !self.tracker.accepts(&request, self.generation) {
            debug!(request = request.generation, current = self.generation, "stale frame ignored");
            return Ok(FrameOutcome::Stale);
        }

        let reading = self.tracker.observe(self.clock.now(), self.effective_duration());
        self.position = reading.position;
        self.events.publish(PlayerEvent::PositionChanged(reading.position));
        if !reading.at_end {
            return Ok(FrameOutcome::Advanced(reading.position));
        }

        if self.loop_enabled {
            debug!("end of track, looping");
            self.play(Some(0.0))?;
            Ok(FrameOutcome::Looped)
        } else {
            debug!("end of track");
            self.stop();
            Ok(FrameOutcome::Ended)
        }
    }

    /// `request_frame` followed by `on_frame`.
    pub fn tick(&mut self) -> Result<FrameOutcome, PlaybackError> {
        match self.request_frame() {
            Some(request) => self.on_frame(request),
            None => Ok(FrameOutcome::Idle),
        }
    }

    // --- Internals ---

    /// Seek, schedule and start the clock at a normalized position.
    fn run_from(&mut self, position: f64) -> Result<(), PlaybackError> {
        let Some(file) = self.file.as_ref() else {
            return Err(PlaybackError::NoFileLoaded);
        };
        let ratio = self.tempo.ratio();
        let from_score = position * file.duration_seconds;
        let transport = self.tempo.to_transport(from_score);

        self.clock.set_tempo(self.tempo.user_bpm())?;
        self.clock.seek(transport)?;
        self.scheduler
            .schedule_from(&mut self.clock, file.notes(), ratio, from_score, &self.unavailable)?;
        self.clock.start(transport)?;

        self.state = PlaybackState::Playing { started_at_transport_seconds: transport };
        self.position = position;
        self.tracker.start(self.generation);
        debug!(generation = self.generation, position, transport, ratio, "playing");
        self.publish_state();
        self.events.publish(PlayerEvent::PositionChanged(position));
        Ok(())
    }

    /// Freeze the clock and cancel triggers without publishing.
    fn halt(&mut self) {
        self.clock.pause();
        self.scheduler.cancel_all(&mut self.clock);
        self.tracker.halt();
        self.state = PlaybackState::Stopped;
    }

    /// Fail a transition: end in `Stopped` with nothing outstanding.
    fn abort(&mut self, err: PlaybackError) -> PlaybackError {
        error!(%err, "transport transition aborted");
        self.halt();
        self.clock.stop();
        self.publish_state();
        err
    }

    fn publish_state(&mut self) {
        if self.state != self.published_state {
            self.published_state = self.state;
            self.events.publish(PlayerEvent::StateChanged(self.state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SampleLoadError;
    use crate::manual::ManualEngine;
    use dv_ir::{Note, Sample};

    /// Four notes one second apart on a 4 s file at 120 BPM.
    fn four_beats() -> DrumFile {
        let notes = vec![
            Note::new(36, 0.0, 1.0),
            Note::new(38, 1.0, 0.5),
            Note::new(36, 2.0, 1.0),
            Note::new(38, 3.0, 0.5),
        ];
        DrumFile::from_notes("four", notes, 120.0, 4.0)
    }

    fn player() -> Player<ManualEngine> {
        let mut player = Player::new(ManualEngine::new());
        player.load(four_beats()).unwrap();
        player
    }

    #[test]
    fn play_without_file_fails() {
        let mut player = Player::new(ManualEngine::new());
        assert_eq!(player.play(None), Err(PlaybackError::NoFileLoaded));
        assert!(player.state().is_stopped());
    }

    #[test]
    fn play_schedules_and_runs() {
        let mut player = player();
        assert_eq!(player.play(Some(0.0)), Ok(CommitOutcome::Started));
        assert!(player.state().is_playing());
        assert!(player.engine().is_running());
        assert_eq!(player.engine().pending_count(), 4);
    }

    #[test]
    fn pause_cancels_and_freezes() {
        let mut player = player();
        player.play(Some(0.0)).unwrap();
        player.engine_mut().advance(1.5);
        player.pause();

        assert_eq!(
            player.state(),
            PlaybackState::Paused { paused_normalized_position: 0.375, paused_transport_seconds: 1.5 }
        );
        assert_eq!(player.engine().pending_count(), 0);
        assert!(!player.engine().is_running());
    }

    #[test]
    fn stale_ticket_is_superseded() {
        let mut player = player();
        let first = player.begin_play(Some(0.0)).unwrap();
        let second = player.begin_play(Some(0.5)).unwrap();
        assert_eq!(player.commit(first), Ok(CommitOutcome::Superseded));
        assert_eq!(player.engine().schedule_calls(), 0);
        assert_eq!(player.commit(second), Ok(CommitOutcome::Started));
        assert_eq!(player.engine().pending_count(), 2);
    }

    #[test]
    fn stop_during_prepare_discards_commit() {
        let mut player = player();
        let ticket = player.begin_play(Some(0.0)).unwrap();
        player.stop();
        player.prepare(&ticket).unwrap();
        assert_eq!(player.commit(ticket), Ok(CommitOutcome::Superseded));
        assert!(player.state().is_stopped());
        assert!(!player.engine().is_running());
    }

    #[test]
    fn failed_sample_skips_its_notes() {
        let mut player = player().with_sample_source(|pitch: u8| {
            if pitch == 38 {
                Err(SampleLoadError::new(pitch, "missing"))
            } else {
                Ok(Sample::new("kick"))
            }
        });
        player.play(Some(0.0)).unwrap();
        assert_eq!(player.unavailable_pitches(), &BTreeSet::from([38]));
        assert!(player.engine().pending().all(|p| p.trigger.pitch == 36));
        assert_eq!(player.engine().pending_count(), 2);
    }

    #[test]
    fn samples_load_once() {
        let mut player = player().with_sample_source(|_pitch: u8| Ok(Sample::new("hit")));
        player.play(Some(0.0)).unwrap();
        player.stop();
        player.play(Some(0.0)).unwrap();
        assert_eq!(player.engine().installed_pitches(), &BTreeSet::from([36, 38]));
    }

    #[test]
    fn invalid_tempo_keeps_prior() {
        let mut player = player();
        player.set_tempo(90.0).unwrap();
        assert!(matches!(player.set_tempo(0.0), Err(PlaybackError::InvalidTempo(_))));
        assert_eq!(player.tempo().user_bpm(), 90.0);
    }

    #[test]
    fn load_resets_tempo_to_native() {
        let mut player = player();
        player.set_tempo(90.0).unwrap();
        player.load(DrumFile::from_notes("slow", vec![], 80.0, 2.0)).unwrap();
        assert_eq!(player.tempo().user_bpm(), 80.0);
        assert_eq!(player.tempo().ratio(), 1.0);
    }

    #[test]
    fn state_events_published_once_per_change() {
        let mut player = player();
        let events = player.subscribe();
        player.play(Some(0.0)).unwrap();
        player.pause();
        player.pause();

        let states: Vec<PlaybackState> = events
            .try_iter()
            .filter_map(|e| match e {
                PlayerEvent::StateChanged(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(states.len(), 2);
        assert!(states[0].is_playing());
        assert!(states[1].is_paused());
    }

    #[test]
    fn label_follows_playhead() {
        let mut player = player();
        player.seek(0.5).unwrap();
        // 2 s at 120 BPM = beat 4 of bar 1
        assert_eq!(player.position_label(4).unwrap().as_str(), "2.1.1");
    }
}
