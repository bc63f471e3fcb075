//! Playback transport and scheduling core for drumview.
//!
//! The [`Player`] state machine drives a [`TransportClock`] over any
//! [`AudioEngine`]: it schedules one trigger per note through the
//! [`NoteScheduler`], tracks the playhead with a [`PositionTracker`], and
//! publishes [`PlayerEvent`]s. The [`Mixer`] renders fired triggers into
//! [`Frame`]s for engines that produce audio.

mod clock;
mod error;
mod event_queue;
mod events;
mod frame;
mod manual;
mod mixer;
mod player;
pub mod scheduler;
mod seek;
mod source;
pub mod tracker;
mod voice;
mod voice_pool;

pub use clock::{velocity_to_gain, AudioEngine, HandleId, TransportClock, Trigger, VELOCITY_GAIN};
pub use error::{EngineError, PlaybackError, SampleLoadError};
pub use event_queue::{PendingTrigger, TriggerQueue};
pub use events::{EventBus, PlayerEvent};
pub use frame::Frame;
pub use manual::{FiredTrigger, ManualEngine};
pub use mixer::Mixer;
pub use player::{CommitOutcome, FrameOutcome, PlayTicket, Player};
pub use scheduler::{NoteScheduler, ScheduleReport, ScheduledHandleSet, BOUNDARY_TOLERANCE};
pub use seek::{position_from_pointer, SeekController};
pub use source::SampleSource;
pub use tracker::{FrameRequest, PositionTracker, TrackerReading, END_OF_TRACK_THRESHOLD};
pub use voice::Voice;
pub use voice_pool::{VoicePool, MAX_VOICES};
