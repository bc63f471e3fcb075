//! Core data model for drumview.
//!
//! This crate defines the types shared by the file parser, the playback
//! core and the audio backends: parsed notes and files, tempo state, the
//! score-time/transport-time mapping, and sample data.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod analysis;
pub mod drum_map;
mod drum_file;
mod note;
mod playback;
mod position;
mod sample;
pub mod time_map;

pub use analysis::{analyze, FileFeatures};
pub use drum_file::{DrumFile, TimeSignature, Track};
pub use drum_map::{drum_name, note_name, sample_file, GM_DRUM_RANGE};
pub use note::{Note, NoteList};
pub use playback::{clamp_position, normalize, PlaybackState};
pub use position::{bar_position, measure_count, position_label, BarPosition};
pub use sample::{Sample, SampleData, SampleKey};
pub use time_map::{
    effective_duration, to_score_seconds, to_transport_seconds, InvalidTempo, TempoState, DEFAULT_TEMPO_BPM,
};
