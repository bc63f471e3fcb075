//! A parsed drum file.

use alloc::string::String;
use alloc::vec::Vec;

use crate::drum_map::GM_DRUM_RANGE;
use crate::note::{Note, NoteList};

/// Musical time signature (e.g. 4/4, 6/8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const fn new(numerator: u8, denominator: u8) -> Self {
        Self { numerator, denominator }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl core::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Notes from one track of the source file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    pub name: String,
    pub notes: Vec<Note>,
}

/// Everything the playback core needs from a parsed file.
#[derive(Clone, Debug, PartialEq)]
pub struct DrumFile {
    /// Display name (usually the file name)
    pub name: String,
    /// Tracks as they appear in the file
    pub tracks: Vec<Track>,
    /// Tempo the note times were authored at
    pub native_tempo_bpm: f64,
    /// Tempo embedded in the file, if any
    pub embedded_tempo_bpm: Option<f64>,
    pub time_signature: TimeSignature,
    /// Length at the native tempo; authoritative for end-of-track at ratio 1.0
    pub duration_seconds: f64,
    notes: NoteList,
}

impl DrumFile {
    /// Assemble a file from its tracks. The flattened note list is built here.
    pub fn new(
        name: &str,
        tracks: Vec<Track>,
        native_tempo_bpm: f64,
        time_signature: TimeSignature,
        duration_seconds: f64,
    ) -> Self {
        let notes = tracks.iter().flat_map(|t| t.notes.iter().copied()).collect();
        Self {
            name: String::from(name),
            tracks,
            native_tempo_bpm,
            embedded_tempo_bpm: None,
            time_signature,
            duration_seconds: duration_seconds.max(0.0),
            notes,
        }
    }

    /// A single-track file, mostly for tests and generated patterns.
    pub fn from_notes(name: &str, notes: Vec<Note>, native_tempo_bpm: f64, duration_seconds: f64) -> Self {
        let track = Track { name: String::from(name), notes };
        Self::new(name, alloc::vec![track], native_tempo_bpm, TimeSignature::default(), duration_seconds)
    }

    /// All notes of all tracks, sorted by onset.
    pub fn notes(&self) -> &NoteList {
        &self.notes
    }

    /// Distinct GM drum pitches present, highest first (timeline row order).
    pub fn drum_rows(&self) -> Vec<u8> {
        let mut rows: Vec<u8> = self
            .notes
            .distinct_pitches()
            .into_iter()
            .filter(|p| GM_DRUM_RANGE.contains(p))
            .collect();
        rows.reverse();
        rows
    }
}
