//! Parsed notes.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

/// Highest valid MIDI pitch.
const MAX_PITCH: u8 = 127;

/// A single drum hit, timed at the file's native tempo.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    /// MIDI pitch (0-127)
    pub pitch: u8,
    /// Onset in score seconds (native tempo), never negative
    pub time: f64,
    /// Normalized velocity (0.0-1.0)
    pub velocity: f32,
}

impl Note {
    /// Create a note, clamping fields into their valid ranges.
    pub fn new(pitch: u8, time: f64, velocity: f32) -> Self {
        Self {
            pitch: pitch.min(MAX_PITCH),
            time: if time.is_finite() { time.max(0.0) } else { 0.0 },
            velocity: if velocity.is_nan() { 0.0 } else { velocity.clamp(0.0, 1.0) },
        }
    }
}

/// The notes of one file, kept in ascending onset order.
///
/// Insertion order is irrelevant: the list sorts itself on construction.
/// It is never edited in place; a new file replaces it wholesale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteList {
    notes: Vec<Note>,
}

impl NoteList {
    /// Build a list from notes in any order.
    pub fn new(mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { notes }
    }

    pub fn as_slice(&self) -> &[Note] {
        &self.notes
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Note> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Index of the first note whose onset is at or after `score_seconds`.
    ///
    /// `tolerance` widens the boundary so a note sitting exactly on a seek
    /// target survives float round-off in the position math.
    pub fn first_at_or_after(&self, score_seconds: f64, tolerance: f64) -> usize {
        let bound = score_seconds - tolerance;
        self.notes.partition_point(|n| n.time < bound)
    }

    /// Notes at or after `score_seconds`, in onset order.
    pub fn from_time(&self, score_seconds: f64, tolerance: f64) -> &[Note] {
        &self.notes[self.first_at_or_after(score_seconds, tolerance)..]
    }

    /// Every distinct pitch used, ascending.
    pub fn distinct_pitches(&self) -> BTreeSet<u8> {
        self.notes.iter().map(|n| n.pitch).collect()
    }
}

impl<'a> IntoIterator for &'a NoteList {
    type Item = &'a Note;
    type IntoIter = core::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.iter()
    }
}

impl FromIterator<Note> for NoteList {
    fn from_iter<I: IntoIterator<Item = Note>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
