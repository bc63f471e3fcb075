//! File feature analysis: what notes and drums a DrumFile uses.

use alloc::collections::BTreeMap;
use core::fmt;

use crate::drum_file::DrumFile;
use crate::drum_map::{drum_name, note_name, GM_DRUM_RANGE};

/// Summary of what a drum file uses.
pub struct FileFeatures {
    /// Hits per pitch
    pub hits: BTreeMap<u8, usize>,
    pub total_notes: usize,
    pub note_range: Option<(u8, u8)>,
    /// Notes outside the GM percussion map
    pub non_drum_notes: usize,
    pub velocity_range: Option<(f32, f32)>,
}

/// Analyze a file and return a summary of its notes.
pub fn analyze(file: &DrumFile) -> FileFeatures {
    let mut features = FileFeatures {
        hits: BTreeMap::new(),
        total_notes: 0,
        note_range: None,
        non_drum_notes: 0,
        velocity_range: None,
    };

    for note in file.notes() {
        features.total_notes += 1;
        *features.hits.entry(note.pitch).or_insert(0) += 1;
        features.note_range = Some(match features.note_range {
            Some((lo, hi)) => (lo.min(note.pitch), hi.max(note.pitch)),
            None => (note.pitch, note.pitch),
        });
        features.velocity_range = Some(match features.velocity_range {
            Some((lo, hi)) => (lo.min(note.velocity), hi.max(note.velocity)),
            None => (note.velocity, note.velocity),
        });
        if !GM_DRUM_RANGE.contains(&note.pitch) {
            features.non_drum_notes += 1;
        }
    }

    features
}

impl fmt::Display for FileFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Notes:    {}", self.total_notes)?;
        if let Some((lo, hi)) = self.note_range {
            writeln!(f, "Range:    {} - {}", note_name(lo), note_name(hi))?;
        }
        if let Some((lo, hi)) = self.velocity_range {
            writeln!(f, "Velocity: {:.2} - {:.2}", lo, hi)?;
        }
        if self.non_drum_notes > 0 {
            writeln!(f, "Non-GM:   {} notes", self.non_drum_notes)?;
        }
        for (pitch, count) in self.hits.iter().rev() {
            let name = drum_name(*pitch).unwrap_or("-");
            writeln!(f, "  {:>3} {:<4} {:<20} {}", pitch, note_name(*pitch), name, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;
    use alloc::vec;

    #[test]
    fn counts_hits_per_pitch() {
        let file = DrumFile::from_notes(
            "t",
            vec![
                Note::new(36, 0.0, 1.0),
                Note::new(38, 0.5, 0.5),
                Note::new(36, 1.0, 0.8),
                Note::new(20, 1.5, 0.2),
            ],
            120.0,
            2.0,
        );
        let features = analyze(&file);
        assert_eq!(features.total_notes, 4);
        assert_eq!(features.hits[&36], 2);
        assert_eq!(features.note_range, Some((20, 38)));
        assert_eq!(features.non_drum_notes, 1);
        assert_eq!(features.velocity_range, Some((0.2, 1.0)));
    }

    #[test]
    fn empty_file_has_no_ranges() {
        let file = DrumFile::from_notes("empty", vec![], 120.0, 0.0);
        let features = analyze(&file);
        assert_eq!(features.total_notes, 0);
        assert!(features.note_range.is_none());
    }
}
