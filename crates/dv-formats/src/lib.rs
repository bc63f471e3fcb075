//! Format parsers for drumview.
//!
//! Parses Standard MIDI Files into a `DrumFile` and WAV files into
//! `Sample`s for the drum kit.

mod midi_format;
mod tempo;
mod wav_format;

pub use midi_format::load_midi;
pub use dv_ir::DEFAULT_TEMPO_BPM;
pub use tempo::{resolve_native_tempo, tempo_from_file_name};
pub use wav_format::load_wav;

use thiserror::Error;

/// Error type for format parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid file header")]
    InvalidHeader,
    /// Unexpected end of file
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// SMPTE time division is not supported
    #[error("SMPTE time division is not supported")]
    UnsupportedDivision,
    /// Unsupported format version or encoding
    #[error("unsupported format: {0}")]
    UnsupportedFormat(&'static str),
    /// Standard MIDI File could not be decoded
    #[error("invalid MIDI file: {0}")]
    Midi(#[from] midly::Error),
}
