//! Drum kit read from a directory of WAV files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use dv_engine::{SampleLoadError, SampleSource};
use dv_ir::{sample_file, Sample};
use tracing::debug;

/// Loads the sound for a pitch from `dir`, using the General-MIDI kit map
/// unless an override names another file.
#[derive(Clone, Debug)]
pub struct KitDirectory {
    dir: PathBuf,
    overrides: BTreeMap<u8, String>,
}

impl KitDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), overrides: BTreeMap::new() }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<u8, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// File that voices `pitch`, if any.
    pub fn file_for(&self, pitch: u8) -> Option<PathBuf> {
        let name = match self.overrides.get(&pitch) {
            Some(name) => name.as_str(),
            None => sample_file(pitch)?,
        };
        Some(self.dir.join(name))
    }
}

impl SampleSource for KitDirectory {
    fn load(&mut self, pitch: u8) -> Result<Sample, SampleLoadError> {
        let path = self
            .file_for(pitch)
            .ok_or_else(|| SampleLoadError::new(pitch, "no kit sound for this note"))?;
        let data = std::fs::read(&path)
            .map_err(|e| SampleLoadError::new(pitch, format!("{}: {e}", path.display())))?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let sample = dv_formats::load_wav(&data, name)
            .map_err(|e| SampleLoadError::new(pitch, format!("{}: {e}", path.display())))?;
        debug!(pitch, file = %path.display(), frames = sample.len(), "kit sample read");
        Ok(sample)
    }
}
