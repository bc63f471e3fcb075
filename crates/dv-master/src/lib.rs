//! Headless controller for drumview.
//!
//! Provides a unified API for loading MIDI files, real-time playback and
//! offline rendering that the CLI and any front end can share.

mod config;
mod kit;
mod wav;

use std::path::{Path, PathBuf};

use dv_audio::CpalEngine;
use dv_engine::{AudioEngine, ManualEngine};
use thiserror::Error;
use tracing::{debug, info};

pub use config::{ConfigError, PreviewConfig};
pub use dv_engine::{CommitOutcome, Frame, FrameOutcome, PlaybackError, Player, PlayerEvent, SeekController};
pub use dv_formats::FormatError;
pub use dv_ir::{DrumFile, PlaybackState};
pub use kit::KitDirectory;
pub use wav::{frames_to_wav, write_wav};

/// Animation frames per second of rendered audio when rendering offline.
const RENDER_FRAME_RATE: u32 = 60;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Headless previewer controller: owns the player and the settings.
pub struct Controller<E: AudioEngine = CpalEngine> {
    config: PreviewConfig,
    player: Player<E>,
}

impl Controller<CpalEngine> {
    /// A controller on the default audio device. The device is opened on
    /// the first `play`.
    pub fn new(config: PreviewConfig) -> Self {
        Self::with_engine(CpalEngine::new(), config)
    }
}

impl Default for Controller<CpalEngine> {
    fn default() -> Self {
        Self::new(PreviewConfig::default())
    }
}

impl<E: AudioEngine> Controller<E> {
    pub fn with_engine(engine: E, config: PreviewConfig) -> Self {
        let mut player = Player::new(engine);
        if let Some(kit) = kit_for(&config) {
            player.set_sample_source(kit);
        }
        player.set_loop(config.loop_playback);
        Self { config, player }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn player(&self) -> &Player<E> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player<E> {
        &mut self.player
    }

    pub fn file(&self) -> Option<&DrumFile> {
        self.player.file()
    }

    // --- File management ---

    pub fn load_file(&mut self, path: &Path) -> Result<(), ControllerError> {
        let data = std::fs::read(path)
            .map_err(|source| ControllerError::Io { path: path.to_path_buf(), source })?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.load_midi(&data, name)
    }

    /// Parse and load a Standard MIDI File. A file whose tempo is neither
    /// embedded nor in its name plays at the configured default tempo.
    pub fn load_midi(&mut self, data: &[u8], file_name: &str) -> Result<(), ControllerError> {
        let mut file = dv_formats::load_midi(data, file_name)?;
        if file.embedded_tempo_bpm.is_none() && dv_formats::tempo_from_file_name(file_name).is_none() {
            debug!(tempo = self.config.default_tempo, "no tempo in file, using configured default");
            file.native_tempo_bpm = self.config.default_tempo;
        }
        self.player.load(file)?;
        Ok(())
    }

    // --- Offline rendering ---

    /// Play the loaded file from the normalized position `start` at the
    /// current tempo through a sample-accurate offline engine, until the end
    /// of the track or `max_seconds`. Looping is ignored.
    pub fn render_frames(
        &self,
        start: f64,
        sample_rate: u32,
        max_seconds: u32,
    ) -> Result<Vec<Frame>, ControllerError> {
        let file = self.player.file().ok_or(PlaybackError::NoFileLoaded)?.clone();
        let mut player = Player::new(ManualEngine::with_mixer(sample_rate));
        if let Some(kit) = kit_for(&self.config) {
            player.set_sample_source(kit);
        }
        player.load(file)?;
        player.set_tempo(self.player.tempo().user_bpm())?;
        player.play(Some(start))?;

        let max_frames = sample_rate as usize * max_seconds as usize;
        let block = (sample_rate / RENDER_FRAME_RATE).max(1) as usize;
        let mut frames = Vec::with_capacity(max_frames.min(sample_rate as usize * 60));
        while frames.len() < max_frames {
            let count = block.min(max_frames - frames.len());
            frames.extend(player.engine_mut().render(count));
            if player.tick()? == FrameOutcome::Ended {
                break;
            }
        }
        info!(frames = frames.len(), sample_rate, "offline render complete");
        Ok(frames)
    }

    pub fn render_to_wav(&self, start: f64, sample_rate: u32, max_seconds: u32) -> Result<Vec<u8>, ControllerError> {
        let frames = self.render_frames(start, sample_rate, max_seconds)?;
        Ok(wav::frames_to_wav(&frames, sample_rate))
    }
}

fn kit_for(config: &PreviewConfig) -> Option<KitDirectory> {
    let dir = config.kit_dir.as_ref()?;
    Some(KitDirectory::new(dir).with_overrides(config.samples.clone()))
}
