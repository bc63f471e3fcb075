//! drumview CLI: preview a MIDI drum file or export it to WAV.
//!
//! Usage:
//!   drumview path/to/groove.mid
//!   drumview path/to/groove.mid --tempo 90 --start 0.5 --loop
//!   drumview path/to/groove.mid --kit kits/acoustic --wav out.wav

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, process};

use dv_master::{Controller, FrameOutcome, PlayerEvent, PreviewConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "Usage: drumview <file.mid> [--tempo BPM] [--start POS] [--loop] [--kit DIR] [--config FILE] [--wav OUT.wav]";

/// Polling interval of the position readout (about one display frame).
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Grid steps per beat in the position readout.
const LABEL_SUBDIVISIONS: u32 = 4;

struct Args {
    path: PathBuf,
    tempo: Option<f64>,
    start: Option<f64>,
    looping: bool,
    kit: Option<PathBuf>,
    config: Option<PathBuf>,
    wav: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut parsed = Args {
        path: PathBuf::new(),
        tempo: None,
        start: None,
        looping: false,
        kit: None,
        config: None,
        wav: None,
    };
    let mut path = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--tempo" => {
                let v = value("--tempo")?;
                parsed.tempo = Some(v.parse().map_err(|_| format!("bad tempo: {v}"))?);
            }
            "--start" => {
                let v = value("--start")?;
                parsed.start = Some(v.parse().map_err(|_| format!("bad start position: {v}"))?);
            }
            "--loop" => parsed.looping = true,
            "--kit" => parsed.kit = Some(value("--kit")?.into()),
            "--config" => parsed.config = Some(value("--config")?.into()),
            "--wav" => parsed.wav = Some(value("--wav")?.into()),
            other if other.starts_with("--") => return Err(format!("unknown option {other}")),
            other => path = Some(PathBuf::from(other)),
        }
    }

    parsed.path = path.ok_or("missing MIDI file")?;
    Ok(parsed)
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args().unwrap_or_else(|e| fail(format!("{e}\n{USAGE}")));

    let mut config = match &args.config {
        Some(path) => PreviewConfig::load(path).unwrap_or_else(|e| fail(e)),
        None => PreviewConfig::default(),
    };
    if args.kit.is_some() {
        config.kit_dir = args.kit.clone();
    }
    if args.looping {
        config.loop_playback = true;
    }

    let mut ctrl = Controller::new(config);
    ctrl.load_file(&args.path)
        .unwrap_or_else(|e| fail(format!("Failed to load {}: {e}", args.path.display())));
    if let Some(bpm) = args.tempo {
        ctrl.player_mut().set_tempo(bpm).unwrap_or_else(|e| fail(e));
    }

    print_info(&ctrl);

    match &args.wav {
        Some(wav) => render_to_wav(&ctrl, wav, args.start.unwrap_or(0.0)),
        None => play_audio(&mut ctrl, args.start),
    }
}

fn print_info(ctrl: &Controller) {
    let Some(file) = ctrl.file() else {
        return;
    };
    let tempo = ctrl.player().tempo();
    println!("File:     {}", file.name);
    println!("Tracks:   {}", file.tracks.len());
    println!("Tempo:    {:.1} BPM (playing at {:.1})", tempo.native_bpm(), tempo.user_bpm());
    println!("Meter:    {}/{}", file.time_signature.numerator, file.time_signature.denominator);
    println!("Length:   {:.2} s", file.duration_seconds);
    println!();
    print!("{}", dv_ir::analyze(file));
    println!();
}

fn play_audio(ctrl: &mut Controller, start: Option<f64>) {
    let events = ctrl.player_mut().subscribe();
    ctrl.player_mut()
        .play(start)
        .unwrap_or_else(|e| fail(format!("Playback failed: {e}")));
    println!("Playing... (Ctrl-C to quit)");

    loop {
        match ctrl.player_mut().tick() {
            Ok(FrameOutcome::Ended) | Ok(FrameOutcome::Idle) => break,
            Ok(_) => {}
            Err(e) => fail(format!("Playback failed: {e}")),
        }
        for event in events.try_iter() {
            if let PlayerEvent::StateChanged(state) = event {
                tracing::debug!(state = state.name(), "state changed");
            }
        }
        if let Some(label) = ctrl.player().position_label(LABEL_SUBDIVISIONS) {
            print!("\r{:>10} | {:5.1}%", label.as_str(), ctrl.player().position() * 100.0);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(FRAME_INTERVAL);
    }

    if !ctrl.player().unavailable_pitches().is_empty() {
        warn!(pitches = ?ctrl.player().unavailable_pitches(), "some notes had no sound");
    }
    println!("\rDone.                    ");
}

fn render_to_wav(ctrl: &Controller, path: &Path, start: f64) {
    let config = ctrl.config();
    println!("Rendering to {} at {} Hz...", path.display(), config.render_sample_rate);

    let wav = ctrl
        .render_to_wav(start, config.render_sample_rate, config.max_render_seconds)
        .unwrap_or_else(|e| fail(format!("Render failed: {e}")));
    println!("Rendered {} bytes", wav.len());

    fs::write(path, &wav).unwrap_or_else(|e| fail(format!("Failed to write {}: {e}", path.display())));
    println!("Done.");
}
