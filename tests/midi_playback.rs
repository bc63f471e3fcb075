//! Parse Standard MIDI Files and play them through the transport.

use dv_engine::{FrameOutcome, ManualEngine, Player, SampleLoadError};
use dv_ir::{Sample, SampleData};

fn vlq(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.insert(0, (value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes
}

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Format 1, 480 ticks per quarter: a conductor track at 100 BPM and a
/// drum track with kick, hat, snare, hat on the four quarters of one bar.
fn one_bar_at_100() -> Vec<u8> {
    let mut conductor = Vec::new();
    conductor.extend(vlq(0));
    conductor.extend_from_slice(&[0xFF, 0x51, 0x03, 0x09, 0x27, 0xC0]); // 600000 us
    conductor.extend(vlq(0));
    conductor.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    let mut drums = Vec::new();
    drums.extend(vlq(0));
    drums.extend_from_slice(&[0xFF, 0x03, 5]);
    drums.extend_from_slice(b"Drums");
    for (i, pitch) in [36u8, 42, 38, 42].into_iter().enumerate() {
        drums.extend(vlq(if i == 0 { 0 } else { 240 }));
        drums.extend_from_slice(&[0x99, pitch, 100]);
        drums.extend(vlq(240));
        drums.extend_from_slice(&[0x89, pitch, 0]);
    }
    drums.extend(vlq(0));
    drums.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    let mut smf = chunk(b"MThd", &[0, 1, 0, 2, 0x01, 0xE0]);
    smf.extend(chunk(b"MTrk", &conductor));
    smf.extend(chunk(b"MTrk", &drums));
    smf
}

fn click() -> Sample {
    let mut sample = Sample::new("click");
    sample.data = SampleData::Mono(vec![8000; 32]);
    sample.sample_rate = 1000;
    sample
}

#[test]
fn parsed_file_has_expected_timing() {
    let file = dv_formats::load_midi(&one_bar_at_100(), "bar.mid").unwrap();
    assert_eq!(file.native_tempo_bpm, 100.0);
    let times: Vec<f64> = file.notes().iter().map(|n| n.time).collect();
    let expected = [0.0, 0.6, 1.2, 1.8];
    for (t, e) in times.iter().zip(expected) {
        assert!((t - e).abs() < 1e-9, "{t} vs {e}");
    }
    // Last hat released an eighth after its onset
    assert!((file.duration_seconds - 2.1).abs() < 1e-9);
    assert_eq!(file.drum_rows(), vec![42, 38, 36]);
}

#[test]
fn plays_every_note_once_at_double_speed() {
    let file = dv_formats::load_midi(&one_bar_at_100(), "bar.mid").unwrap();
    let mut player = Player::new(ManualEngine::new());
    player.load(file).unwrap();
    player.set_tempo(200.0).unwrap();
    player.play(Some(0.0)).unwrap();

    let mut outcome = FrameOutcome::Idle;
    for _ in 0..120 {
        player.engine_mut().advance(1.0 / 60.0);
        outcome = player.tick().unwrap();
        if outcome == FrameOutcome::Ended {
            break;
        }
    }
    assert_eq!(outcome, FrameOutcome::Ended);

    let fired = player.engine().fired();
    let pitches: Vec<u8> = fired.iter().map(|f| f.trigger.pitch).collect();
    assert_eq!(pitches, vec![36, 42, 38, 42]);
    assert!((fired[3].at - 0.9).abs() < 1e-9);
}

#[test]
fn missing_sound_silences_only_its_pitch() {
    let file = dv_formats::load_midi(&one_bar_at_100(), "bar.mid").unwrap();
    let mut player = Player::new(ManualEngine::with_mixer(1000)).with_sample_source(|pitch: u8| {
        if pitch == 42 {
            Err(SampleLoadError::new(pitch, "hat missing"))
        } else {
            Ok(click())
        }
    });
    player.load(file).unwrap();
    player.play(Some(0.0)).unwrap();

    let audio = player.engine_mut().render(2100);
    assert!(!audio[0].is_silent());
    let fired: Vec<u8> = player.engine().fired().iter().map(|f| f.trigger.pitch).collect();
    assert_eq!(fired, vec![36, 38]);
    // The hat at 0.6 s would have sounded here
    assert!(audio[600..632].iter().all(|f| f.is_silent()));
}
