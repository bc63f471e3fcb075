//! Standard MIDI File loader.
//!
//! Reads format 0 and 1 files with a ticks-per-quarter division. Every
//! track's notes are timed in seconds through the file's tempo map, which
//! is the "score time" the playback core expects.

use std::collections::{HashMap, VecDeque};

use dv_ir::{DrumFile, Note, TimeSignature, Track};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::tempo::resolve_native_tempo;
use crate::FormatError;

/// Default tempo before any Set Tempo event: 120 BPM.
const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

/// Load a MIDI file from bytes. `file_name` feeds the tempo fallback.
pub fn load_midi(data: &[u8], file_name: &str) -> Result<DrumFile, FormatError> {
    let smf = Smf::parse(data)?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) if tpq.as_int() > 0 => tpq.as_int(),
        Timing::Metrical(_) => return Err(FormatError::InvalidHeader),
        Timing::Timecode(..) => return Err(FormatError::UnsupportedDivision),
    };
    if smf.header.format == Format::Sequential {
        return Err(FormatError::UnsupportedFormat("only SMF format 0 and 1 are supported"));
    }

    let raw_tracks: Vec<RawTrack> = smf.tracks.iter().map(|events| collect_track(events)).collect();

    let mut tempo_changes: Vec<(u64, u32)> =
        raw_tracks.iter().flat_map(|t| t.tempos.iter().copied()).collect();
    tempo_changes.sort_by_key(|&(tick, _)| tick);
    let tempo_map = TempoMap::new(ticks_per_quarter, &tempo_changes);

    let embedded_tempo = tempo_changes
        .first()
        .map(|&(_, micros)| 60_000_000.0 / micros as f64);

    let time_signature = raw_tracks
        .iter()
        .flat_map(|t| t.time_signatures.iter().copied())
        .min_by_key(|&(tick, _)| tick)
        .map(|(_, ts)| ts)
        .unwrap_or_default();

    let mut duration: f64 = 0.0;
    let mut tracks = Vec::with_capacity(raw_tracks.len());
    for raw in raw_tracks {
        let mut notes = Vec::with_capacity(raw.notes.len());
        for n in &raw.notes {
            let time = tempo_map.seconds_at(n.on_tick);
            let end = tempo_map.seconds_at(n.off_tick.unwrap_or(n.on_tick));
            duration = duration.max(end);
            notes.push(Note::new(n.pitch, time, n.velocity as f32 / 127.0));
        }
        tracks.push(Track { name: raw.name, notes });
    }

    let native_tempo = resolve_native_tempo(embedded_tempo, file_name);
    let mut file = DrumFile::new(file_name, tracks, native_tempo, time_signature, duration);
    file.embedded_tempo_bpm = embedded_tempo;
    Ok(file)
}

// --- Track parsing ---

struct RawNote {
    pitch: u8,
    velocity: u8,
    on_tick: u64,
    off_tick: Option<u64>,
}

#[derive(Default)]
struct RawTrack {
    name: String,
    notes: Vec<RawNote>,
    /// (tick, microseconds per quarter)
    tempos: Vec<(u64, u32)>,
    time_signatures: Vec<(u64, TimeSignature)>,
}

fn collect_track(events: &[TrackEvent<'_>]) -> RawTrack {
    let mut track = RawTrack::default();
    let mut open: HashMap<u8, VecDeque<usize>> = HashMap::new();
    let mut tick: u64 = 0;

    for event in events {
        tick += event.delta.as_int() as u64;
        match event.kind {
            TrackEventKind::Midi { message, .. } => match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    let pitch = key.as_int();
                    open.entry(pitch).or_default().push_back(track.notes.len());
                    track.notes.push(RawNote { pitch, velocity: vel.as_int(), on_tick: tick, off_tick: None });
                }
                // Note-on at velocity 0 releases like a note-off
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    if let Some(idx) = open.get_mut(&key.as_int()).and_then(|q| q.pop_front()) {
                        track.notes[idx].off_tick = Some(tick);
                    }
                }
                _ => {}
            },
            TrackEventKind::Meta(meta) => match meta {
                MetaMessage::TrackName(name) if track.name.is_empty() => {
                    track.name = String::from_utf8_lossy(name).into_owned();
                }
                MetaMessage::Tempo(micros) if micros.as_int() > 0 => {
                    track.tempos.push((tick, micros.as_int()));
                }
                MetaMessage::TimeSignature(numerator, denominator_pow, ..) => {
                    let denominator = 1u8.checked_shl(denominator_pow as u32).unwrap_or(4);
                    track
                        .time_signatures
                        .push((tick, TimeSignature::new(numerator.max(1), denominator)));
                }
                MetaMessage::EndOfTrack => break,
                _ => {}
            },
            TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => {}
        }
    }

    track
}

// --- Tempo map ---

struct TempoSegment {
    tick: u64,
    seconds: f64,
    seconds_per_tick: f64,
}

/// Piecewise tick → seconds conversion.
struct TempoMap {
    ticks_per_quarter: f64,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    fn new(ticks_per_quarter: u16, changes: &[(u64, u32)]) -> Self {
        let tpq = ticks_per_quarter as f64;
        let mut map = Self {
            ticks_per_quarter: tpq,
            segments: vec![TempoSegment {
                tick: 0,
                seconds: 0.0,
                seconds_per_tick: Self::seconds_per_tick(DEFAULT_MICROS_PER_QUARTER, tpq),
            }],
        };
        for &(tick, micros) in changes {
            let seconds = map.seconds_at(tick);
            let seconds_per_tick = Self::seconds_per_tick(micros, map.ticks_per_quarter);
            match map.segments.last_mut() {
                Some(last) if last.tick == tick => last.seconds_per_tick = seconds_per_tick,
                _ => map.segments.push(TempoSegment { tick, seconds, seconds_per_tick }),
            }
        }
        map
    }

    fn seconds_per_tick(micros_per_quarter: u32, ticks_per_quarter: f64) -> f64 {
        micros_per_quarter as f64 / 1_000_000.0 / ticks_per_quarter
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let idx = self.segments.partition_point(|s| s.tick <= tick).saturating_sub(1);
        let seg = &self.segments[idx];
        seg.seconds + (tick - seg.tick) as f64 * seg.seconds_per_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(mut value: u32) -> Vec<u8> {
        let mut bytes = vec![(value & 0x7F) as u8];
        value >>= 7;
        while value > 0 {
            bytes.insert(0, (value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        bytes
    }

    fn smf(format: u16, division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(b"MThd");
        buf.extend(6u32.to_be_bytes());
        buf.extend(format.to_be_bytes());
        buf.extend((tracks.len() as u16).to_be_bytes());
        buf.extend(division.to_be_bytes());
        for body in tracks {
            buf.extend(b"MTrk");
            buf.extend((body.len() as u32).to_be_bytes());
            buf.extend(body);
        }
        buf
    }

    fn event(delta: u32, bytes: &[u8]) -> Vec<u8> {
        let mut e = vlq(delta);
        e.extend(bytes);
        e
    }

    fn end_of_track() -> Vec<u8> {
        event(0, &[0xFF, 0x2F, 0x00])
    }

    #[test]
    fn single_track_note_times() {
        // 480 tpq at default 120 BPM: 480 ticks = 0.5 s
        let mut body = Vec::new();
        body.extend(event(0, &[0x99, 36, 127]));
        body.extend(event(240, &[0x89, 36, 0]));
        body.extend(event(240, &[0x99, 38, 64]));
        body.extend(event(480, &[0x99, 38, 0]));
        body.extend(end_of_track());

        let file = load_midi(&smf(0, 480, &[body]), "beat.mid").unwrap();
        let notes = file.notes().as_slice();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch, 36);
        assert_eq!(notes[0].time, 0.0);
        assert_eq!(notes[0].velocity, 1.0);
        assert_eq!(notes[1].time, 0.5);
        assert!((notes[1].velocity - 64.0 / 127.0).abs() < 1e-6);
        assert!((file.duration_seconds - 1.0).abs() < 1e-9);
        assert_eq!(file.native_tempo_bpm, 120.0);
        assert_eq!(file.embedded_tempo_bpm, None);
    }

    #[test]
    fn running_status_is_honoured() {
        let mut body = Vec::new();
        body.extend(event(0, &[0x99, 36, 100]));
        body.extend(event(0, &[42, 90]));
        body.extend(event(96, &[36, 0]));
        body.extend(event(0, &[42, 0]));
        body.extend(end_of_track());

        let file = load_midi(&smf(0, 96, &[body]), "rs.mid").unwrap();
        assert_eq!(file.notes().len(), 2);
        assert!((file.duration_seconds - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tempo_and_time_signature_from_conductor_track() {
        // 100 BPM = 600000 us/quarter, 3/4
        let mut conductor = Vec::new();
        conductor.extend(event(0, &[0xFF, 0x51, 0x03, 0x09, 0x27, 0xC0]));
        conductor.extend(event(0, &[0xFF, 0x58, 0x04, 3, 2, 24, 8]));
        conductor.extend(end_of_track());

        let mut drums = Vec::new();
        drums.extend(event(0, &[0xFF, 0x03, 0x05, b'D', b'r', b'u', b'm', b's']));
        drums.extend(event(480, &[0x99, 38, 100]));
        drums.extend(event(60, &[0x89, 38, 0]));
        drums.extend(end_of_track());

        let file = load_midi(&smf(1, 480, &[conductor, drums]), "140bpm.mid").unwrap();
        assert_eq!(file.embedded_tempo_bpm, Some(100.0));
        assert_eq!(file.native_tempo_bpm, 100.0);
        assert_eq!(file.time_signature, TimeSignature::new(3, 4));
        assert_eq!(file.tracks[1].name, "Drums");
        // one quarter at 100 BPM
        assert!((file.notes().as_slice()[0].time - 0.6).abs() < 1e-9);
    }

    #[test]
    fn tempo_change_mid_file() {
        // 120 BPM for one quarter, then 60 BPM
        let mut body = Vec::new();
        body.extend(event(96, &[0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40]));
        body.extend(event(96, &[0x99, 36, 100]));
        body.extend(event(0, &[0x89, 36, 0]));
        body.extend(end_of_track());

        let file = load_midi(&smf(0, 96, &[body]), "x.mid").unwrap();
        // 0.5 s for the first quarter, 1.0 s for the second
        assert!((file.notes().as_slice()[0].time - 1.5).abs() < 1e-9);
    }

    #[test]
    fn unreleased_note_counts_its_onset_for_duration() {
        let mut body = Vec::new();
        body.extend(event(192, &[0x99, 49, 110]));
        body.extend(end_of_track());

        let file = load_midi(&smf(0, 96, &[body]), "crash.mid").unwrap();
        assert!((file.duration_seconds - 1.0).abs() < 1e-9);
    }

    #[test]
    fn file_name_tempo_fallback() {
        let mut body = Vec::new();
        body.extend(event(0, &[0x99, 36, 100]));
        body.extend(end_of_track());

        let file = load_midi(&smf(0, 96, &[body]), "85bpm_shuffle.mid").unwrap();
        assert_eq!(file.native_tempo_bpm, 85.0);
    }

    #[test]
    fn sysex_is_skipped() {
        let mut body = Vec::new();
        body.extend(event(0, &[0xF0, 0x03, 0x7E, 0x7F, 0xF7]));
        body.extend(event(0, &[0x99, 36, 100]));
        body.extend(end_of_track());

        let file = load_midi(&smf(0, 96, &[body]), "sx.mid").unwrap();
        assert_eq!(file.notes().len(), 1);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut data = smf(0, 96, &[end_of_track()]);
        data[0] = b'X';
        assert!(matches!(load_midi(&data, "bad.mid"), Err(FormatError::Midi(_))));
    }

    #[test]
    fn smpte_division_rejected() {
        let data = smf(0, 0xE728, &[end_of_track()]);
        assert!(matches!(load_midi(&data, "smpte.mid"), Err(FormatError::UnsupportedDivision)));
    }

    #[test]
    fn zero_division_rejected() {
        let data = smf(0, 0, &[end_of_track()]);
        assert!(matches!(load_midi(&data, "zero.mid"), Err(FormatError::InvalidHeader)));
    }

    #[test]
    fn several_notes_on_one_pitch_release_in_order() {
        let mut body = Vec::new();
        body.extend(event(0, &[0x99, 42, 100]));
        body.extend(event(96, &[0x99, 42, 80]));
        body.extend(event(96, &[0x89, 42, 0]));
        body.extend(event(96, &[0x99, 42, 0]));
        body.extend(end_of_track());

        let file = load_midi(&smf(0, 96, &[body]), "hats.mid").unwrap();
        let times: Vec<f64> = file.notes().iter().map(|n| n.time).collect();
        assert_eq!(times, vec![0.0, 0.5]);
        // Second hat released at tick 288
        assert!((file.duration_seconds - 1.5).abs() < 1e-9);
    }

    #[test]
    fn too_short_rejected() {
        assert!(matches!(load_midi(b"MThd", "s.mid"), Err(FormatError::Midi(_))));
    }
}
