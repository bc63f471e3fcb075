//! General MIDI percussion map (channel 10, notes 35-81).

use core::ops::RangeInclusive;

use arrayvec::ArrayString;

/// Pitches covered by the General MIDI percussion key map.
pub const GM_DRUM_RANGE: RangeInclusive<u8> = 35..=81;

/// General MIDI name of a percussion note.
pub fn drum_name(pitch: u8) -> Option<&'static str> {
    let name = match pitch {
        35 => "Acoustic Bass Drum",
        36 => "Bass Drum 1",
        37 => "Side Stick",
        38 => "Acoustic Snare",
        39 => "Hand Clap",
        40 => "Electric Snare",
        41 => "Low Floor Tom",
        42 => "Closed Hi-Hat",
        43 => "High Floor Tom",
        44 => "Pedal Hi-Hat",
        45 => "Low Tom",
        46 => "Open Hi-Hat",
        47 => "Low-Mid Tom",
        48 => "Hi-Mid Tom",
        49 => "Crash Cymbal 1",
        50 => "High Tom",
        51 => "Ride Cymbal 1",
        52 => "Chinese Cymbal",
        53 => "Ride Bell",
        54 => "Tambourine",
        55 => "Splash Cymbal",
        56 => "Cowbell",
        57 => "Crash Cymbal 2",
        58 => "Vibraslap",
        59 => "Ride Cymbal 2",
        60 => "Hi Bongo",
        61 => "Low Bongo",
        62 => "Mute Hi Conga",
        63 => "Open Hi Conga",
        64 => "Low Conga",
        65 => "High Timbale",
        66 => "Low Timbale",
        67 => "High Agogo",
        68 => "Low Agogo",
        69 => "Cabasa",
        70 => "Maracas",
        71 => "Short Whistle",
        72 => "Long Whistle",
        73 => "Short Guiro",
        74 => "Long Guiro",
        75 => "Claves",
        76 => "Hi Wood Block",
        77 => "Low Wood Block",
        78 => "Mute Cuica",
        79 => "Open Cuica",
        80 => "Mute Triangle",
        81 => "Open Triangle",
        _ => return None,
    };
    Some(name)
}

/// Kit file that voices a percussion note.
///
/// The kit is a small acoustic set; percussion it lacks falls back to the
/// nearest-sounding piece (hand percussion to snare, woodblocks to hats
/// or toms).
pub fn sample_file(pitch: u8) -> Option<&'static str> {
    let file = match pitch {
        35 | 36 => "kick.wav",
        37..=40 | 54 | 56 | 58 | 60..=63 | 67..=69 | 71..=75 | 78 | 79 => "snare.wav",
        41 | 43 | 64 | 77 => "floor-tom.wav",
        45 | 50 | 65 => "rack-tom-1.wav",
        47 | 48 | 66 => "rack-tom-2.wav",
        42 | 70 | 76 | 80 => "hi-hat-closed.wav",
        44 => "hi-hat-pedal.wav",
        46 | 81 => "hi-hat-open.wav",
        49 | 57 => "crash.wav",
        51 | 53 | 59 => "ride.wav",
        52 => "china.wav",
        55 => "splash.wav",
        _ => return None,
    };
    Some(file)
}

const PITCH_CLASSES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Scientific pitch name, e.g. `36 -> "C2"`, `60 -> "C4"`.
pub fn note_name(pitch: u8) -> ArrayString<4> {
    use core::fmt::Write;

    let octave = pitch as i32 / 12 - 1;
    let mut name = ArrayString::new();
    let _ = write!(name, "{}{}", PITCH_CLASSES[pitch as usize % 12], octave);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_gm_drum_has_name_and_sample() {
        for pitch in GM_DRUM_RANGE {
            assert!(drum_name(pitch).is_some(), "no name for {}", pitch);
            assert!(sample_file(pitch).is_some(), "no sample for {}", pitch);
        }
    }

    #[test]
    fn outside_gm_range_is_unmapped() {
        assert_eq!(drum_name(34), None);
        assert_eq!(sample_file(82), None);
    }

    #[test]
    fn kick_and_snare_mapping() {
        assert_eq!(sample_file(36), Some("kick.wav"));
        assert_eq!(sample_file(38), Some("snare.wav"));
        assert_eq!(sample_file(42), Some("hi-hat-closed.wav"));
        assert_eq!(drum_name(42), Some("Closed Hi-Hat"));
    }

    #[test]
    fn note_names() {
        assert_eq!(note_name(36).as_str(), "C2");
        assert_eq!(note_name(42).as_str(), "F#2");
        assert_eq!(note_name(0).as_str(), "C-1");
        assert_eq!(note_name(127).as_str(), "G9");
    }
}
