//! Native tempo resolution.

use dv_ir::DEFAULT_TEMPO_BPM;

/// Read a tempo from a leading number in a file name (`"95bpm_groove.mid"`).
///
/// Two or three leading digits, optionally followed by `bpm`, accepted when
/// strictly between 30 and 400 BPM. Directory components are ignored.
pub fn tempo_from_file_name(name: &str) -> Option<f64> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let digits: String = base.chars().take_while(|c| c.is_ascii_digit()).take(3).collect();
    if digits.len() < 2 {
        return None;
    }
    let bpm: u32 = digits.parse().ok()?;
    (bpm > 30 && bpm < 400).then_some(bpm as f64)
}

/// Pick the tempo note times are authored at: embedded, then file name, then 120 BPM.
pub fn resolve_native_tempo(embedded: Option<f64>, file_name: &str) -> f64 {
    embedded
        .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
        .or_else(|| tempo_from_file_name(file_name))
        .unwrap_or(DEFAULT_TEMPO_BPM)
}
