//! WAV decoding for drum kit samples.
//!
//! Accepts PCM at 8, 16 and 24 bits and IEEE float at 32 bits, mono or
//! stereo. Everything is normalized to signed 16-bit on load.

use crate::FormatError;
use dv_ir::{Sample, SampleData};

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Load a WAV file from raw bytes into a Sample.
pub fn load_wav(data: &[u8], name: &str) -> Result<Sample, FormatError> {
    let header = parse_header(data)?;
    let sample_data = read_sample_data(data, &header)?;

    let mut sample = Sample::new(name);
    sample.data = sample_data;
    sample.sample_rate = header.sample_rate;
    Ok(sample)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Pcm,
    Float,
}

struct WavHeader {
    encoding: Encoding,
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: usize,
    data_size: usize,
}

fn parse_header(data: &[u8]) -> Result<WavHeader, FormatError> {
    if data.len() < 44 {
        return Err(FormatError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidHeader);
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut data_chunk: Option<(usize, usize)> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;

        if chunk_id == b"fmt " && chunk_size >= 16 && pos + 24 <= data.len() {
            let mut format = read_u16_le(data, pos + 8);
            let channels = read_u16_le(data, pos + 10);
            let rate = read_u32_le(data, pos + 12);
            let bits = read_u16_le(data, pos + 22);
            // WAVE_FORMAT_EXTENSIBLE keeps the real tag in the sub-format GUID
            if format == FORMAT_EXTENSIBLE && chunk_size >= 40 && pos + 34 <= data.len() {
                format = read_u16_le(data, pos + 32);
            }
            fmt = Some((format, channels, rate, bits));
        } else if chunk_id == b"data" {
            data_chunk = Some((pos + 8, chunk_size));
        }

        pos = pos.saturating_add(8 + chunk_size);
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (format, num_channels, sample_rate, bits_per_sample) = fmt.ok_or(FormatError::InvalidHeader)?;
    let (data_offset, data_size) = data_chunk.ok_or(FormatError::InvalidHeader)?;

    let encoding = match (format, bits_per_sample) {
        (FORMAT_PCM, 8 | 16 | 24) => Encoding::Pcm,
        (FORMAT_IEEE_FLOAT, 32) => Encoding::Float,
        (FORMAT_PCM | FORMAT_IEEE_FLOAT, _) => {
            return Err(FormatError::UnsupportedFormat("unsupported WAV bit depth"))
        }
        _ => return Err(FormatError::UnsupportedFormat("unsupported WAV encoding")),
    };
    if !(1..=2).contains(&num_channels) {
        return Err(FormatError::UnsupportedFormat("only mono and stereo WAV files are supported"));
    }
    if sample_rate == 0 {
        return Err(FormatError::InvalidHeader);
    }

    Ok(WavHeader { encoding, num_channels, sample_rate, bits_per_sample, data_offset, data_size })
}

fn read_sample_data(data: &[u8], header: &WavHeader) -> Result<SampleData, FormatError> {
    let start = header.data_offset.min(data.len());
    let end = header.data_offset.saturating_add(header.data_size).min(data.len());
    let raw = &data[start..end];

    let bytes_per_sample = (header.bits_per_sample / 8) as usize;
    let decode: fn(&[u8]) -> i16 = match (header.encoding, header.bits_per_sample) {
        (Encoding::Pcm, 8) => decode_u8,
        (Encoding::Pcm, 16) => decode_i16,
        (Encoding::Pcm, 24) => decode_i24,
        (Encoding::Float, 32) => decode_f32,
        _ => return Err(FormatError::UnsupportedFormat("unsupported WAV bit depth")),
    };

    if header.num_channels == 1 {
        let mono = raw.chunks_exact(bytes_per_sample).map(decode).collect();
        return Ok(SampleData::Mono(mono));
    }

    let frame_bytes = bytes_per_sample * 2;
    let mut left = Vec::with_capacity(raw.len() / frame_bytes);
    let mut right = Vec::with_capacity(raw.len() / frame_bytes);
    for frame in raw.chunks_exact(frame_bytes) {
        left.push(decode(&frame[..bytes_per_sample]));
        right.push(decode(&frame[bytes_per_sample..]));
    }
    Ok(SampleData::Stereo(left, right))
}

/// 8-bit WAV is unsigned with center 128.
fn decode_u8(b: &[u8]) -> i16 {
    (b[0] as i16 - 128) << 8
}

fn decode_i16(b: &[u8]) -> i16 {
    i16::from_le_bytes([b[0], b[1]])
}

/// Keep the top 16 bits of a 24-bit sample.
fn decode_i24(b: &[u8]) -> i16 {
    i16::from_le_bytes([b[1], b[2]])
}

fn decode_f32(b: &[u8]) -> i16 {
    let v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    if v.is_nan() {
        return 0;
    }
    (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
