//! Clip decoding and normalization
//!
//! Synthesized clips arrive either as raw signed 16-bit little-endian PCM
//! or as WAV. Both decode into a [`PcmBuffer`], from which the real spoken
//! duration is measured.

pub mod timeline;

use std::io::Cursor;

use rubato::{FftFixedIn, Resampler};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use timeline::{AudioTimeline, TimelineEntry};

/// Sample rate of the assembled track
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;
const I16_SCALE: f32 = 32_768.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// Encoding of a synthesized clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AudioFormat {
    /// Headerless s16le mono at `sample_rate`
    Pcm { sample_rate: u32 },
    /// RIFF/WAVE container
    Wav,
}

impl AudioFormat {
    /// Use WAV when the bytes carry a RIFF header, else `declared`.
    pub fn detect(bytes: &[u8], declared: AudioFormat) -> AudioFormat {
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioFormat::Wav
        } else {
            declared
        }
    }

    /// Parse a synthesis output format name such as `pcm_44100`.
    pub fn from_output_format(name: &str) -> Option<AudioFormat> {
        let rate = name.strip_prefix("pcm_")?.parse().ok()?;
        Some(AudioFormat::Pcm { sample_rate: rate })
    }
}

/// Decoded interleaved samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Duration measured from the sample count, rounded down to the ms
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Downmix to mono and resample to `sample_rate`.
    pub fn normalized(self, sample_rate: u32) -> Result<PcmBuffer, DecodeError> {
        let mono = downmix(&self.samples, self.channels);
        Ok(PcmBuffer {
            samples: resample(&mono, self.sample_rate, sample_rate)?,
            sample_rate,
            channels: 1,
        })
    }
}

/// Decode clip bytes in `format`.
pub fn decode(bytes: &[u8], format: AudioFormat) -> Result<PcmBuffer, DecodeError> {
    match AudioFormat::detect(bytes, format) {
        AudioFormat::Wav => decode_wav(bytes),
        AudioFormat::Pcm { sample_rate } => decode_pcm(bytes, sample_rate),
    }
}

fn decode_pcm(bytes: &[u8], sample_rate: u32) -> Result<PcmBuffer, DecodeError> {
    if sample_rate == 0 {
        return Err(DecodeError("PCM sample rate is zero".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError(format!(
            "PCM stream has odd byte length {}",
            bytes.len()
        )));
    }
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(PcmBuffer {
        samples,
        sample_rate,
        channels: 1,
    })
}

fn decode_wav(bytes: &[u8]) -> Result<PcmBuffer, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DecodeError(format!("failed to parse WAV: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| DecodeError(format!("failed to read WAV samples: {e}")))?,
        (hound::SampleFormat::Int, bits @ (24 | 32)) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v >> (bits - 16)) as i16))
            .collect::<Result<_, _>>()
            .map_err(|e| DecodeError(format!("failed to read WAV samples: {e}")))?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<Result<_, _>>()
            .map_err(|e| DecodeError(format!("failed to read WAV samples: {e}")))?,
        (format, bits) => {
            return Err(DecodeError(format!(
                "unsupported WAV encoding: {bits}-bit {format:?}"
            )))
        }
    };

    Ok(PcmBuffer {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let n = usize::from(channels);
    samples
        .chunks_exact(n)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / i32::from(channels)) as i16
        })
        .collect()
}

/// Band-limited resampling through rubato's FFT resampler.
///
/// The resampler's output delay is trimmed, so sample `i` of the result
/// lines up with time `i / to_rate` of the input.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Result<Vec<i16>, DecodeError> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return Ok(samples.to_vec());
    }
    let resample_err = |e: &dyn std::fmt::Display| {
        DecodeError(format!("resampling {from_rate} Hz to {to_rate} Hz failed: {e}"))
    };

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        1,
    )
    .map_err(|e| resample_err(&e))?;

    let input: Vec<f32> = samples.iter().map(|&s| f32::from(s) / I16_SCALE).collect();
    let expected = (samples.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    let delay = resampler.output_delay();
    let mut out: Vec<f32> = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut pos = 0;
    while pos < input.len() {
        let end = (pos + resampler.input_frames_next()).min(input.len());
        let chunk = [&input[pos..end]];
        let frames = if end - pos == resampler.input_frames_next() {
            resampler.process(&chunk[..], None)
        } else {
            resampler.process_partial(Some(&chunk[..]), None)
        }
        .map_err(|e| resample_err(&e))?;
        out.extend_from_slice(&frames[0]);
        pos = end;
    }

    // Flush the delay line
    while out.len() < delay + expected {
        let frames = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| resample_err(&e))?;
        if frames[0].is_empty() {
            break;
        }
        out.extend_from_slice(&frames[0]);
    }

    Ok(out
        .into_iter()
        .skip(delay)
        .take(expected)
        .map(|v| (v * I16_SCALE).round().clamp(-I16_SCALE, I16_SCALE - 1.0) as i16)
        .collect())
}

#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}
