//! Track assembly
//!
//! Clips are laid end to end in turn order with a fixed silence gap:
//!
//! ```text
//! entries[0].start_ms == 0
//! entries[i].end_ms - entries[i].start_ms == clips[i].duration_ms
//! entries[i].end_ms + gap_ms == entries[i + 1].start_ms
//! ```
//!
//! The written track places each clip at exactly these offsets, so subtitle
//! cues and the video agree with the audio to within one sample.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use super::{decode, DecodeError};
use crate::error::TimelineError;
use crate::script::ScriptTurn;
use crate::tts::SynthesizedClip;

/// Default silence between turns
pub const DEFAULT_GAP_MS: u64 = 400;

/// A turn's placement in the track, in absolute milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub turn_index: usize,
    pub speaker_tag: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimelineEntry {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Offset table for the assembled track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioTimeline {
    entries: Vec<TimelineEntry>,
    gap_ms: u64,
    total_ms: u64,
}

impl AudioTimeline {
    /// Compute offsets for `clips`, which must be in turn order.
    pub fn build(
        clips: &[SynthesizedClip],
        turns: &[ScriptTurn],
        gap_ms: u64,
    ) -> Result<Self, TimelineError> {
        if clips.is_empty() {
            return Err(TimelineError::Empty);
        }

        let mut entries: Vec<TimelineEntry> = Vec::with_capacity(clips.len());
        let mut cursor = 0u64;
        for clip in clips {
            if let Some(prev) = entries.last() {
                if clip.turn_index <= prev.turn_index {
                    return Err(TimelineError::OutOfOrder {
                        previous: prev.turn_index,
                        found: clip.turn_index,
                    });
                }
                cursor += gap_ms;
            }
            if clip.duration_ms == 0 {
                return Err(TimelineError::NonPositiveDuration {
                    turn_index: clip.turn_index,
                });
            }

            let speaker_tag = turns
                .iter()
                .find(|t| t.index == clip.turn_index)
                .map(|t| t.speaker_tag.clone())
                .ok_or(TimelineError::UnknownTurn {
                    turn_index: clip.turn_index,
                })?;
            entries.push(TimelineEntry {
                turn_index: clip.turn_index,
                speaker_tag,
                start_ms: cursor,
                end_ms: cursor + clip.duration_ms,
            });
            cursor += clip.duration_ms;
        }

        Ok(Self {
            entries,
            gap_ms,
            total_ms: cursor,
        })
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn gap_ms(&self) -> u64 {
        self.gap_ms
    }

    /// Track length: last entry's end
    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    /// Decode, normalize and splice `clips` into one 16-bit mono WAV.
    ///
    /// `clips` must be the ones this timeline was built from.
    pub fn write_track(
        &self,
        clips: &[SynthesizedClip],
        sample_rate: u32,
        path: &Path,
    ) -> Result<(), TimelineError> {
        if clips.len() != self.entries.len() {
            return Err(TimelineError::Write(format!(
                "{} clips for {} timeline entries",
                clips.len(),
                self.entries.len()
            )));
        }

        let to_sample = |ms: u64| (ms * u64::from(sample_rate) / 1000) as usize;
        let mut track = vec![0i16; to_sample(self.total_ms)];

        for (entry, clip) in self.entries.iter().zip(clips) {
            let pcm = decode(&clip.audio_bytes, clip.format)
                .and_then(|pcm| pcm.normalized(sample_rate))
                .map_err(|DecodeError(message)| TimelineError::Decode {
                    turn_index: entry.turn_index,
                    message,
                })?;

            // Pad or trim to the slot so rounding never shifts later turns
            let slot = &mut track[to_sample(entry.start_ms)..to_sample(entry.end_ms)];
            let n = slot.len().min(pcm.samples.len());
            slot[..n].copy_from_slice(&pcm.samples[..n]);
            debug!(
                turn = entry.turn_index,
                start_ms = entry.start_ms,
                samples = n,
                "clip placed"
            );
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let write_err = |e: hound::Error| TimelineError::Write(format!("{}: {e}", path.display()));
        let mut writer = hound::WavWriter::create(path, spec).map_err(write_err)?;
        for &sample in &track {
            writer.write_sample(sample).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)?;

        info!(
            path = %path.display(),
            duration_ms = self.total_ms,
            turns = self.entries.len(),
            "audio track written"
        );
        Ok(())
    }
}
