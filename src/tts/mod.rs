//! Voice synthesis
//!
//! [`Synthesizer`] drives a [`SpeechBackend`] over every turn of a script
//! with bounded concurrency. Each result lands in the slot of its turn, so
//! completion order never affects clip order. The first failure aborts the
//! whole batch and drops the requests still in flight.

pub mod elevenlabs;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::assign::SpeakerAssignment;
use crate::audio::{self, AudioFormat};
use crate::error::{TtsError, TtsErrorKind};
use crate::retry::RetryPolicy;
use crate::script::ScriptTurn;
use crate::voice::VoiceProfile;

pub use elevenlabs::ElevenLabsBackend;

/// Default number of synthesis requests in flight
pub const DEFAULT_CONCURRENCY: usize = 4;

/// External text-to-speech service
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Encoding of returned audio when it carries no header
    fn output_format(&self) -> AudioFormat;

    /// Synthesize `text` with `voice`, returning encoded audio.
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Bytes, TtsError>;
}

/// Audio for one turn with its measured duration
#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    pub turn_index: usize,
    pub audio_bytes: Bytes,
    pub format: AudioFormat,
    /// Measured from the decoded samples
    pub duration_ms: u64,
}

impl SynthesizedClip {
    /// Build a clip, measuring its duration by decoding `audio_bytes`.
    pub fn measure(
        turn_index: usize,
        audio_bytes: Bytes,
        declared: AudioFormat,
    ) -> Result<Self, audio::DecodeError> {
        let format = AudioFormat::detect(&audio_bytes, declared);
        let duration_ms = audio::decode(&audio_bytes, format)?.duration_ms();
        Ok(Self {
            turn_index,
            audio_bytes,
            format,
            duration_ms,
        })
    }
}

/// Synthesizes all turns of a script
pub struct Synthesizer {
    backend: Arc<dyn SpeechBackend>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl Synthesizer {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cap on concurrent requests (at least 1)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Synthesize every turn, returning clips in turn order.
    pub async fn synthesize_all(
        &self,
        turns: &[ScriptTurn],
        assignment: &SpeakerAssignment,
    ) -> Result<Vec<SynthesizedClip>, TtsError> {
        info!(
            backend = self.backend.name(),
            turns = turns.len(),
            concurrency = self.concurrency,
            "synthesizing turns"
        );

        let mut slots: Vec<Option<SynthesizedClip>> = (0..turns.len()).map(|_| None).collect();
        let mut pending = stream::iter(turns.iter().enumerate().map(|(slot, turn)| async move {
            (slot, self.synthesize_turn(turn, assignment).await)
        }))
        .buffer_unordered(self.concurrency);

        while let Some((slot, result)) = pending.next().await {
            slots[slot] = Some(result?);
        }

        slots
            .into_iter()
            .zip(turns)
            .map(|(clip, turn)| {
                clip.ok_or_else(|| TtsError::fatal("missing synthesis result").with_turn(turn.index))
            })
            .collect()
    }

    async fn synthesize_turn(
        &self,
        turn: &ScriptTurn,
        assignment: &SpeakerAssignment,
    ) -> Result<SynthesizedClip, TtsError> {
        let voice = assignment.voice_for(&turn.speaker_tag).ok_or_else(|| {
            TtsError::fatal(format!("no voice assigned to [{}]", turn.speaker_tag))
                .with_turn(turn.index)
        })?;

        let audio_bytes = self
            .retry
            .run(
                |attempt| {
                    debug!(turn = turn.index, attempt, voice = %voice.name, "synthesis request");
                    self.backend.synthesize(&turn.text, voice)
                },
                |e: &TtsError| e.is_retryable(),
            )
            .await
            .map_err(|failure| {
                let mut error = failure.error;
                if failure.exhausted {
                    error.kind = TtsErrorKind::Fatal;
                    error.message = format!(
                        "gave up after {} attempts: {}",
                        failure.attempts, error.message
                    );
                }
                error.with_turn(turn.index)
            })?;

        let clip = SynthesizedClip::measure(turn.index, audio_bytes, self.backend.output_format())
            .map_err(|e| {
                TtsError::fatal(format!("service returned undecodable audio: {e}"))
                    .with_turn(turn.index)
            })?;
        debug!(turn = turn.index, duration_ms = clip.duration_ms, "clip ready");
        Ok(clip)
    }
}
