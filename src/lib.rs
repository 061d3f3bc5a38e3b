//! `podclaw` - one-prompt podcast production
//!
//! Turns a speaker-tagged script into a finished episode: multi-voice audio,
//! synced subtitles and a composed video.
//!
//! # Features
//!
//! - **Script parsing**: `[TAG] text` lines, lenient or strict
//! - **Voice assignment**: round-robin over a voice pool with per-tag overrides
//! - **Synthesis**: concurrent requests with bounded retry and backoff
//! - **Timeline**: gap-separated layout measured from the decoded audio
//! - **Subtitles**: cues split at word boundaries, SRT output
//! - **Video**: generated background, waveform and burnt-in subtitles via ffmpeg
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use podclaw::{
//!     ElevenLabsBackend, EpisodePipeline, FfmpegComposer, Settings, TracingObserver,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let backend = ElevenLabsBackend::new(settings.elevenlabs()?)?;
//!     let config = settings.builder("Rust in production").build()?;
//!
//!     let pipeline = EpisodePipeline::new(Arc::new(backend), Arc::new(FfmpegComposer::new()));
//!     let script = "[HOST_A] Welcome!\n[HOST_B] Glad to be here.";
//!     let artifacts = pipeline.run(config, script, &TracingObserver).await?;
//!     println!("Saved {}", artifacts.video.display());
//!     Ok(())
//! }
//! ```

pub mod assign;
pub mod audio;
pub mod config;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod plan;
pub mod retry;
pub mod script;
pub mod subtitle;
pub mod tts;
pub mod video;
pub mod voice;

pub use assign::{assign_voices, SpeakerAssignment};
pub use audio::{AudioFormat, AudioTimeline, TimelineEntry};
pub use config::Settings;
pub use error::{
    ConfigError, EpisodeError, PipelineError, ScriptParseError, Stage, SubtitleError,
    TimelineError, TtsError, TtsErrorKind, VideoCompositionError, VoiceAssignmentError,
};
pub use format::EpisodeFormat;
pub use pipeline::{
    EpisodeArtifacts, EpisodePipeline, NoopObserver, ProgressObserver, TracingObserver,
};
pub use plan::{EpisodeConfig, EpisodeConfigBuilder, EpisodePlan, OutputNaming, Rgb, VideoStyle};
pub use retry::RetryPolicy;
pub use script::{parse_script, render_transcript, ParseMode, ScriptTurn};
pub use subtitle::{SrtDocument, SubtitleBuilder, SubtitleCue};
pub use tts::{ElevenLabsBackend, SpeechBackend, SynthesizedClip, Synthesizer};
pub use video::{CompositionRequest, FfmpegComposer, MediaComposer};
pub use voice::{VoiceCatalog, VoiceProfile};

/// Version of podclaw
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
