//! Settings loaded from `~/.config/podclaw/config.toml`.
//!
//! Every section is optional. Command-line flags are applied on top by the
//! caller, and the merged values are frozen with
//! [`EpisodeConfigBuilder::build`](crate::plan::EpisodeConfigBuilder::build).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::audio::timeline::DEFAULT_GAP_MS;
use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::ConfigError;
use crate::plan::{EpisodeConfigBuilder, Resolution, Rgb, SynthesisOptions, VideoStyle};
use crate::retry::RetryPolicy;
use crate::subtitle::DEFAULT_MAX_CUE_CHARS;
use crate::tts::elevenlabs::{ElevenLabsConfig, DEFAULT_BASE_URL, DEFAULT_OUTPUT_FORMAT};
use crate::tts::DEFAULT_CONCURRENCY;
use crate::video::composer::FFMPEG_ENV;
use crate::voice::{VoiceCatalog, VoiceProfile};

/// `[voices]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Default voice pool
    pub pool: Vec<String>,
    /// User-defined voices by lookup name
    pub custom: BTreeMap<String, VoiceProfile>,
    /// Speaker tag to voice name or id
    pub overrides: BTreeMap<String, String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            pool: vec!["roger".to_string(), "george".to_string()],
            custom: BTreeMap::new(),
            overrides: BTreeMap::new(),
        }
    }
}

/// `[tts]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    pub base_url: String,
    /// Overrides the model of every resolved voice
    pub model_id: Option<String>,
    pub output_format: String,
    pub request_timeout_secs: u64,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for TtsSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: None,
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            request_timeout_secs: 120,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: retry.max_attempts,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
        }
    }
}

impl TtsSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// `[video]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub background: Rgb,
    pub accent: Rgb,
    pub text: Rgb,
    pub font_size: u32,
    pub subtitle_margin_v: u32,
    pub subtitle_outline: u32,
    pub waveform: bool,
    pub subtitles: bool,
    pub audio_bitrate: String,
    pub timeout_secs: u64,
    /// Path to the ffmpeg binary
    pub ffmpeg: Option<String>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        let style = VideoStyle::default();
        Self {
            width: style.resolution.width,
            height: style.resolution.height,
            background: style.background,
            accent: style.accent,
            text: style.text,
            font_size: style.font_size,
            subtitle_margin_v: style.subtitle_margin_v,
            subtitle_outline: style.subtitle_outline,
            waveform: style.waveform,
            subtitles: style.subtitles,
            audio_bitrate: style.audio_bitrate,
            timeout_secs: 30 * 60,
            ffmpeg: None,
        }
    }
}

impl VideoSettings {
    pub fn style(&self) -> VideoStyle {
        VideoStyle {
            resolution: Resolution {
                width: self.width,
                height: self.height,
            },
            background: self.background,
            accent: self.accent,
            text: self.text,
            waveform: self.waveform,
            subtitles: self.subtitles,
            font_size: self.font_size,
            subtitle_margin_v: self.subtitle_margin_v,
            subtitle_outline: self.subtitle_outline,
            audio_bitrate: self.audio_bitrate.clone(),
        }
    }
}

/// `[audio]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub gap_ms: u64,
    pub sample_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            gap_ms: DEFAULT_GAP_MS,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// `[subtitles]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    pub max_cue_chars: usize,
    pub speaker_prefix: bool,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            max_cue_chars: DEFAULT_MAX_CUE_CHARS,
            speaker_prefix: false,
        }
    }
}

/// Contents of the settings file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub voices: VoiceSettings,
    pub tts: TtsSettings,
    pub video: VideoSettings,
    pub audio: AudioSettings,
    pub subtitles: SubtitleSettings,
}

impl Settings {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Catalog with the custom voices registered
    pub fn catalog(&self) -> VoiceCatalog {
        self.voices
            .custom
            .iter()
            .fold(VoiceCatalog::new(), |catalog, (key, profile)| {
                catalog.with_custom(key, profile.clone())
            })
    }

    /// Seed a config builder for `topic` with these settings.
    pub fn builder(&self, topic: impl Into<String>) -> EpisodeConfigBuilder {
        let mut builder = EpisodeConfigBuilder::new(topic)
            .catalog(self.catalog())
            .voices(self.voices.pool.iter().cloned())
            .synthesis(SynthesisOptions {
                concurrency: self.tts.concurrency,
                retry: self.tts.retry_policy(),
            })
            .sample_rate(self.audio.sample_rate)
            .gap_ms(self.audio.gap_ms)
            .max_cue_chars(self.subtitles.max_cue_chars)
            .speaker_prefix(self.subtitles.speaker_prefix)
            .video(self.video.style())
            .composition_timeout(Duration::from_secs(self.video.timeout_secs));
        if let Some(model) = &self.tts.model_id {
            builder = builder.model_id(model);
        }
        for (tag, voice) in &self.voices.overrides {
            builder = builder.override_voice(tag, voice);
        }
        builder
    }

    /// Synthesis service connection; needs the API key in the environment.
    pub fn elevenlabs(&self) -> Result<ElevenLabsConfig, ConfigError> {
        let mut config = ElevenLabsConfig::from_env()?;
        config.base_url.clone_from(&self.tts.base_url);
        config.output_format.clone_from(&self.tts.output_format);
        config.request_timeout = Duration::from_secs(self.tts.request_timeout_secs);
        Ok(config)
    }

    /// ffmpeg binary: environment first, then the settings file.
    pub fn ffmpeg_path(&self) -> Option<String> {
        std::env::var(FFMPEG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.video.ffmpeg.clone())
    }
}

/// Return the path to the settings file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("podclaw")
        .join("config.toml")
}
