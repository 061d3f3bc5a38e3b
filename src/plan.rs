//! Episode configuration snapshot
//!
//! [`EpisodeConfig`] is the fully resolved, validated configuration of one
//! run. Once the script is parsed and voices are assigned, the pipeline
//! freezes it together with the turns into an [`EpisodePlan`]. Neither is
//! mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::assign::SpeakerAssignment;
use crate::audio::timeline::DEFAULT_GAP_MS;
use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::ConfigError;
use crate::format::EpisodeFormat;
use crate::retry::RetryPolicy;
use crate::script::{ParseMode, ScriptTurn};
use crate::subtitle::DEFAULT_MAX_CUE_CHARS;
use crate::tts::DEFAULT_CONCURRENCY;
use crate::voice::{VoiceCatalog, VoiceProfile};

/// Fixed prefix of every output file name
pub const OUTPUT_PREFIX: &str = "podclaw_";
const MAX_SLUG_CHARS: usize = 50;
const MAX_GAP_MS: u64 = 10_000;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Hex without prefix, as used by ffmpeg color options (`DAA520`)
    #[must_use]
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// ASS color literal (`&H00BBGGRR`)
    #[must_use]
    pub fn ass(&self) -> String {
        format!("&H00{:02X}{:02X}{:02X}", self.2, self.1, self.0)
    }

    /// Scale every channel by `factor`
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Rgb {
        let f = |c: u8| (f32::from(c) * factor).clamp(0.0, 255.0) as u8;
        Rgb(f(self.0), f(self.1), f(self.2))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

impl FromStr for Rgb {
    type Err = ConfigError;

    /// Accepts `#RRGGBB`, `RRGGBB` or `r,g,b`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ConfigError::invalid("color", format!("'{s}' is not #RRGGBB or r,g,b"));

        if s.contains(',') {
            let parts: Vec<u8> = s
                .split(',')
                .map(|p| p.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .map_err(|_| invalid())?;
            return match parts[..] {
                [r, g, b] => Ok(Rgb(r, g, b)),
                _ => Err(invalid()),
            };
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Output frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Visual parameters of the composed video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStyle {
    pub resolution: Resolution,
    pub background: Rgb,
    pub accent: Rgb,
    pub text: Rgb,
    pub waveform: bool,
    pub subtitles: bool,
    pub font_size: u32,
    pub subtitle_margin_v: u32,
    pub subtitle_outline: u32,
    /// e.g. `192k`
    pub audio_bitrate: String,
}

impl Default for VideoStyle {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            background: Rgb(10, 22, 40),
            accent: Rgb(218, 165, 32),
            text: Rgb(255, 253, 240),
            waveform: true,
            subtitles: true,
            font_size: 28,
            subtitle_margin_v: 60,
            subtitle_outline: 3,
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// Where artifacts land and what they are called
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputNaming {
    pub dir: PathBuf,
    /// File stem shared by all artifacts, e.g. `podclaw_ai_safety`
    pub stem: String,
}

impl OutputNaming {
    /// Stem derived from the topic
    pub fn for_topic(dir: impl Into<PathBuf>, topic: &str) -> Self {
        Self {
            dir: dir.into(),
            stem: format!("{OUTPUT_PREFIX}{}", slugify(topic)),
        }
    }

    /// Explicit file name; a trailing `.mp4` is dropped. `None` when no
    /// stem is left.
    pub fn explicit(dir: impl Into<PathBuf>, file_name: &str) -> Option<Self> {
        let name = file_name.trim();
        let stem = name.strip_suffix(".mp4").unwrap_or(name).trim();
        if stem.is_empty() {
            return None;
        }
        Some(Self {
            dir: dir.into(),
            stem: stem.to_string(),
        })
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{suffix}", self.stem))
    }

    pub fn video(&self) -> PathBuf {
        self.with_suffix(".mp4")
    }

    pub fn audio(&self) -> PathBuf {
        self.with_suffix(".wav")
    }

    pub fn subtitles(&self) -> PathBuf {
        self.with_suffix(".srt")
    }

    pub fn script(&self) -> PathBuf {
        self.with_suffix("_script.txt")
    }

    pub fn background(&self) -> PathBuf {
        self.with_suffix("_bg.png")
    }
}

/// File-name-safe form of a topic: alphanumerics, `-` and `_` kept, spaces
/// become `_`, at most 50 characters, `episode` when nothing survives.
pub fn slugify(topic: &str) -> String {
    let kept: String = topic
        .chars()
        .filter(|&c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let slug: String = kept
        .trim()
        .replace(' ', "_")
        .chars()
        .take(MAX_SLUG_CHARS)
        .collect();
    if slug.is_empty() {
        "episode".to_string()
    } else {
        slug
    }
}

/// Synthesis service tuning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisOptions {
    pub concurrency: usize,
    #[serde(skip)]
    pub retry: RetryPolicy,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Resolved configuration of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeConfig {
    pub topic: String,
    pub format: EpisodeFormat,
    pub parse_mode: ParseMode,
    /// Ordered voice pool for round-robin assignment
    pub voices: Vec<VoiceProfile>,
    /// Tag to voice, applied before the pool
    pub overrides: BTreeMap<String, VoiceProfile>,
    pub synthesis: SynthesisOptions,
    pub sample_rate: u32,
    pub gap_ms: u64,
    pub max_cue_chars: usize,
    pub speaker_prefix: bool,
    pub video: VideoStyle,
    #[serde(skip)]
    pub composition_timeout: Duration,
    pub output: OutputNaming,
}

impl EpisodeConfig {
    pub fn builder(topic: impl Into<String>) -> EpisodeConfigBuilder {
        EpisodeConfigBuilder::new(topic)
    }
}

/// Collects settings and CLI overrides, then validates them once
#[derive(Debug, Clone)]
pub struct EpisodeConfigBuilder {
    topic: String,
    format: EpisodeFormat,
    parse_mode: ParseMode,
    catalog: VoiceCatalog,
    voice_names: Vec<String>,
    override_names: BTreeMap<String, String>,
    model_id: Option<String>,
    synthesis: SynthesisOptions,
    sample_rate: u32,
    gap_ms: u64,
    max_cue_chars: usize,
    speaker_prefix: bool,
    video: VideoStyle,
    composition_timeout: Duration,
    output_dir: PathBuf,
    file_name: Option<String>,
}

impl EpisodeConfigBuilder {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            format: EpisodeFormat::default(),
            parse_mode: ParseMode::default(),
            catalog: VoiceCatalog::new(),
            voice_names: vec!["roger".to_string(), "george".to_string()],
            override_names: BTreeMap::new(),
            model_id: None,
            synthesis: SynthesisOptions::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            gap_ms: DEFAULT_GAP_MS,
            max_cue_chars: DEFAULT_MAX_CUE_CHARS,
            speaker_prefix: false,
            video: VideoStyle::default(),
            composition_timeout: Duration::from_secs(30 * 60),
            output_dir: PathBuf::from("."),
            file_name: None,
        }
    }

    #[must_use]
    pub fn format(mut self, format: EpisodeFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Catalog used to resolve voice names
    #[must_use]
    pub fn catalog(mut self, catalog: VoiceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Voice pool by preset name, custom name or raw id
    #[must_use]
    pub fn voices<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.voice_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Pin a speaker tag to a voice name or id
    #[must_use]
    pub fn override_voice(mut self, tag: impl Into<String>, voice: impl Into<String>) -> Self {
        self.override_names.insert(tag.into(), voice.into());
        self
    }

    /// Synthesis model for every resolved voice
    #[must_use]
    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    #[must_use]
    pub fn synthesis(mut self, synthesis: SynthesisOptions) -> Self {
        self.synthesis = synthesis;
        self
    }

    #[must_use]
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    #[must_use]
    pub fn gap_ms(mut self, gap_ms: u64) -> Self {
        self.gap_ms = gap_ms;
        self
    }

    #[must_use]
    pub fn max_cue_chars(mut self, max_cue_chars: usize) -> Self {
        self.max_cue_chars = max_cue_chars;
        self
    }

    #[must_use]
    pub fn speaker_prefix(mut self, enabled: bool) -> Self {
        self.speaker_prefix = enabled;
        self
    }

    #[must_use]
    pub fn video(mut self, video: VideoStyle) -> Self {
        self.video = video;
        self
    }

    #[must_use]
    pub fn waveform(mut self, enabled: bool) -> Self {
        self.video.waveform = enabled;
        self
    }

    #[must_use]
    pub fn subtitles(mut self, enabled: bool) -> Self {
        self.video.subtitles = enabled;
        self
    }

    #[must_use]
    pub fn composition_timeout(mut self, timeout: Duration) -> Self {
        self.composition_timeout = timeout;
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<EpisodeConfig, ConfigError> {
        let res = self.video.resolution;
        if res.width == 0 || res.height == 0 || res.width % 2 != 0 || res.height % 2 != 0 {
            return Err(ConfigError::invalid(
                "video.resolution",
                format!("{res} must be non-zero and even"),
            ));
        }
        if res.height <= 180 {
            return Err(ConfigError::invalid(
                "video.height",
                "must leave room for the waveform band (> 180)",
            ));
        }
        if self.video.font_size == 0 {
            return Err(ConfigError::invalid("video.font_size", "must be positive"));
        }
        let bitrate = self.video.audio_bitrate.trim();
        let digits = bitrate.strip_suffix('k').unwrap_or(bitrate);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::invalid(
                "video.audio_bitrate",
                format!("'{bitrate}' is not like 192k"),
            ));
        }
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "audio.sample_rate",
                format!("{} Hz is out of range", self.sample_rate),
            ));
        }
        if self.gap_ms > MAX_GAP_MS {
            return Err(ConfigError::invalid(
                "audio.gap_ms",
                format!("{} exceeds {MAX_GAP_MS}", self.gap_ms),
            ));
        }
        if self.max_cue_chars < 10 {
            return Err(ConfigError::invalid(
                "subtitles.max_cue_chars",
                "must be at least 10",
            ));
        }
        if self.synthesis.concurrency == 0 || self.synthesis.retry.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "tts",
                "concurrency and max_attempts must be positive",
            ));
        }
        if self.composition_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "video.timeout_secs",
                "must be positive",
            ));
        }

        let mut voices = self.catalog.resolve_all(
            &self
                .voice_names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>(),
        );
        let mut overrides: BTreeMap<String, VoiceProfile> = self
            .override_names
            .iter()
            .map(|(tag, name)| (tag.clone(), self.catalog.resolve(name)))
            .collect();
        if let Some(model) = &self.model_id {
            for voice in voices.iter_mut().chain(overrides.values_mut()) {
                voice.model_id.clone_from(model);
            }
        }

        let output = self
            .file_name
            .as_deref()
            .and_then(|name| OutputNaming::explicit(&self.output_dir, name))
            .unwrap_or_else(|| OutputNaming::for_topic(&self.output_dir, &self.topic));

        Ok(EpisodeConfig {
            topic: self.topic.trim().to_string(),
            format: self.format,
            parse_mode: self.parse_mode,
            voices,
            overrides,
            synthesis: self.synthesis,
            sample_rate: self.sample_rate,
            gap_ms: self.gap_ms,
            max_cue_chars: self.max_cue_chars,
            speaker_prefix: self.speaker_prefix,
            video: self.video,
            composition_timeout: self.composition_timeout,
            output,
        })
    }
}

/// Configuration plus the parsed turns and their voices
#[derive(Debug, Clone, Serialize)]
pub struct EpisodePlan {
    pub config: EpisodeConfig,
    pub turns: Vec<ScriptTurn>,
    pub assignment: SpeakerAssignment,
}

impl EpisodePlan {
    pub fn new(config: EpisodeConfig, turns: Vec<ScriptTurn>, assignment: SpeakerAssignment) -> Self {
        Self {
            config,
            turns,
            assignment,
        }
    }

    pub fn video(&self) -> &VideoStyle {
        &self.config.video
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colors() {
        assert_eq!("#DAA520".parse::<Rgb>().unwrap(), Rgb(218, 165, 32));
        assert_eq!("0a1628".parse::<Rgb>().unwrap(), Rgb(10, 22, 40));
        assert_eq!("10, 22, 40".parse::<Rgb>().unwrap(), Rgb(10, 22, 40));
        assert!("#GGGGGG".parse::<Rgb>().is_err());
        assert!("1,2".parse::<Rgb>().is_err());
        assert!("300,0,0".parse::<Rgb>().is_err());
    }

    #[test]
    fn color_notations() {
        let gold = Rgb(218, 165, 32);
        assert_eq!(gold.hex(), "DAA520");
        assert_eq!(gold.ass(), "&H0020A5DA");
        assert_eq!(gold.to_string(), "#DAA520");
        assert_eq!(Rgb(100, 50, 0).scaled(0.8), Rgb(80, 40, 0));
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("AI safety: what now?"), "AI_safety_what_now");
        assert_eq!(slugify("  ?!  "), "episode");
        assert_eq!(slugify(&"a".repeat(80)).len(), 50);
    }

    #[test]
    fn output_names_share_stem() {
        let naming = OutputNaming::for_topic("/tmp/out", "AI safety");
        assert_eq!(naming.video(), PathBuf::from("/tmp/out/podclaw_AI_safety.mp4"));
        assert_eq!(naming.audio(), PathBuf::from("/tmp/out/podclaw_AI_safety.wav"));
        assert_eq!(naming.subtitles(), PathBuf::from("/tmp/out/podclaw_AI_safety.srt"));
        assert_eq!(
            naming.script(),
            PathBuf::from("/tmp/out/podclaw_AI_safety_script.txt")
        );
        assert_eq!(
            naming.background(),
            PathBuf::from("/tmp/out/podclaw_AI_safety_bg.png")
        );
        assert_eq!(OutputNaming::explicit(".", "show.mp4").unwrap().stem, "show");
        assert_eq!(OutputNaming::explicit(".", " .mp4 "), None);
    }

    #[test]
    fn builder_defaults() {
        let config = EpisodeConfig::builder("Rust").build().unwrap();
        assert_eq!(config.voices.len(), 2);
        assert_eq!(config.voices[0].name, "Roger");
        assert_eq!(config.gap_ms, 400);
        assert_eq!(config.max_cue_chars, 80);
        assert_eq!(config.sample_rate, 44_100);
        assert!(config.video.waveform && config.video.subtitles);
        assert_eq!(config.output.stem, "podclaw_Rust");
    }

    #[test]
    fn builder_resolves_overrides_and_file_name() {
        let config = EpisodeConfig::builder("x")
            .voices(["callum"])
            .override_voice("GUEST", "george")
            .file_name("custom.mp4")
            .build()
            .unwrap();
        assert_eq!(config.overrides["GUEST"].name, "George");
        assert_eq!(config.output.stem, "custom");
    }

    #[test]
    fn bare_extension_file_name_falls_back_to_topic() {
        let config = EpisodeConfig::builder("AI safety")
            .file_name(".mp4")
            .build()
            .unwrap();
        assert_eq!(config.output.stem, "podclaw_AI_safety");
        assert_eq!(config.output.audio(), PathBuf::from("./podclaw_AI_safety.wav"));
    }

    #[test]
    fn builder_rejects_bad_values() {
        let odd = VideoStyle {
            resolution: Resolution {
                width: 1921,
                height: 1080,
            },
            ..VideoStyle::default()
        };
        assert!(EpisodeConfig::builder("x").video(odd).build().is_err());
        assert!(EpisodeConfig::builder("x").gap_ms(60_000).build().is_err());
        assert!(EpisodeConfig::builder("x").max_cue_chars(2).build().is_err());
        assert!(EpisodeConfig::builder("x").sample_rate(100).build().is_err());

        let bad_bitrate = VideoStyle {
            audio_bitrate: "loud".to_string(),
            ..VideoStyle::default()
        };
        assert!(EpisodeConfig::builder("x").video(bad_bitrate).build().is_err());
    }
}
