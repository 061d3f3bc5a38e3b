//! ElevenLabs text-to-speech backend
//!
//! `POST {base}/text-to-speech/{voice_id}?output_format=pcm_44100` with the
//! `xi-api-key` header. The response body is raw s16le mono PCM.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use super::SpeechBackend;
use crate::audio::AudioFormat;
use crate::error::{ConfigError, TtsError};
use crate::voice::VoiceProfile;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_OUTPUT_FORMAT: &str = "pcm_44100";

const XI_API_KEY_HEADER: &str = "xi-api-key";
/// Longest error body kept in diagnostics
const MAX_ERROR_BODY: usize = 500;

/// Connection settings for [`ElevenLabsBackend`]
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    /// Must be a `pcm_<rate>` format
    pub output_format: String,
    pub request_timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Read the API key from [`API_KEY_ENV`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                var: API_KEY_ENV.to_string(),
            });
        }
        Ok(Self::new(key.trim()))
    }
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

#[derive(Serialize)]
struct TextToSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// HTTP client for the ElevenLabs API
pub struct ElevenLabsBackend {
    client: Client,
    config: ElevenLabsConfig,
    format: AudioFormat,
}

impl ElevenLabsBackend {
    pub fn new(config: ElevenLabsConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                var: API_KEY_ENV.to_string(),
            });
        }
        let format = AudioFormat::from_output_format(&config.output_format).ok_or_else(|| {
            ConfigError::invalid(
                "tts.output_format",
                format!("'{}' is not a pcm_<rate> format", config.output_format),
            )
        })?;

        let client = Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config,
            format,
        })
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!(
            "{}/text-to-speech/{voice_id}",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

fn request_error(e: &reqwest::Error) -> TtsError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        TtsError::retryable(format!("request failed: {e}"))
    } else {
        TtsError::fatal(format!("request failed: {e}"))
    }
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsBackend {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    fn output_format(&self) -> AudioFormat {
        self.format
    }

    #[instrument(skip(self, text, voice), fields(voice = %voice.name, chars = text.len()))]
    async fn synthesize(&self, text: &str, voice: &VoiceProfile) -> Result<Bytes, TtsError> {
        let body = TextToSpeechBody {
            text,
            model_id: &voice.model_id,
            voice_settings: VoiceSettings {
                stability: voice.stability,
                similarity_boost: voice.similarity_boost,
                style: voice.style,
                use_speaker_boost: voice.use_speaker_boost,
            },
        };

        let response = self
            .client
            .post(self.endpoint(&voice.external_voice_id))
            .query(&[("output_format", self.config.output_format.as_str())])
            .header(XI_API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::from_status(status.as_u16(), truncate_body(&body)));
        }

        let audio = response.bytes().await.map_err(|e| request_error(&e))?;
        debug!(bytes = audio.len(), "audio received");
        Ok(audio)
    }
}
