//! Voice profiles and preset lookup

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default synthesis model for presets and raw ids
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

/// Synthesis parameters identifying one voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Display name
    pub name: String,
    /// Identifier understood by the synthesis service
    pub external_voice_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// 0.0 ..= 1.0
    #[serde(default = "default_stability")]
    pub stability: f32,
    /// 0.0 ..= 1.0
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default)]
    pub style: f32,
    #[serde(default = "default_speaker_boost")]
    pub use_speaker_boost: bool,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_stability() -> f32 {
    0.5
}

fn default_similarity_boost() -> f32 {
    0.75
}

fn default_speaker_boost() -> bool {
    true
}

impl VoiceProfile {
    /// Profile with default tonal settings
    pub fn new(name: impl Into<String>, external_voice_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_voice_id: external_voice_id.into(),
            description: String::new(),
            model_id: default_model_id(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            style: 0.0,
            use_speaker_boost: default_speaker_boost(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Clamp tonal settings into the unit interval
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.stability = self.stability.clamp(0.0, 1.0);
        self.similarity_boost = self.similarity_boost.clamp(0.0, 1.0);
        self.style = self.style.clamp(0.0, 1.0);
        self
    }
}

/// Built-in presets as `(key, display name, voice id, description)`
const PRESETS: [(&str, &str, &str, &str); 3] = [
    (
        "roger",
        "Roger",
        "CwhRBWXzGAHq8TQ4Fs17",
        "Laid-back, casual, resonant male",
    ),
    (
        "george",
        "George",
        "JBFqnCBsd6RMkjVDRZzb",
        "Warm storyteller, British male",
    ),
    (
        "callum",
        "Callum",
        "N2lVS1w4EtoT3dr4eOWO",
        "Husky trickster male",
    ),
];

/// All built-in presets, keyed by lookup name
#[must_use]
pub fn presets() -> Vec<(&'static str, VoiceProfile)> {
    PRESETS
        .iter()
        .map(|(key, name, id, description)| {
            (*key, VoiceProfile::new(*name, *id).with_description(*description))
        })
        .collect()
}

/// Resolves voice names to profiles.
///
/// Lookup order is custom voices, then presets (both case-insensitive);
/// anything else is treated as a raw external voice id.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    custom: BTreeMap<String, VoiceProfile>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user-defined voice under `key`
    #[must_use]
    pub fn with_custom(mut self, key: &str, profile: VoiceProfile) -> Self {
        self.custom.insert(key.to_lowercase(), profile.clamped());
        self
    }

    pub fn resolve(&self, name: &str) -> VoiceProfile {
        let key = name.trim().to_lowercase();
        if let Some(profile) = self.custom.get(&key) {
            return profile.clone();
        }
        if let Some((_, profile)) = presets().into_iter().find(|(k, _)| *k == key) {
            return profile;
        }
        VoiceProfile::new(name.trim(), name.trim()).with_description("Custom voice ID")
    }

    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Vec<VoiceProfile> {
        names.iter().map(|n| self.resolve(n.as_ref())).collect()
    }
}
