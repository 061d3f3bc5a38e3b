//! Speaker to voice assignment
//!
//! Distinct tags are collected in first-appearance order. Tags without an
//! override take the next pool voice round-robin, so the mapping depends
//! only on the turn sequence, the pool order and the overrides.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::VoiceAssignmentError;
use crate::script::ScriptTurn;
use crate::voice::VoiceProfile;

/// Tag to voice mapping for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerAssignment {
    /// `(tag, voice)` pairs in first-appearance order
    entries: Vec<(String, VoiceProfile)>,
}

impl SpeakerAssignment {
    pub fn voice_for(&self, tag: &str) -> Option<&VoiceProfile> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, voice)| voice)
    }

    /// Tags in first-appearance order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(tag, _)| tag.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VoiceProfile)> {
        self.entries.iter().map(|(tag, voice)| (tag.as_str(), voice))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Distinct speaker tags in order of first appearance
pub fn distinct_tags(turns: &[ScriptTurn]) -> Vec<&str> {
    let mut tags: Vec<&str> = Vec::new();
    for turn in turns {
        if !tags.contains(&turn.speaker_tag.as_str()) {
            tags.push(&turn.speaker_tag);
        }
    }
    tags
}

/// Map every speaker tag in `turns` to a voice.
///
/// Overrides win; remaining tags cycle through `pool`, wrapping when tags
/// outnumber voices. Only override-free tags advance the pool cursor.
pub fn assign_voices(
    turns: &[ScriptTurn],
    pool: &[VoiceProfile],
    overrides: &BTreeMap<String, VoiceProfile>,
) -> Result<SpeakerAssignment, VoiceAssignmentError> {
    let mut entries = Vec::new();
    let mut cursor = 0usize;

    for tag in distinct_tags(turns) {
        let voice = if let Some(voice) = overrides.get(tag) {
            if voice.external_voice_id.trim().is_empty() {
                return Err(VoiceAssignmentError::EmptyOverride {
                    tag: tag.to_string(),
                });
            }
            voice.clone()
        } else {
            if pool.is_empty() {
                return Err(VoiceAssignmentError::NoVoiceForTag {
                    tag: tag.to_string(),
                });
            }
            let voice = pool[cursor % pool.len()].clone();
            cursor += 1;
            voice
        };
        debug!(tag, voice = %voice.name, "assigned voice");
        entries.push((tag.to_string(), voice));
    }

    Ok(SpeakerAssignment { entries })
}
