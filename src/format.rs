//! Episode formats
//!
//! A format suggests a speaker tag set to the script source. Parsing and
//! voice assignment never check tags against it, so custom formats with
//! arbitrary tags work unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Built-in episode format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeFormat {
    /// Two hosts argue opposite sides
    #[default]
    Debate,
    /// One host, solo deep-dive
    Monologue,
    /// Anchor and correspondent
    NewsRecap,
    /// Interviewer and guest
    Interview,
    /// Narrator with color commentary
    Storytelling,
}

impl EpisodeFormat {
    /// All formats, in listing order
    pub const ALL: [EpisodeFormat; 5] = [
        Self::Debate,
        Self::Monologue,
        Self::NewsRecap,
        Self::Interview,
        Self::Storytelling,
    ];

    /// Lowercase identifier accepted on the command line
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Debate => "debate",
            Self::Monologue => "monologue",
            Self::NewsRecap => "news_recap",
            Self::Interview => "interview",
            Self::Storytelling => "storytelling",
        }
    }

    /// Suggested speaker tags, in speaking order
    #[must_use]
    pub fn roles(&self) -> &'static [&'static str] {
        match self {
            Self::Debate => &["HOST_A", "HOST_B"],
            Self::Monologue => &["HOST"],
            Self::NewsRecap => &["ANCHOR", "CORRESPONDENT"],
            Self::Interview => &["INTERVIEWER", "GUEST"],
            Self::Storytelling => &["NARRATOR", "COLOR"],
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Debate => "Two hosts debate opposing sides of the topic",
            Self::Monologue => "Single host deep-dive on the topic",
            Self::NewsRecap => "Anchor + correspondent news-style coverage",
            Self::Interview => "Interviewer + guest conversation",
            Self::Storytelling => "Narrator + color commentary storytelling",
        }
    }
}

impl fmt::Display for EpisodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EpisodeFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownFormat(s.to_string()))
    }
}
