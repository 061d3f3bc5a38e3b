//! Error taxonomy for episode assembly
//!
//! Every stage has its own error type. [`EpisodeError`] unifies them and
//! [`PipelineError`] tags the failure with the [`Stage`] it happened in.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid or missing settings, detected before any stage runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: set the {var} environment variable")]
    MissingCredential { var: String },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Malformed or empty script text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptParseError {
    #[error("script contains no speaker turns")]
    NoTurns,

    #[error("line {line}: empty speaker tag")]
    EmptyTag { line: usize },

    #[error("line {line}: unterminated speaker tag")]
    UnterminatedTag { line: usize },

    #[error("line {line}: text without a speaker tag")]
    UntaggedLine { line: usize },

    #[error("line {line}: turn for [{tag}] has no spoken text")]
    EmptyTurn { line: usize, tag: String },
}

/// Speakers that could not be mapped to a voice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceAssignmentError {
    #[error("voice pool is empty and no override covers speaker [{tag}]")]
    NoVoiceForTag { tag: String },

    #[error("override for [{tag}] names an empty voice")]
    EmptyOverride { tag: String },
}

/// Whether a synthesis failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsErrorKind {
    /// Timeout, rate limit, connection reset, 5xx.
    Retryable,
    /// Authentication, validation, exhausted retries.
    Fatal,
}

/// Voice synthesis failure.
#[derive(Debug, Clone)]
pub struct TtsError {
    pub kind: TtsErrorKind,
    /// HTTP status returned by the service, if any
    pub status: Option<u16>,
    /// Turn that was being synthesized, if known
    pub turn_index: Option<usize>,
    pub message: String,
}

impl TtsError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            kind: TtsErrorKind::Retryable,
            status: None,
            turn_index: None,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: TtsErrorKind::Fatal,
            status: None,
            turn_index: None,
            message: message.into(),
        }
    }

    /// Classify an HTTP status from the synthesis service.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = if status == 408 || status == 429 || status >= 500 {
            TtsErrorKind::Retryable
        } else {
            TtsErrorKind::Fatal
        };
        Self {
            kind,
            status: Some(status),
            turn_index: None,
            message: format!("HTTP {status}: {}", body.trim()),
        }
    }

    #[must_use]
    pub fn with_turn(mut self, turn_index: usize) -> Self {
        self.turn_index = Some(turn_index);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == TtsErrorKind::Retryable
    }
}

impl fmt::Display for TtsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TtsErrorKind::Retryable => "retryable",
            TtsErrorKind::Fatal => "fatal",
        };
        write!(f, "{kind} synthesis error")?;
        if let Some(turn) = self.turn_index {
            write!(f, " (turn {turn})")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for TtsError {}

/// Clip sequence that cannot form a valid track.
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("no clips to assemble")]
    Empty,

    #[error("turn {turn_index}: clip has non-positive duration")]
    NonPositiveDuration { turn_index: usize },

    #[error("turn {turn_index}: failed to decode audio: {message}")]
    Decode { turn_index: usize, message: String },

    #[error("clips out of order: turn {found} follows turn {previous}")]
    OutOfOrder { previous: usize, found: usize },

    #[error("clip for turn {turn_index} has no matching script turn")]
    UnknownTurn { turn_index: usize },

    #[error("failed to write track: {0}")]
    Write(String),
}

/// Timeline offsets that cannot produce a valid cue set.
#[derive(Error, Debug)]
pub enum SubtitleError {
    #[error("entry for turn {turn_index} ends before it starts ({start_ms} > {end_ms})")]
    InvertedEntry {
        turn_index: usize,
        start_ms: u64,
        end_ms: u64,
    },

    #[error("entry for turn {turn_index} overlaps the previous one")]
    Overlap { turn_index: usize },

    #[error("no text for turn {turn_index}")]
    MissingText { turn_index: usize },

    #[error("invalid subtitle timestamp: {0}")]
    Timestamp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External media tool failure.
#[derive(Error, Debug)]
pub enum VideoCompositionError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("composition exited with {status}: {diagnostics}")]
    Failed { status: String, diagnostics: String },

    #[error("composition exceeded {secs}s and was terminated")]
    TimedOut { secs: u64 },

    #[error("missing input file {}", .0.display())]
    MissingInput(PathBuf),

    #[error("background rendering failed: {0}")]
    Background(String),
}

/// Any failure inside one run.
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ScriptParse(#[from] ScriptParseError),

    #[error(transparent)]
    VoiceAssignment(#[from] VoiceAssignmentError),

    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Subtitle(#[from] SubtitleError),

    #[error(transparent)]
    VideoComposition(#[from] VideoCompositionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("run cancelled")]
    Cancelled,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Script,
    Voices,
    Synthesis,
    Timeline,
    Subtitles,
    Video,
    Artifacts,
}

impl Stage {
    /// All stages, in execution order
    pub const ALL: [Stage; 7] = [
        Self::Script,
        Self::Voices,
        Self::Synthesis,
        Self::Timeline,
        Self::Subtitles,
        Self::Video,
        Self::Artifacts,
    ];

    /// Stable lowercase name used in progress events and messages
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Voices => "voices",
            Self::Synthesis => "tts",
            Self::Timeline => "audio",
            Self::Subtitles => "subtitles",
            Self::Video => "video",
            Self::Artifacts => "artifacts",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage-qualified failure surfaced to the caller.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {cause}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub cause: EpisodeError,
}

impl PipelineError {
    pub fn new(stage: Stage, cause: impl Into<EpisodeError>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, EpisodeError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, EpisodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(TtsError::from_status(429, "slow down").is_retryable());
        assert!(TtsError::from_status(503, "").is_retryable());
        assert!(TtsError::from_status(408, "").is_retryable());
        assert!(!TtsError::from_status(401, "bad key").is_retryable());
        assert!(!TtsError::from_status(422, "bad voice").is_retryable());
    }

    #[test]
    fn tts_error_display_names_turn() {
        let err = TtsError::fatal("gave up").with_turn(3);
        assert_eq!(err.to_string(), "fatal synthesis error (turn 3): gave up");
    }

    #[test]
    fn pipeline_error_names_stage() {
        let err = PipelineError::new(Stage::Script, ScriptParseError::NoTurns);
        assert_eq!(
            err.to_string(),
            "script stage failed: script contains no speaker turns"
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("script contains no speaker turns"));
    }

    #[test]
    fn cancelled_is_detected() {
        let err = PipelineError::new(Stage::Video, EpisodeError::Cancelled);
        assert!(err.is_cancelled());
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineError>();
    }
}
