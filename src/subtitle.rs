//! Subtitle cues from the audio timeline
//!
//! Each timeline entry becomes one or more cues. Long turns are split at
//! the whitespace nearest to evenly spaced character positions, and every
//! piece gets a share of the turn's time window proportional to its
//! character count. Cues never span two turns.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::audio::TimelineEntry;
use crate::error::SubtitleError;
use crate::script::ScriptTurn;

/// Default maximum characters per cue
pub const DEFAULT_MAX_CUE_CHARS: usize = 80;

/// One subtitle display unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleCue {
    /// 1-based, contiguous
    pub sequence_number: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    /// Speaker tag of the source turn
    pub speaker: Option<String>,
}

/// Format milliseconds as `HH:MM:SS,mmm`.
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Parse `HH:MM:SS,mmm` into milliseconds.
pub fn parse_timestamp(ts: &str) -> Result<u64, SubtitleError> {
    let invalid = || SubtitleError::Timestamp(ts.to_string());
    let parts: Vec<&str> = ts.trim().split(&[',', ':'][..]).collect();
    if parts.len() != 4 {
        return Err(invalid());
    }

    let field = |s: &str, max: u64| -> Result<u64, SubtitleError> {
        let value: u64 = s.parse().map_err(|_| invalid())?;
        if value > max {
            return Err(invalid());
        }
        Ok(value)
    };
    let hours = field(parts[0], u64::MAX / 3_600_000)?;
    let minutes = field(parts[1], 59)?;
    let seconds = field(parts[2], 59)?;
    let millis = field(parts[3], 999)?;

    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis)
}

/// Derives cues from timeline entries
#[derive(Debug, Clone)]
pub struct SubtitleBuilder {
    max_chars: usize,
}

impl Default for SubtitleBuilder {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CUE_CHARS,
        }
    }
}

impl SubtitleBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum characters per cue (at least 1)
    #[must_use]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    /// Build numbered cues for `entries`, taking text from `turns`.
    pub fn build(
        &self,
        entries: &[TimelineEntry],
        turns: &[ScriptTurn],
    ) -> Result<Vec<SubtitleCue>, SubtitleError> {
        let mut cues = Vec::new();
        let mut previous_end: Option<u64> = None;

        for entry in entries {
            if entry.end_ms < entry.start_ms {
                return Err(SubtitleError::InvertedEntry {
                    turn_index: entry.turn_index,
                    start_ms: entry.start_ms,
                    end_ms: entry.end_ms,
                });
            }
            if previous_end.is_some_and(|end| entry.start_ms < end) {
                return Err(SubtitleError::Overlap {
                    turn_index: entry.turn_index,
                });
            }
            previous_end = Some(entry.end_ms);

            let turn = turns
                .iter()
                .find(|t| t.index == entry.turn_index)
                .ok_or(SubtitleError::MissingText {
                    turn_index: entry.turn_index,
                })?;

            let pieces = split_text(&turn.text, self.max_chars);
            let weights: Vec<u64> = pieces.iter().map(|p| p.chars().count() as u64).collect();
            let total_weight: u64 = weights.iter().sum::<u64>().max(1);
            let window = entry.end_ms - entry.start_ms;

            let mut consumed = 0u64;
            let mut start = entry.start_ms;
            for (piece, weight) in pieces.iter().zip(&weights) {
                consumed += weight;
                let end = entry.start_ms + window * consumed / total_weight;
                cues.push(SubtitleCue {
                    sequence_number: cues.len() + 1,
                    start_ms: start,
                    end_ms: end,
                    text: (*piece).to_string(),
                    speaker: Some(turn.speaker_tag.clone()),
                });
                start = end;
            }
            if pieces.len() > 1 {
                debug!(turn = entry.turn_index, cues = pieces.len(), "split long turn");
            }
        }

        Ok(cues)
    }
}

/// Split `text` into pieces of at most `max_chars` characters where the
/// whitespace allows it.
fn split_text(text: &str, max_chars: usize) -> Vec<&str> {
    let text = text.trim();
    let total = text.chars().count();
    if total <= max_chars {
        return vec![text];
    }

    // (char position, byte offset) of every whitespace character
    let breaks: Vec<(usize, usize)> = text
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| c.is_whitespace())
        .map(|(pos, (byte, _))| (pos, byte))
        .collect();
    if breaks.is_empty() {
        return vec![text];
    }

    let mut pieces = total.div_ceil(max_chars);
    loop {
        let chunks = split_into(text, total, &breaks, pieces);
        if pieces > breaks.len() || chunks.iter().all(|c| c.chars().count() <= max_chars) {
            return chunks;
        }
        pieces += 1;
    }
}

/// Cut `text` into `pieces` parts at the breaks nearest `k * total / pieces`.
fn split_into<'a>(
    text: &'a str,
    total: usize,
    breaks: &[(usize, usize)],
    pieces: usize,
) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(pieces);
    let mut start_byte = 0;
    let mut min_pos = 0;

    for k in 1..pieces {
        let ideal = total * k / pieces;
        let nearest = breaks
            .iter()
            .filter(|(pos, _)| *pos >= min_pos)
            .min_by_key(|(pos, _)| pos.abs_diff(ideal));
        let Some(&(pos, byte)) = nearest else {
            break;
        };
        out.push(text[start_byte..byte].trim());
        start_byte = byte;
        min_pos = pos + 1;
    }
    out.push(text[start_byte..].trim());
    out.retain(|s| !s.is_empty());
    out
}

/// SubRip rendering of a cue list
pub struct SrtDocument<'a> {
    cues: &'a [SubtitleCue],
    speaker_prefix: bool,
}

impl<'a> SrtDocument<'a> {
    pub fn new(cues: &'a [SubtitleCue]) -> Self {
        Self {
            cues,
            speaker_prefix: false,
        }
    }

    /// Prefix cue text with `[SPEAKER]`
    #[must_use]
    pub fn with_speaker_prefix(mut self, enabled: bool) -> Self {
        self.speaker_prefix = enabled;
        self
    }

    pub async fn write_to_file(&self, path: &Path) -> Result<(), SubtitleError> {
        fs::write(path, self.to_string()).await?;
        Ok(())
    }
}

impl fmt::Display for SrtDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cue in self.cues {
            writeln!(f, "{}", cue.sequence_number)?;
            writeln!(
                f,
                "{} --> {}",
                format_timestamp(cue.start_ms),
                format_timestamp(cue.end_ms)
            )?;
            match (&cue.speaker, self.speaker_prefix) {
                (Some(speaker), true) => writeln!(f, "[{speaker}] {}", cue.text)?,
                _ => writeln!(f, "{}", cue.text)?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Parse SubRip content back into cues.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleCue>, SubtitleError> {
    let mut cues = Vec::new();
    let mut lines = content.lines().peekable();

    while lines.peek().is_some() {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }

        let Some(seq_line) = lines.next() else {
            break;
        };
        let Ok(sequence_number) = seq_line.trim().parse::<usize>() else {
            continue;
        };

        let Some(time_line) = lines.next() else {
            break;
        };
        let (start, end) = time_line
            .split_once("-->")
            .ok_or_else(|| SubtitleError::Timestamp(time_line.to_string()))?;

        let mut text_lines = Vec::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            text_lines.push(line);
        }

        cues.push(SubtitleCue {
            sequence_number,
            start_ms: parse_timestamp(start)?,
            end_ms: parse_timestamp(end)?,
            text: text_lines.join("\n"),
            speaker: None,
        });
    }

    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(turn_index: usize, tag: &str, start_ms: u64, end_ms: u64) -> TimelineEntry {
        TimelineEntry {
            turn_index,
            speaker_tag: tag.to_string(),
            start_ms,
            end_ms,
        }
    }

    fn turn(index: usize, tag: &str, text: &str) -> ScriptTurn {
        ScriptTurn {
            index,
            speaker_tag: tag.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn timestamps_format_and_parse() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(65_250), "00:01:05,250");
        assert_eq!(format_timestamp(3_661_500), "01:01:01,500");
        assert_eq!(parse_timestamp("00:01:05,250").unwrap(), 65_250);
        assert_eq!(parse_timestamp(&format_timestamp(65_250)).unwrap(), 65_250);
        assert!(parse_timestamp("00:61:00,000").is_err());
        assert!(parse_timestamp("1:2").is_err());
    }

    #[test]
    fn short_turns_map_one_to_one() {
        let entries = [entry(0, "A", 0, 1000), entry(1, "B", 1400, 2000)];
        let turns = [turn(0, "A", "Hello."), turn(1, "B", "Hi there.")];
        let cues = SubtitleBuilder::new().build(&entries, &turns).unwrap();

        assert_eq!(cues.len(), 2);
        assert_eq!(cues[1].sequence_number, 2);
        assert_eq!((cues[1].start_ms, cues[1].end_ms), (1400, 2000));
        assert_eq!(cues[1].speaker.as_deref(), Some("B"));
    }

    #[test]
    fn long_turn_splits_proportionally() {
        let text = "The quick brown fox jumps over the lazy dog while the cat watches from the warm windowsill nearby";
        let entries = [entry(0, "HOST", 1000, 11_000)];
        let turns = [turn(0, "HOST", text)];
        let cues = SubtitleBuilder::new()
            .with_max_chars(40)
            .build(&entries, &turns)
            .unwrap();

        assert!(cues.len() >= 2);
        assert_eq!(cues[0].start_ms, 1000);
        assert_eq!(cues.last().unwrap().end_ms, 11_000);

        let joined: Vec<&str> = cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined.join(" "), text);

        let total_chars: u64 = cues.iter().map(|c| c.text.chars().count() as u64).sum();
        for cue in &cues {
            assert!(cue.text.chars().count() <= 40);
            let expected = 10_000 * cue.text.chars().count() as u64 / total_chars;
            let actual = cue.end_ms - cue.start_ms;
            assert!(actual.abs_diff(expected) <= 1, "{actual} vs {expected}");
        }
        for pair in cues.windows(2) {
            assert!(pair[0].end_ms <= pair[1].start_ms);
            assert_eq!(pair[0].sequence_number + 1, pair[1].sequence_number);
        }
    }

    #[test]
    fn cues_stay_inside_their_turn() {
        let long = "word ".repeat(40);
        let entries = [
            entry(0, "A", 0, 4000),
            entry(1, "B", 4400, 9000),
            entry(2, "A", 9400, 9900),
        ];
        let turns = [turn(0, "A", &long), turn(1, "B", &long), turn(2, "A", "ok")];
        let cues = SubtitleBuilder::new().with_max_chars(30).build(&entries, &turns).unwrap();

        for cue in &cues {
            let owner = entries
                .iter()
                .find(|e| cue.start_ms >= e.start_ms && cue.start_ms < e.end_ms)
                .unwrap();
            assert!(cue.end_ms <= owner.end_ms);
        }
        let numbers: Vec<usize> = cues.iter().map(|c| c.sequence_number).collect();
        assert_eq!(numbers, (1..=cues.len()).collect::<Vec<_>>());
    }

    #[test]
    fn unbreakable_text_stays_whole() {
        let word = "x".repeat(120);
        assert_eq!(split_text(&word, 80), vec![word.as_str()]);
    }

    #[test]
    fn inconsistent_offsets_fail() {
        let turns = [turn(0, "A", "a"), turn(1, "B", "b")];
        assert!(matches!(
            SubtitleBuilder::new().build(&[entry(0, "A", 500, 100)], &turns),
            Err(SubtitleError::InvertedEntry { .. })
        ));
        assert!(matches!(
            SubtitleBuilder::new().build(&[entry(0, "A", 0, 500), entry(1, "B", 400, 900)], &turns),
            Err(SubtitleError::Overlap { turn_index: 1 })
        ));
        assert!(matches!(
            SubtitleBuilder::new().build(&[entry(7, "A", 0, 500)], &turns),
            Err(SubtitleError::MissingText { turn_index: 7 })
        ));
    }

    #[test]
    fn srt_renders_and_parses_back() {
        let entries = [entry(0, "HOST_A", 0, 2000), entry(1, "HOST_B", 2500, 4000)];
        let turns = [turn(0, "HOST_A", "Hello, world!"), turn(1, "HOST_B", "This is a test.")];
        let cues = SubtitleBuilder::new().build(&entries, &turns).unwrap();

        let srt = SrtDocument::new(&cues).to_string();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,000\nHello, world!\n\n2\n"));

        let parsed = parse_srt(&srt).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].start_ms, 2500);
        assert_eq!(parsed[1].text, "This is a test.");
    }

    #[test]
    fn speaker_prefix_is_optional() {
        let entries = [entry(0, "GUEST", 0, 900)];
        let turns = [turn(0, "GUEST", "Hi!")];
        let cues = SubtitleBuilder::new().build(&entries, &turns).unwrap();

        assert!(!SrtDocument::new(&cues).to_string().contains("[GUEST]"));
        assert!(SrtDocument::new(&cues)
            .with_speaker_prefix(true)
            .to_string()
            .contains("[GUEST] Hi!"));
    }
}
