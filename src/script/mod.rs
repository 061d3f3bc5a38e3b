//! Speaker-tagged script parsing
//!
//! Input is one turn per line, each starting with a bracketed tag:
//!
//! ```text
//! [HOST_A] Welcome to the show!
//! [HOST_B] Glad to be here.
//! ```
//!
//! Tags are opaque strings. Any non-empty tag is accepted.

pub mod source;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScriptParseError;

pub use source::{
    build_prompt, estimate_word_count, format_duration, parse_duration, ScriptRequest,
    ScriptSource, ScriptSourceError, SuppliedScript, TemplateScriptSource,
};

/// One speaker's contiguous text unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTurn {
    /// Position in the script, starting at 0
    pub index: usize,
    pub speaker_tag: String,
    pub text: String,
}

/// How untagged lines are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// An untagged line directly below a turn continues it; other untagged
    /// lines are skipped.
    #[default]
    Lenient,
    /// Every untagged line is an error.
    Strict,
}

struct PendingTurn {
    tag: String,
    parts: Vec<String>,
    line: usize,
}

/// Parse raw script text into ordered turns.
pub fn parse_script(raw: &str, mode: ParseMode) -> Result<Vec<ScriptTurn>, ScriptParseError> {
    let mut turns = Vec::new();
    let mut pending: Option<PendingTurn> = None;
    // Continuations must sit directly under a tagged line or another continuation
    let mut attached = false;

    for (i, raw_line) in raw.lines().enumerate() {
        let line_no = i + 1;
        let line = raw_line.trim();

        if line.is_empty() {
            attached = false;
            continue;
        }

        if let Some(after_open) = line.strip_prefix('[') {
            let close = after_open
                .find(']')
                .ok_or(ScriptParseError::UnterminatedTag { line: line_no })?;
            let tag = after_open[..close].trim();
            if tag.is_empty() {
                return Err(ScriptParseError::EmptyTag { line: line_no });
            }

            if let Some(done) = pending.take() {
                turns.push(finish_turn(done, turns.len())?);
            }

            let rest = after_open[close + 1..].trim();
            pending = Some(PendingTurn {
                tag: tag.to_string(),
                parts: if rest.is_empty() {
                    Vec::new()
                } else {
                    vec![rest.to_string()]
                },
                line: line_no,
            });
            attached = true;
            continue;
        }

        match (mode, attached, pending.as_mut()) {
            (ParseMode::Strict, _, _) => {
                return Err(ScriptParseError::UntaggedLine { line: line_no });
            }
            (ParseMode::Lenient, true, Some(turn)) => turn.parts.push(line.to_string()),
            (ParseMode::Lenient, _, _) => {
                debug!(line = line_no, "skipping untagged line");
            }
        }
    }

    if let Some(done) = pending.take() {
        turns.push(finish_turn(done, turns.len())?);
    }

    if turns.is_empty() {
        return Err(ScriptParseError::NoTurns);
    }

    Ok(turns)
}

fn finish_turn(turn: PendingTurn, index: usize) -> Result<ScriptTurn, ScriptParseError> {
    let text = turn.parts.join(" ");
    if text.is_empty() {
        return Err(ScriptParseError::EmptyTurn {
            line: turn.line,
            tag: turn.tag,
        });
    }
    Ok(ScriptTurn {
        index,
        speaker_tag: turn.tag,
        text,
    })
}

/// Render turns back to tagged text (one line per turn).
pub fn render_transcript(turns: &[ScriptTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push('[');
        out.push_str(&turn.speaker_tag);
        out.push_str("] ");
        out.push_str(&turn.text);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_lines_in_order() {
        let script = "[HOST_A] Hello there!\n[HOST_B] Welcome to the show.\n[HOST_A] Let's get started.";
        let turns = parse_script(script, ParseMode::Lenient).unwrap();

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].speaker_tag, "HOST_A");
        assert_eq!(turns[0].text, "Hello there!");
        assert_eq!(turns[1].speaker_tag, "HOST_B");
        assert_eq!(turns[2].index, 2);
    }

    #[test]
    fn continuation_line_joins_previous_turn() {
        let script = "[HOST] This is the first line.\nAnd this continues on the next line.\n[HOST] New segment.";
        let turns = parse_script(script, ParseMode::Lenient).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(
            turns[0].text,
            "This is the first line. And this continues on the next line."
        );
    }

    #[test]
    fn blank_lines_are_skipped_and_break_continuation() {
        let script = "\n[A] One.\n\nstray line\n\n[B] Two.\n";
        let turns = parse_script(script, ParseMode::Lenient).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "One.");
        assert_eq!(turns[1].text, "Two.");
    }

    #[test]
    fn strict_mode_rejects_untagged_lines() {
        let script = "[A] One.\ncontinued";
        assert_eq!(
            parse_script(script, ParseMode::Strict),
            Err(ScriptParseError::UntaggedLine { line: 2 })
        );
    }

    #[test]
    fn empty_and_untagged_scripts_fail() {
        assert_eq!(parse_script("", ParseMode::Lenient), Err(ScriptParseError::NoTurns));
        assert_eq!(
            parse_script("   \n\n  ", ParseMode::Lenient),
            Err(ScriptParseError::NoTurns)
        );
        assert_eq!(
            parse_script("Just some text without tags", ParseMode::Lenient),
            Err(ScriptParseError::NoTurns)
        );
    }

    #[test]
    fn malformed_tags_fail() {
        assert_eq!(
            parse_script("[HOST_A Hello", ParseMode::Lenient),
            Err(ScriptParseError::UnterminatedTag { line: 1 })
        );
        assert_eq!(
            parse_script("[A] ok\n[  ] Hello", ParseMode::Lenient),
            Err(ScriptParseError::EmptyTag { line: 2 })
        );
    }

    #[test]
    fn tag_without_text_uses_continuation() {
        let turns = parse_script("[GUEST]\nWell, where do I start?", ParseMode::Lenient).unwrap();
        assert_eq!(turns[0].text, "Well, where do I start?");

        assert!(matches!(
            parse_script("[GUEST]\n\n[HOST] Hi", ParseMode::Lenient),
            Err(ScriptParseError::EmptyTurn { line: 1, .. })
        ));
    }

    #[test]
    fn custom_tags_are_accepted() {
        let turns = parse_script("[Dr. Who?] Run!\n[the_cat] Meow", ParseMode::Strict).unwrap();
        assert_eq!(turns[0].speaker_tag, "Dr. Who?");
        assert_eq!(turns[1].speaker_tag, "the_cat");
    }

    #[test]
    fn transcript_round_trips() {
        let script = "[HOST_A] Hello.\n[HOST_B] Hi there.\n";
        let turns = parse_script(script, ParseMode::Strict).unwrap();
        assert_eq!(render_transcript(&turns), script);
    }
}
