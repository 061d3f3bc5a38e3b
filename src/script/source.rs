//! Script sources
//!
//! The pipeline consumes raw tagged text and never generates it. A
//! [`ScriptSource`] turns a topic into that text: the built-in
//! [`TemplateScriptSource`] fills a canned script per format, and
//! [`build_prompt`] renders the instructions for an external LLM.

use thiserror::Error;

use crate::format::EpisodeFormat;

/// Natural speaking rate used for word-count estimates
const WORDS_PER_MINUTE: u64 = 150;

/// What the script source is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    pub topic: String,
    pub format: EpisodeFormat,
    /// Advisory only; the returned turns are authoritative
    pub target_duration_secs: u64,
}

#[derive(Error, Debug)]
pub enum ScriptSourceError {
    #[error("a topic is required to generate a script")]
    MissingTopic,

    #[error("script source failed: {0}")]
    Failed(String),
}

/// Producer of raw speaker-tagged text
pub trait ScriptSource: Send + Sync {
    fn script(&self, request: &ScriptRequest) -> Result<String, ScriptSourceError>;
}

/// Pre-written script text, returned unmodified
#[derive(Debug, Clone)]
pub struct SuppliedScript(pub String);

impl ScriptSource for SuppliedScript {
    fn script(&self, _request: &ScriptRequest) -> Result<String, ScriptSourceError> {
        Ok(self.0.clone())
    }
}

/// Canned demo script per format, no LLM involved
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateScriptSource;

impl ScriptSource for TemplateScriptSource {
    fn script(&self, request: &ScriptRequest) -> Result<String, ScriptSourceError> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(ScriptSourceError::MissingTopic);
        }
        Ok(demo_script(request.format, topic))
    }
}

fn demo_script(format: EpisodeFormat, topic: &str) -> String {
    match format {
        EpisodeFormat::Monologue => format!(
            "[HOST] Welcome to the show! Today we're diving deep into {topic}.
[HOST] This is one of those topics that everyone has an opinion on, but very few people actually understand.
[HOST] So let me break it down for you.
[HOST] First off, let's talk about why {topic} matters right now.
[HOST] The world is changing fast, and this is at the center of it.
[HOST] Here's what most people get wrong about it.
[HOST] They think it's simple. It's not. It's layers upon layers of complexity.
[HOST] But here's the good news - once you understand the core principle, everything else clicks.
[HOST] And that core principle? It all comes down to one thing.
[HOST] Incentives. Follow the incentives, and you'll understand {topic}.
[HOST] That's all for today. Thanks for listening, and I'll catch you in the next one."
        ),
        EpisodeFormat::NewsRecap => format!(
            "[ANCHOR] Good evening! Top stories tonight - major developments in {topic}.
[CORRESPONDENT] That's right. We've been tracking this all week, and things are heating up.
[ANCHOR] Give us the rundown.
[CORRESPONDENT] Three big developments. First, the landscape has shifted dramatically.
[ANCHOR] How so?
[CORRESPONDENT] New players are entering the space, and the old guard isn't happy about it.
[ANCHOR] And the second development?
[CORRESPONDENT] The numbers are in, and they're surprising everyone. Way higher than expected.
[ANCHOR] That's significant. And the third?
[CORRESPONDENT] Perhaps most importantly - the regulatory picture is changing.
[ANCHOR] What does this mean for the average person?
[CORRESPONDENT] It means {topic} is about to affect everyone, whether they're paying attention or not.
[ANCHOR] That's all the time we have. Stay informed, stay sharp."
        ),
        two_voice => {
            let roles = two_voice.roles();
            let a = roles[0];
            let b = roles.get(1).copied().unwrap_or(a);
            format!(
                "[{a}] Welcome to the show! Today we're tackling {topic}.
[{b}] Oh, this is going to be good. I have STRONG opinions on this one.
[{a}] I know you do. So let's get right into it. Where do you stand?
[{b}] Here's the thing - most people are looking at {topic} completely wrong.
[{a}] Wrong how? Walk me through it.
[{b}] They're focused on the surface level. The flashy stuff. But the real story is underneath.
[{a}] Okay, I'll push back on that. The surface level matters because that's what people experience.
[{b}] Sure, but if you only look at what's visible, you miss the entire mechanism driving it.
[{a}] Fair point. So what's the mechanism?
[{b}] It comes down to three things. Money, power, and timing.
[{a}] The holy trinity.
[{b}] Exactly. And right now, the timing couldn't be more critical.
[{a}] This has been a fantastic discussion. Thanks for tuning in everyone!
[{b}] Peace!"
            )
        }
    }
}

/// Words needed to fill `duration_secs` of natural speech
pub fn estimate_word_count(duration_secs: u64) -> u64 {
    duration_secs * WORDS_PER_MINUTE / 60
}

/// Human-readable duration: `"45 seconds"`, `"2 minutes"`, `"1m 30s"`
pub fn format_duration(secs: u64) -> String {
    let minutes = secs / 60;
    let remaining = secs % 60;
    match (minutes, remaining) {
        (0, s) => format!("{s} seconds"),
        (1, 0) => "1 minute".to_string(),
        (m, 0) => format!("{m} minutes"),
        (m, s) => format!("{m}m {s}s"),
    }
}

/// Parse `"90s"`, `"2m"`, `"1m30s"` or bare seconds.
pub fn parse_duration(input: &str) -> Option<u64> {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Some(secs);
    }

    let (minutes, rest) = match s.split_once('m') {
        Some((m, rest)) => (m.parse::<u64>().ok()?, rest),
        None => (0, s.as_str()),
    };
    let seconds = match rest.strip_suffix('s') {
        Some(secs) => secs.parse::<u64>().ok()?,
        None if rest.is_empty() => 0,
        None => return None,
    };
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Render the LLM prompt that asks for a script in `request.format`.
pub fn build_prompt(request: &ScriptRequest) -> String {
    let topic = request.topic.trim();
    let duration = format_duration(request.target_duration_secs);
    let words = estimate_word_count(request.target_duration_secs);
    let header = format!("Topic: {topic}\nTarget duration: {duration} (approximately {words} words)");

    match request.format {
        EpisodeFormat::Debate => format!(
            "Write a lively, entertaining podcast debate script between two hosts.

{header}

FORMAT RULES:
- Two speakers: HOST_A and HOST_B
- HOST_A takes the \"for\" position, HOST_B takes the \"against\" position
- Each line must start with the speaker tag: [HOST_A] or [HOST_B]
- Keep it conversational, witty, and engaging - not dry or academic
- Include back-and-forth rebuttals, interruptions feel natural
- Open with a brief intro from HOST_A, close with both summarizing
- Use humor, analogies, and real-world examples
- Avoid filler phrases like \"That's a great point\"

Example line format:
[HOST_A] Welcome to the show! Today we're diving into {topic}...
[HOST_B] And I'm here to tell you why that's completely wrong.

Write the full script now:"
        ),
        EpisodeFormat::Monologue => format!(
            "Write an engaging solo podcast monologue script.

{header}

FORMAT RULES:
- Single speaker: HOST
- Each line starts with [HOST]
- Conversational tone - like talking to a friend
- Use rhetorical questions to keep listeners engaged
- Include personal anecdotes or hypothetical stories
- Break into clear sections with natural transitions
- Open strong with a hook, close with a takeaway

Example line format:
[HOST] You know what nobody talks about? {topic}. And today, we're going there.

Write the full script now:"
        ),
        EpisodeFormat::NewsRecap => format!(
            "Write a punchy, fast-paced news recap podcast script.

{header}

FORMAT RULES:
- Two speakers: ANCHOR and CORRESPONDENT
- Each line starts with [ANCHOR] or [CORRESPONDENT]
- ANCHOR introduces stories and asks questions
- CORRESPONDENT provides details and analysis
- Cover 3-5 angles or stories related to the topic
- Keep segments short and punchy
- Open with headlines, close with a quick recap

Example line format:
[ANCHOR] Breaking news from the world of {topic}. Let's get into it.
[CORRESPONDENT] The big story today...

Write the full script now:"
        ),
        EpisodeFormat::Interview => format!(
            "Write a compelling podcast interview script.

{header}

FORMAT RULES:
- Two speakers: INTERVIEWER and GUEST
- Each line starts with [INTERVIEWER] or [GUEST]
- INTERVIEWER asks smart, probing questions
- GUEST gives detailed, interesting answers with stories
- Build from simple to complex questions
- Include follow-up questions that show active listening
- Open with a warm introduction of the guest
- Close with a rapid-fire segment or key takeaway

Example line format:
[INTERVIEWER] Welcome to the show! I've been dying to ask you about {topic}.
[GUEST] Thanks for having me. Where do I even start...

Write the full script now:"
        ),
        EpisodeFormat::Storytelling => format!(
            "Write a captivating storytelling podcast script.

{header}

FORMAT RULES:
- Two speakers: NARRATOR and COLOR (color commentary / reactions)
- Each line starts with [NARRATOR] or [COLOR]
- NARRATOR drives the story forward
- COLOR adds reactions, questions, and humor
- Build tension with a clear narrative arc
- Include a twist or surprising element
- Open with an atmospheric hook, close with a reflection

Example line format:
[NARRATOR] Picture this. It's 3 AM, and something just went very, very wrong.
[COLOR] Oh no. I already don't like where this is going.

Write the full script now:"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{parse_script, ParseMode};

    fn request(format: EpisodeFormat) -> ScriptRequest {
        ScriptRequest {
            topic: "quantum computing".to_string(),
            format,
            target_duration_secs: 120,
        }
    }

    #[test]
    fn demo_scripts_parse_for_every_format() {
        for format in EpisodeFormat::ALL {
            let raw = TemplateScriptSource.script(&request(format)).unwrap();
            let turns = parse_script(&raw, ParseMode::Strict).unwrap();
            assert!(turns.len() > 5, "{format} demo script too short");
            assert!(raw.contains("quantum computing"));
            for turn in &turns {
                assert!(format.roles().contains(&turn.speaker_tag.as_str()));
            }
        }
    }

    #[test]
    fn template_source_needs_topic() {
        let mut req = request(EpisodeFormat::Debate);
        req.topic = "  ".to_string();
        assert!(matches!(
            TemplateScriptSource.script(&req),
            Err(ScriptSourceError::MissingTopic)
        ));
    }

    #[test]
    fn supplied_script_is_returned_verbatim() {
        let source = SuppliedScript("[X] hi".to_string());
        assert_eq!(source.script(&request(EpisodeFormat::Debate)).unwrap(), "[X] hi");
    }

    #[test]
    fn word_count_and_duration_labels() {
        assert_eq!(estimate_word_count(120), 300);
        assert_eq!(estimate_word_count(30), 75);
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(120), "2 minutes");
        assert_eq!(format_duration(90), "1m 30s");
    }

    #[test]
    fn parses_duration_strings() {
        assert_eq!(parse_duration("90s"), Some(90));
        assert_eq!(parse_duration("2m"), Some(120));
        assert_eq!(parse_duration("1m30s"), Some(90));
        assert_eq!(parse_duration("75"), Some(75));
        assert_eq!(parse_duration("2h"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("999999999999999999m"), None);
        assert_eq!(parse_duration("307445734561825860m18446744073709551615s"), None);
    }

    #[test]
    fn prompt_mentions_topic_and_word_count() {
        let prompt = build_prompt(&request(EpisodeFormat::Interview));
        assert!(prompt.contains("Topic: quantum computing"));
        assert!(prompt.contains("approximately 300 words"));
        assert!(prompt.contains("[INTERVIEWER]"));
    }
}
