use podclaw::script::{build_prompt, ScriptRequest};
use podclaw::EpisodeFormat;

pub fn cmd_prompt(topic: &str, format: EpisodeFormat, duration_secs: u64) {
    let request = ScriptRequest {
        topic: topic.to_string(),
        format,
        target_duration_secs: duration_secs,
    };
    println!("{}", build_prompt(&request));
}
