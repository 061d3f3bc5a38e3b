mod formats;
mod generate;
mod prompt;
mod voices;

pub use formats::cmd_formats;
pub use generate::{cmd_generate, GenerateArgs};
pub use prompt::cmd_prompt;
pub use voices::cmd_voices;

/// clap parser for `90s`, `2m`, `1m30s` or bare seconds
pub fn parse_duration_arg(s: &str) -> Result<u64, String> {
    podclaw::script::parse_duration(s)
        .filter(|secs| *secs > 0)
        .ok_or_else(|| format!("invalid duration '{s}' (try 90s, 2m or 1m30s)"))
}
