//! `podclaw` CLI - assemble podcast episodes from speaker-tagged scripts

mod cmd;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use podclaw::EpisodeFormat;

use cmd::{cmd_formats, cmd_generate, cmd_prompt, cmd_voices, parse_duration_arg, GenerateArgs};

#[derive(Parser)]
#[command(name = "podclaw")]
#[command(about = "One-prompt podcast production: voices, subtitles and video from a script")]
#[command(version)]
struct Cli {
    /// Log progress details (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an episode: audio, subtitles and video
    Generate(GenerateArgs),

    /// List available voices
    Voices,

    /// List episode formats and their speaker tags
    Formats,

    /// Print the script-writing prompt for a topic
    Prompt {
        /// Episode topic
        topic: String,

        /// Episode format
        #[arg(short, long, default_value = "debate")]
        format: EpisodeFormat,

        /// Target duration (90s, 2m, 1m30s)
        #[arg(short, long, default_value = "2m", value_parser = parse_duration_arg)]
        duration: u64,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "podclaw=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Generate(args) => cmd_generate(args).await,
        Commands::Voices => cmd_voices(),
        Commands::Formats => {
            cmd_formats();
            Ok(())
        }
        Commands::Prompt {
            topic,
            format,
            duration,
        } => {
            cmd_prompt(&topic, format, duration);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}
