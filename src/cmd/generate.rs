use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use podclaw::script::{
    format_duration, ScriptRequest, ScriptSource, SuppliedScript, TemplateScriptSource,
};
use podclaw::{
    ElevenLabsBackend, EpisodeFormat, EpisodePipeline, FfmpegComposer, ParseMode,
    ProgressObserver, Settings, Stage,
};

use super::parse_duration_arg;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Episode topic
    pub topic: String,

    /// Episode format (see `podclaw formats`)
    #[arg(short, long, default_value = "debate")]
    pub format: EpisodeFormat,

    /// Voice pool, comma-separated (preset names or voice ids)
    #[arg(long, value_delimiter = ',')]
    pub voices: Vec<String>,

    /// Target duration (90s, 2m, 1m30s)
    #[arg(short, long, default_value = "2m", value_parser = parse_duration_arg)]
    pub duration: u64,

    /// Speaker-tagged script file; the built-in template is used otherwise
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Output file name
    #[arg(long)]
    pub filename: Option<String>,

    /// Skip the waveform overlay
    #[arg(long)]
    pub no_waveform: bool,

    /// Skip burnt-in subtitles
    #[arg(long)]
    pub no_subtitles: bool,

    /// Silence between turns in milliseconds
    #[arg(long)]
    pub gap_ms: Option<u64>,

    /// Reject scripts with untagged lines
    #[arg(long)]
    pub strict: bool,

    /// Prefix subtitle cues with the speaker tag
    #[arg(long)]
    pub speaker_prefix: bool,

    /// Print the artifact summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Prints progress lines to stderr
struct ConsoleObserver;

impl ProgressObserver for ConsoleObserver {
    fn notify(&self, stage: Stage, message: &str) {
        eprintln!("   [{stage}] {message}");
    }
}

pub async fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let settings = Settings::load()?;

    // Fail before any stage runs
    let tts = settings
        .elevenlabs()
        .context("voice synthesis is not configured")?;
    let backend = ElevenLabsBackend::new(tts)?;
    let composer = settings
        .ffmpeg_path()
        .map_or_else(FfmpegComposer::new, FfmpegComposer::with_path);

    let mut builder = settings
        .builder(&args.topic)
        .format(args.format)
        .output_dir(&args.output);
    if !args.voices.is_empty() {
        builder = builder.voices(args.voices.iter().cloned());
    }
    if let Some(name) = &args.filename {
        builder = builder.file_name(name);
    }
    if args.no_waveform {
        builder = builder.waveform(false);
    }
    if args.no_subtitles {
        builder = builder.subtitles(false);
    }
    if let Some(gap) = args.gap_ms {
        builder = builder.gap_ms(gap);
    }
    if args.strict {
        builder = builder.parse_mode(ParseMode::Strict);
    }
    if args.speaker_prefix {
        builder = builder.speaker_prefix(true);
    }
    let config = builder.build()?;

    let source: Box<dyn ScriptSource> = match &args.script {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading script {}", path.display()))?;
            Box::new(SuppliedScript(text))
        }
        None => {
            eprintln!("ℹ️  No --script given, using the built-in {} template", args.format);
            Box::new(TemplateScriptSource)
        }
    };
    let script = source.script(&ScriptRequest {
        topic: args.topic.clone(),
        format: args.format,
        target_duration_secs: args.duration,
    })?;

    eprintln!("🎙️  Generating: {}", args.topic);
    eprintln!("   Format: {}", args.format);
    eprintln!(
        "   Voices: {}",
        config
            .voices
            .iter()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!("   Target: {}", format_duration(args.duration));
    eprintln!("   Output: {}", config.output.video().display());

    let pipeline = EpisodePipeline::new(Arc::new(backend), Arc::new(composer));
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let start = Instant::now();
    let artifacts = pipeline
        .run_until(config, &script, &ConsoleObserver, shutdown)
        .await?;

    eprintln!(
        "\n✅ Episode ready in {:.1}s",
        start.elapsed().as_secs_f64()
    );
    eprintln!(
        "   Length: {}",
        format_duration(artifacts.duration_ms.div_ceil(1000))
    );
    eprintln!("   Turns: {}", artifacts.turn_count);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }
    println!("{}", artifacts.video.display());
    println!("{}", artifacts.audio.display());
    println!("{}", artifacts.subtitles.display());
    println!("{}", artifacts.script.display());
    println!("{}", artifacts.background.display());
    Ok(())
}
