//! Episode assembly
//!
//! Runs the stages in order, each consuming the output of the previous one:
//!
//! 1. script: parse the raw text into turns
//! 2. voices: bind every speaker tag to a voice, freezing the [`EpisodePlan`]
//! 3. tts: synthesize every turn
//! 4. audio: lay the clips out on a timeline and write the track
//! 5. subtitles: derive cues from the timeline and write the SRT file
//! 6. video: render the background and compose the video
//! 7. artifacts: move everything into the output directory
//!
//! Intermediate files live in a scratch directory removed on every exit
//! path. Outputs are staged under hidden names in the output directory and
//! only renamed onto their final names once every file is in place.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::assign::assign_voices;
use crate::audio::AudioTimeline;
use crate::error::{EpisodeError, PipelineError, Stage};
use crate::plan::{EpisodeConfig, EpisodePlan};
use crate::script::{parse_script, render_transcript};
use crate::subtitle::{SrtDocument, SubtitleBuilder};
use crate::tts::{SpeechBackend, Synthesizer};
use crate::video::{write_background, CompositionRequest, MediaComposer};

/// Receives progress events while a run is in flight.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, stage: Stage, message: &str);
}

impl<F> ProgressObserver for F
where
    F: Fn(Stage, &str) + Send + Sync,
{
    fn notify(&self, stage: Stage, message: &str) {
        self(stage, message);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn notify(&self, _stage: Stage, _message: &str) {}
}

/// Forwards events to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn notify(&self, stage: Stage, message: &str) {
        info!(stage = stage.name(), "{message}");
    }
}

/// Files produced by a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeArtifacts {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub subtitles: PathBuf,
    pub script: PathBuf,
    pub background: PathBuf,
    pub duration_ms: u64,
    pub turn_count: usize,
}

/// Stage currently executing, readable after the run future is dropped
#[derive(Debug, Default)]
struct StageTracker(AtomicUsize);

impl StageTracker {
    fn enter(&self, stage: Stage) {
        let index = Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0);
        self.0.store(index, Ordering::SeqCst);
    }

    fn current(&self) -> Stage {
        Stage::ALL[self.0.load(Ordering::SeqCst).min(Stage::ALL.len() - 1)]
    }
}

/// Artifacts copied into the output directory under hidden staging names.
///
/// Final names are only touched by [`promote`](Self::promote). Dropping
/// removes whatever staging files are left, never a final name.
struct StagedOutputs {
    /// `(staging path, final path)`
    files: Vec<(PathBuf, PathBuf)>,
}

impl StagedOutputs {
    fn new() -> Self {
        Self { files: Vec::new() }
    }

    fn stage(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        let staged = staging_path(to);
        // Record first so a half-copied file is cleaned up too
        self.files.push((staged.clone(), to.to_path_buf()));
        if std::fs::rename(from, &staged).is_err() {
            std::fs::copy(from, &staged)?;
        }
        Ok(())
    }

    /// Rename every staged file onto its final name.
    fn promote(self) -> io::Result<()> {
        for (_, to) in &self.files {
            if to.symlink_metadata().is_ok_and(|m| m.is_dir()) {
                return Err(io::Error::new(
                    io::ErrorKind::IsADirectory,
                    format!("{} is a directory", to.display()),
                ));
            }
        }
        for (staged, to) in &self.files {
            std::fs::rename(staged, to)?;
        }
        Ok(())
    }
}

impl Drop for StagedOutputs {
    fn drop(&mut self) {
        for (staged, _) in &self.files {
            if std::fs::remove_file(staged).is_ok() {
                debug!(path = %staged.display(), "removed staged output");
            }
        }
    }
}

/// `dir/.name.partial` for `dir/name`
fn staging_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    to.with_file_name(format!(".{name}.partial"))
}

/// Runs episodes against a speech backend and a media composer.
#[derive(Clone)]
pub struct EpisodePipeline {
    backend: Arc<dyn SpeechBackend>,
    composer: Arc<dyn MediaComposer>,
}

impl EpisodePipeline {
    pub fn new(backend: Arc<dyn SpeechBackend>, composer: Arc<dyn MediaComposer>) -> Self {
        Self { backend, composer }
    }

    /// Assemble one episode from `raw_script`.
    pub async fn run(
        &self,
        config: EpisodeConfig,
        raw_script: &str,
        observer: &dyn ProgressObserver,
    ) -> Result<EpisodeArtifacts, PipelineError> {
        let tracker = StageTracker::default();
        self.execute(config, raw_script, observer, &tracker).await
    }

    /// Like [`run`](Self::run), but stops as soon as `shutdown` completes.
    ///
    /// In-flight synthesis requests and the ffmpeg process are dropped, the
    /// scratch directory is removed and partial outputs are deleted.
    pub async fn run_until<F>(
        &self,
        config: EpisodeConfig,
        raw_script: &str,
        observer: &dyn ProgressObserver,
        shutdown: F,
    ) -> Result<EpisodeArtifacts, PipelineError>
    where
        F: Future<Output = ()>,
    {
        let tracker = StageTracker::default();
        let stage = tokio::select! {
            result = self.execute(config, raw_script, observer, &tracker) => return result,
            () = shutdown => tracker.current(),
        };
        warn!(stage = stage.name(), "run cancelled");
        observer.notify(stage, "cancelled");
        Err(PipelineError::new(stage, EpisodeError::Cancelled))
    }

    async fn execute(
        &self,
        config: EpisodeConfig,
        raw_script: &str,
        observer: &dyn ProgressObserver,
        tracker: &StageTracker,
    ) -> Result<EpisodeArtifacts, PipelineError> {
        let result = self.stages(config, raw_script, observer, tracker).await;
        if let Err(e) = &result {
            warn!(stage = e.stage.name(), error = %e.cause, "episode failed");
        }
        result
    }

    async fn stages(
        &self,
        config: EpisodeConfig,
        raw_script: &str,
        observer: &dyn ProgressObserver,
        tracker: &StageTracker,
    ) -> Result<EpisodeArtifacts, PipelineError> {
        let begin = |stage: Stage, message: &str| {
            tracker.enter(stage);
            observer.notify(stage, message);
        };

        // 1. Script
        begin(Stage::Script, "parsing script");
        let turns = parse_script(raw_script, config.parse_mode)
            .map_err(|e| PipelineError::new(Stage::Script, e))?;
        observer.notify(Stage::Script, &format!("{} turns", turns.len()));

        // 2. Voices
        begin(Stage::Voices, "assigning voices");
        let assignment = assign_voices(&turns, &config.voices, &config.overrides)
            .map_err(|e| PipelineError::new(Stage::Voices, e))?;
        let summary = assignment
            .iter()
            .map(|(tag, voice)| format!("{tag}={}", voice.name))
            .collect::<Vec<_>>()
            .join(", ");
        observer.notify(Stage::Voices, &summary);
        let plan = EpisodePlan::new(config, turns, assignment);
        let config = &plan.config;

        // 3. Synthesis
        begin(
            Stage::Synthesis,
            &format!(
                "synthesizing {} turns with {}",
                plan.turns.len(),
                self.backend.name()
            ),
        );
        let clips = Synthesizer::new(Arc::clone(&self.backend))
            .with_retry(config.synthesis.retry)
            .with_concurrency(config.synthesis.concurrency)
            .synthesize_all(&plan.turns, &plan.assignment)
            .await
            .map_err(|e| PipelineError::new(Stage::Synthesis, e))?;
        observer.notify(Stage::Synthesis, &format!("{} clips", clips.len()));

        // 4. Timeline
        begin(Stage::Timeline, "building audio timeline");
        let scratch = scratch_dir().map_err(|e| PipelineError::new(Stage::Timeline, e))?;
        let work = scratch.path();
        let timeline = AudioTimeline::build(&clips, &plan.turns, config.gap_ms)
            .map_err(|e| PipelineError::new(Stage::Timeline, e))?;
        let track = work.join("track.wav");
        timeline
            .write_track(&clips, config.sample_rate, &track)
            .map_err(|e| PipelineError::new(Stage::Timeline, e))?;
        drop(clips);
        observer.notify(
            Stage::Timeline,
            &format!("track is {}", format_ms(timeline.total_ms())),
        );

        // 5. Subtitles
        begin(Stage::Subtitles, "building subtitles");
        let cues = SubtitleBuilder::new()
            .with_max_chars(config.max_cue_chars)
            .build(timeline.entries(), &plan.turns)
            .map_err(|e| PipelineError::new(Stage::Subtitles, e))?;
        let srt = work.join("episode.srt");
        SrtDocument::new(&cues)
            .with_speaker_prefix(config.speaker_prefix)
            .write_to_file(&srt)
            .await
            .map_err(|e| PipelineError::new(Stage::Subtitles, e))?;
        observer.notify(Stage::Subtitles, &format!("{} cues", cues.len()));

        // 6. Video
        begin(Stage::Video, "composing video");
        let style = plan.video();
        let background = work.join("background.png");
        write_background(
            &background,
            style,
            Some(config.topic.as_str()),
            Some(config.format.description()),
        )
        .map_err(|e| PipelineError::new(Stage::Video, e))?;
        let request = CompositionRequest {
            background,
            audio: track,
            subtitles: srt,
            output: work.join("episode.mp4"),
            duration_ms: timeline.total_ms(),
        };
        self.composer
            .compose(&plan, &request)
            .await
            .map_err(|e| PipelineError::new(Stage::Video, e))?;
        observer.notify(Stage::Video, "video composed");

        // 7. Artifacts
        begin(Stage::Artifacts, "writing artifacts");
        let artifacts = place_artifacts(&plan, &request, timeline.total_ms())
            .map_err(|e| PipelineError::new(Stage::Artifacts, e))?;
        observer.notify(
            Stage::Artifacts,
            &format!("episode saved to {}", artifacts.video.display()),
        );
        info!(
            video = %artifacts.video.display(),
            duration_ms = artifacts.duration_ms,
            turns = artifacts.turn_count,
            "episode assembled"
        );
        Ok(artifacts)
    }
}

fn scratch_dir() -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix("podclaw_").tempdir()
}

/// Move the scratch outputs into the output directory.
///
/// Contains no await point, so a cancelled run never stops it halfway.
fn place_artifacts(
    plan: &EpisodePlan,
    request: &CompositionRequest,
    duration_ms: u64,
) -> Result<EpisodeArtifacts, EpisodeError> {
    let naming = &plan.config.output;
    std::fs::create_dir_all(&naming.dir)?;

    let transcript = request.output.with_file_name("script.txt");
    std::fs::write(&transcript, render_transcript(&plan.turns))?;

    let artifacts = EpisodeArtifacts {
        video: naming.video(),
        audio: naming.audio(),
        subtitles: naming.subtitles(),
        script: naming.script(),
        background: naming.background(),
        duration_ms,
        turn_count: plan.turns.len(),
    };

    let mut staged = StagedOutputs::new();
    for (from, to) in [
        (&request.audio, &artifacts.audio),
        (&request.subtitles, &artifacts.subtitles),
        (&transcript, &artifacts.script),
        (&request.background, &artifacts.background),
        (&request.output, &artifacts.video),
    ] {
        staged.stage(from, to)?;
    }
    staged.promote()?;
    Ok(artifacts)
}

fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}m {:02}s", secs / 60, secs % 60)
}
