//! End-to-end runs of the episode pipeline against in-process fakes.
//!
//! The speech backend returns silent PCM of a fixed length per text and the
//! composer writes a placeholder video, so every stage runs for real except
//! the network call and ffmpeg.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::sync::Notify;

use podclaw::plan::SynthesisOptions;
use podclaw::subtitle::parse_srt;
use podclaw::{
    AudioFormat, CompositionRequest, EpisodeConfig, EpisodeError, EpisodePipeline, EpisodePlan,
    MediaComposer, NoopObserver, RetryPolicy, SpeechBackend, Stage, TtsError, TtsErrorKind,
    VideoCompositionError, VoiceProfile,
};

const RATE: u32 = 44_100;

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Returns `ms` milliseconds of silence per known text, fails every call, or
/// parks every call after signalling `parked`
struct FakeSpeech {
    durations: HashMap<&'static str, u64>,
    fail_status: Option<u16>,
    parked: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl FakeSpeech {
    fn new(durations: &[(&'static str, u64)]) -> Self {
        Self {
            durations: durations.iter().copied().collect(),
            fail_status: None,
            parked: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn parking(parked: Arc<Notify>) -> Self {
        Self {
            parked: Some(parked),
            ..Self::new(&[])
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new(&[])
        }
    }
}

#[async_trait]
impl SpeechBackend for FakeSpeech {
    fn name(&self) -> &str {
        "fake"
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::Pcm { sample_rate: RATE }
    }

    async fn synthesize(&self, text: &str, _voice: &VoiceProfile) -> Result<Bytes, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_status {
            return Err(TtsError::from_status(status, "service unavailable"));
        }
        if let Some(parked) = &self.parked {
            parked.notify_one();
            std::future::pending::<()>().await;
        }
        let ms = self.durations.get(text).copied().unwrap_or(500);
        let frames = (u64::from(RATE) * ms / 1000) as usize;
        Ok(Bytes::from(vec![0u8; frames * 2]))
    }
}

enum ComposeBehavior {
    Succeed,
    Fail,
    Hang(Arc<Notify>),
}

/// Records requests and writes a placeholder video
struct FakeComposer {
    behavior: ComposeBehavior,
    requests: Mutex<Vec<CompositionRequest>>,
}

impl FakeComposer {
    fn new(behavior: ComposeBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn last_request(&self) -> CompositionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl MediaComposer for FakeComposer {
    async fn compose(
        &self,
        plan: &EpisodePlan,
        request: &CompositionRequest,
    ) -> Result<(), VideoCompositionError> {
        assert!(request.background.exists());
        assert!(request.audio.exists());
        if plan.video().subtitles {
            assert!(request.subtitles.exists());
        }
        self.requests.lock().unwrap().push(request.clone());

        match &self.behavior {
            ComposeBehavior::Succeed => {
                tokio::fs::write(&request.output, b"mp4").await.unwrap();
                Ok(())
            }
            ComposeBehavior::Fail => Err(VideoCompositionError::Failed {
                status: "exit status: 1".to_string(),
                diagnostics: "Unknown encoder 'libx264'".to_string(),
            }),
            ComposeBehavior::Hang(entered) => {
                entered.notify_one();
                std::future::pending().await
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn config(out: &Path) -> EpisodeConfig {
    EpisodeConfig::builder("AI safety")
        .output_dir(out)
        .gap_ms(400)
        .synthesis(SynthesisOptions {
            concurrency: 2,
            retry: RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        })
        .build()
        .unwrap()
}

fn pipeline(speech: Arc<FakeSpeech>, composer: Arc<FakeComposer>) -> EpisodePipeline {
    EpisodePipeline::new(speech, composer)
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default()
}

const SCRIPT: &str = "[A] Hello.\n[B] Hi there.";

// ─── Success path ────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_turns_produce_all_artifacts() {
    let out = TempDir::new().unwrap();
    let speech = Arc::new(FakeSpeech::new(&[("Hello.", 1000), ("Hi there.", 1500)]));
    let composer = Arc::new(FakeComposer::new(ComposeBehavior::Succeed));

    let artifacts = pipeline(speech.clone(), composer.clone())
        .run(config(out.path()), SCRIPT, &NoopObserver)
        .await
        .unwrap();

    assert_eq!(artifacts.turn_count, 2);
    assert_eq!(artifacts.duration_ms, 2900);
    assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
    assert_eq!(composer.last_request().duration_ms, 2900);

    assert_eq!(artifacts.video, out.path().join("podclaw_AI_safety.mp4"));
    for path in [
        &artifacts.video,
        &artifacts.audio,
        &artifacts.subtitles,
        &artifacts.script,
        &artifacts.background,
    ] {
        assert!(path.exists(), "{} missing", path.display());
    }
    assert_eq!(files_in(out.path()).len(), 5);

    let cues = parse_srt(&std::fs::read_to_string(&artifacts.subtitles).unwrap()).unwrap();
    assert_eq!(cues.len(), 2);
    assert_eq!((cues[0].start_ms, cues[0].end_ms), (0, 1000));
    assert_eq!((cues[1].start_ms, cues[1].end_ms), (1400, 2900));
    assert_eq!(cues[1].text, "Hi there.");

    let reader = hound::WavReader::open(&artifacts.audio).unwrap();
    assert_eq!(reader.spec().sample_rate, RATE);
    assert_eq!(reader.spec().channels, 1);
    let track_ms = u64::from(reader.duration()) * 1000 / u64::from(RATE);
    assert!((2899..=2900).contains(&track_ms), "track is {track_ms} ms");

    assert_eq!(
        std::fs::read_to_string(&artifacts.script).unwrap(),
        "[A] Hello.\n[B] Hi there.\n"
    );
}

#[tokio::test]
async fn scratch_directory_is_removed_after_success() {
    let out = TempDir::new().unwrap();
    let speech = Arc::new(FakeSpeech::new(&[]));
    let composer = Arc::new(FakeComposer::new(ComposeBehavior::Succeed));

    pipeline(speech, composer.clone())
        .run(config(out.path()), SCRIPT, &NoopObserver)
        .await
        .unwrap();

    let scratch = composer.last_request().audio.parent().unwrap().to_path_buf();
    assert!(!scratch.exists());
}

#[tokio::test]
async fn observer_sees_every_stage_in_order() {
    let out = TempDir::new().unwrap();
    let events: Mutex<Vec<(Stage, String)>> = Mutex::new(Vec::new());
    let observer = |stage: Stage, message: &str| {
        events.lock().unwrap().push((stage, message.to_string()));
    };

    pipeline(
        Arc::new(FakeSpeech::new(&[])),
        Arc::new(FakeComposer::new(ComposeBehavior::Succeed)),
    )
    .run(config(out.path()), SCRIPT, &observer)
    .await
    .unwrap();

    let mut stages: Vec<Stage> = events.lock().unwrap().iter().map(|(s, _)| *s).collect();
    stages.dedup();
    assert_eq!(stages, Stage::ALL);

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|(s, m)| *s == Stage::Voices && m == "A=Roger, B=George"));
}

#[tokio::test]
async fn subtitles_toggle_still_writes_srt() {
    let out = TempDir::new().unwrap();
    let config = EpisodeConfig::builder("toggles")
        .output_dir(out.path())
        .waveform(false)
        .subtitles(false)
        .build()
        .unwrap();

    let artifacts = pipeline(
        Arc::new(FakeSpeech::new(&[])),
        Arc::new(FakeComposer::new(ComposeBehavior::Succeed)),
    )
    .run(config, SCRIPT, &NoopObserver)
    .await
    .unwrap();

    assert!(artifacts.subtitles.exists());
}

// ─── Failure paths ───────────────────────────────────────────────────────────

#[tokio::test]
async fn persistent_503_is_fatal_after_five_attempts() {
    let out = TempDir::new().unwrap();
    let speech = Arc::new(FakeSpeech::failing(503));
    let composer = Arc::new(FakeComposer::new(ComposeBehavior::Succeed));

    let err = pipeline(speech.clone(), composer.clone())
        .run(config(out.path()), "[A] Hello.", &NoopObserver)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Synthesis);
    match &err.cause {
        EpisodeError::Tts(tts) => {
            assert_eq!(tts.kind, TtsErrorKind::Fatal);
            assert_eq!(tts.turn_index, Some(0));
        }
        other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(speech.calls.load(Ordering::SeqCst), 5);
    assert!(composer.requests.lock().unwrap().is_empty());
    assert!(files_in(out.path()).is_empty());
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let out = TempDir::new().unwrap();
    let speech = Arc::new(FakeSpeech::failing(401));

    let err = pipeline(
        speech.clone(),
        Arc::new(FakeComposer::new(ComposeBehavior::Succeed)),
    )
    .run(config(out.path()), "[A] Hello.", &NoopObserver)
    .await
    .unwrap_err();

    assert_eq!(err.stage, Stage::Synthesis);
    assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_script_fails_in_script_stage() {
    let out = TempDir::new().unwrap();
    let speech = Arc::new(FakeSpeech::new(&[]));

    let err = pipeline(
        speech.clone(),
        Arc::new(FakeComposer::new(ComposeBehavior::Succeed)),
    )
    .run(config(out.path()), "  \n\n", &NoopObserver)
    .await
    .unwrap_err();

    assert_eq!(err.stage, Stage::Script);
    assert!(matches!(err.cause, EpisodeError::ScriptParse(_)));
    assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
    assert!(err.to_string().starts_with("script stage failed"));
}

#[tokio::test]
async fn composition_failure_leaves_no_outputs() {
    let out = TempDir::new().unwrap();
    let composer = Arc::new(FakeComposer::new(ComposeBehavior::Fail));

    let err = pipeline(Arc::new(FakeSpeech::new(&[])), composer.clone())
        .run(config(out.path()), SCRIPT, &NoopObserver)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Video);
    assert!(err.to_string().contains("libx264"));
    assert!(files_in(out.path()).is_empty());
    let scratch = composer.last_request().audio.parent().unwrap().to_path_buf();
    assert!(!scratch.exists());
}

#[tokio::test]
async fn shutdown_cancels_and_cleans_up() {
    let out = TempDir::new().unwrap();
    let entered = Arc::new(Notify::new());
    let composer = Arc::new(FakeComposer::new(ComposeBehavior::Hang(entered.clone())));

    let err = pipeline(Arc::new(FakeSpeech::new(&[])), composer.clone())
        .run_until(config(out.path()), SCRIPT, &NoopObserver, entered.notified())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.stage, Stage::Video);
    assert!(files_in(out.path()).is_empty());
    let scratch = composer.last_request().audio.parent().unwrap().to_path_buf();
    assert!(!scratch.exists());
}

#[tokio::test]
async fn shutdown_during_synthesis_stops_new_requests() {
    let out = TempDir::new().unwrap();
    let parked = Arc::new(Notify::new());
    let speech = Arc::new(FakeSpeech::parking(parked.clone()));
    let composer = Arc::new(FakeComposer::new(ComposeBehavior::Succeed));
    let script = "[A] one\n[B] two\n[A] three\n[B] four\n[A] five";

    let err = pipeline(speech.clone(), composer.clone())
        .run_until(config(out.path()), script, &NoopObserver, parked.notified())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.stage, Stage::Synthesis);
    let calls = speech.calls.load(Ordering::SeqCst);
    assert!((1..=2).contains(&calls), "{calls} requests started");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(speech.calls.load(Ordering::SeqCst), calls);
    assert!(composer.requests.lock().unwrap().is_empty());
    assert!(files_in(out.path()).is_empty());
}

#[tokio::test]
async fn failed_placement_keeps_previous_episode() {
    let out = TempDir::new().unwrap();
    let old_audio = out.path().join("podclaw_AI_safety.wav");
    let old_srt = out.path().join("podclaw_AI_safety.srt");
    std::fs::write(&old_audio, b"previous audio").unwrap();
    std::fs::write(&old_srt, b"previous cues").unwrap();
    // Nothing can be renamed onto a directory
    std::fs::create_dir(out.path().join("podclaw_AI_safety.mp4")).unwrap();

    let err = pipeline(
        Arc::new(FakeSpeech::new(&[])),
        Arc::new(FakeComposer::new(ComposeBehavior::Succeed)),
    )
    .run(config(out.path()), SCRIPT, &NoopObserver)
    .await
    .unwrap_err();

    assert_eq!(err.stage, Stage::Artifacts);
    assert_eq!(std::fs::read(&old_audio).unwrap(), b"previous audio");
    assert_eq!(std::fs::read(&old_srt).unwrap(), b"previous cues");
    let leftovers: Vec<PathBuf> = files_in(out.path())
        .into_iter()
        .filter(|p| p.to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty(), "staged files left: {leftovers:?}");
    assert_eq!(files_in(out.path()).len(), 3);
}

#[tokio::test]
async fn rerun_replaces_previous_episode() {
    let out = TempDir::new().unwrap();
    let old_audio = out.path().join("podclaw_AI_safety.wav");
    std::fs::write(&old_audio, b"previous audio").unwrap();

    let artifacts = pipeline(
        Arc::new(FakeSpeech::new(&[])),
        Arc::new(FakeComposer::new(ComposeBehavior::Succeed)),
    )
    .run(config(out.path()), SCRIPT, &NoopObserver)
    .await
    .unwrap();

    assert_eq!(artifacts.audio, old_audio);
    assert_ne!(std::fs::read(&old_audio).unwrap(), b"previous audio");
    assert_eq!(files_in(out.path()).len(), 5);
}
