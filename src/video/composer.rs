//! ffmpeg composition of the final video
//!
//! Layers, bottom to top:
//! - background still, scaled to the output resolution
//! - audio waveform band 180px above the bottom edge (optional)
//! - burnt-in subtitles (optional)
//!
//! and the assembled track as the audio stream. One process per episode,
//! never retried.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::VideoCompositionError;
use crate::plan::{EpisodePlan, VideoStyle};

/// Environment variable overriding the ffmpeg binary
pub const FFMPEG_ENV: &str = "PODCLAW_FFMPEG";

const WAVEFORM_HEIGHT: u32 = 120;
const WAVEFORM_OFFSET: u32 = 180;
/// Stderr lines kept in a failure report
const DIAGNOSTIC_LINES: usize = 40;

/// Files for one composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionRequest {
    pub background: PathBuf,
    pub audio: PathBuf,
    pub subtitles: PathBuf,
    pub output: PathBuf,
    /// Length of the audio track
    pub duration_ms: u64,
}

/// Escape a path for use inside a quoted filter argument
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// `force_style` for the subtitles filter
pub fn subtitle_force_style(style: &VideoStyle) -> String {
    format!(
        "FontSize={},FontName=Arial,PrimaryColour={},OutlineColour=&H00000000,\
         BackColour=&H80000000,Outline={},Shadow=2,MarginV={},Bold=1",
        style.font_size,
        style.text.ass(),
        style.subtitle_outline,
        style.subtitle_margin_v,
    )
}

/// Filter graph and the label of its final video pad.
pub fn build_filter_graph(style: &VideoStyle, subtitles: &Path) -> (String, String) {
    let res = style.resolution;
    let mut filters = vec![format!(
        "[0:v]scale={}:{},setsar=1[bg]",
        res.width, res.height
    )];
    let mut label = "bg";

    if style.waveform {
        filters.push(format!(
            "[1:a]showwaves=s={}x{WAVEFORM_HEIGHT}:mode=cline:rate=30:colors=0x{}@0.7:scale=sqrt[wave]",
            res.width,
            style.accent.hex(),
        ));
        filters.push(format!("[{label}][wave]overlay=0:H-{WAVEFORM_OFFSET}[waved]"));
        label = "waved";
    }

    if style.subtitles {
        filters.push(format!(
            "[{label}]subtitles='{}':force_style='{}'[subbed]",
            escape_filter_path(subtitles),
            subtitle_force_style(style),
        ));
        label = "subbed";
    }

    (filters.join(";"), format!("[{label}]"))
}

/// Full ffmpeg argument list for `request` under `plan`.
pub fn build_args(plan: &EpisodePlan, request: &CompositionRequest) -> Vec<String> {
    let style = plan.video();
    let (graph, video_label) = build_filter_graph(style, &request.subtitles);
    let limit_ms = request.duration_ms + 1000;

    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y", "-loop", "1", "-i"]
        .iter()
        .map(ToString::to_string)
        .collect();
    args.push(request.background.to_string_lossy().into_owned());
    args.push("-i".to_string());
    args.push(request.audio.to_string_lossy().into_owned());

    args.push("-filter_complex".to_string());
    args.push(graph);
    args.extend(["-map".to_string(), video_label, "-map".to_string(), "1:a".to_string()]);

    args.extend(
        [
            "-c:v",
            "libx264",
            "-tune",
            "stillimage",
            "-c:a",
            "aac",
            "-b:a",
            style.audio_bitrate.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-shortest",
            "-t",
        ]
        .iter()
        .map(ToString::to_string),
    );
    args.push(format!("{}.{:03}", limit_ms / 1000, limit_ms % 1000));
    args.push(request.output.to_string_lossy().into_owned());
    args
}

/// Produces the final video
#[async_trait]
pub trait MediaComposer: Send + Sync {
    async fn compose(
        &self,
        plan: &EpisodePlan,
        request: &CompositionRequest,
    ) -> Result<(), VideoCompositionError>;
}

/// Runs the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegComposer {
    ffmpeg_path: String,
}

impl Default for FfmpegComposer {
    fn default() -> Self {
        let ffmpeg_path = std::env::var(FFMPEG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| {
                which::which("ffmpeg").map_or_else(
                    |_| "ffmpeg".to_string(),
                    |p| p.to_string_lossy().to_string(),
                )
            });
        Self { ffmpeg_path }
    }
}

impl FfmpegComposer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.ffmpeg_path
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[async_trait]
impl MediaComposer for FfmpegComposer {
    async fn compose(
        &self,
        plan: &EpisodePlan,
        request: &CompositionRequest,
    ) -> Result<(), VideoCompositionError> {
        let mut inputs = vec![&request.background, &request.audio];
        if plan.video().subtitles {
            inputs.push(&request.subtitles);
        }
        if let Some(missing) = inputs.into_iter().find(|p| !p.exists()) {
            return Err(VideoCompositionError::MissingInput(missing.clone()));
        }

        let args = build_args(plan, request);
        debug!("ffmpeg args: {:?}", args);

        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VideoCompositionError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        // Dropping the child on timeout or cancellation kills ffmpeg
        let timeout = plan.config.composition_timeout;
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| VideoCompositionError::TimedOut {
                secs: timeout.as_secs(),
            })?
            .map_err(|source| VideoCompositionError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VideoCompositionError::Failed {
                status: output.status.to_string(),
                diagnostics: tail_lines(&String::from_utf8_lossy(&output.stderr), DIAGNOSTIC_LINES),
            });
        }

        info!(output = %request.output.display(), "video composed");
        Ok(())
    }
}
