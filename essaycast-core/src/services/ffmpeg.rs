use async_trait::async_trait;
use ffmpeg_sidecar::{
    command::FfmpegCommand,
    event::{FfmpegEvent, LogLevel},
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::services::{CompositionSpec, ServiceError, VideoCompositor};

/// Error lines kept for the failure message when FFmpeg exits non-zero.
const ERROR_TAIL: usize = 5;

#[derive(Debug, Error)]
pub enum FFmpegServiceError {
    #[error("path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("failed to run ffmpeg: {0}")]
    Spawn(String),

    #[error("ffmpeg exited with {status}: {detail}")]
    Failed { status: String, detail: String },

    #[error("could not determine duration of {}", .0.display())]
    UnknownDuration(PathBuf),

    #[error("nothing to compose")]
    EmptyTimeline,

    #[error("ffmpeg download failed: {0}")]
    Download(String),
}

fn path_str(path: &Path) -> Result<String, FFmpegServiceError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| FFmpegServiceError::InvalidPath(path.to_path_buf()))
}

/// Outcome of one FFmpeg invocation.
struct RunReport {
    duration: Option<f64>,
}

/// Run FFmpeg with `command`, logging its output, and fail on non-zero exit.
fn run(mut command: FfmpegCommand) -> Result<RunReport, FFmpegServiceError> {
    let mut child = command
        .spawn()
        .map_err(|e| FFmpegServiceError::Spawn(e.to_string()))?;

    let mut report = RunReport { duration: None };
    let mut errors: Vec<String> = Vec::new();

    for event in child
        .iter()
        .map_err(|e| FFmpegServiceError::Spawn(e.to_string()))?
    {
        match event {
            FfmpegEvent::ParsedDuration(d) => report.duration = Some(d.duration),
            FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                error!("[FFmpeg] {}", msg);
                errors.push(msg);
            }
            FfmpegEvent::Log(level, msg) => debug!("[FFmpeg {:?}] {}", level, msg),
            FfmpegEvent::Error(e) => {
                warn!("FFmpeg error: {}", e);
                errors.push(e);
            }
            FfmpegEvent::Done => debug!("FFmpeg finished"),
            _ => {}
        }
    }

    let status = child
        .wait()
        .map_err(|e| FFmpegServiceError::Spawn(e.to_string()))?;
    if !status.success() {
        let tail = errors.len().saturating_sub(ERROR_TAIL);
        return Err(FFmpegServiceError::Failed {
            status: status.to_string(),
            detail: errors[tail..].join("; "),
        });
    }
    Ok(report)
}

/// Measure a media file's duration in seconds.
pub async fn probe_duration(path: &Path) -> Result<f64, ServiceError> {
    let path = path.to_path_buf();
    let input = path_str(&path)?;

    let duration = task::spawn_blocking(move || -> Result<f64, FFmpegServiceError> {
        let mut command = FfmpegCommand::new();
        command
            .hide_banner()
            .input(&input)
            .args(["-f", "null"])
            .output("-");
        run(command)?
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or(FFmpegServiceError::UnknownDuration(path))
    })
    .await??;

    Ok(duration)
}

/// Download an FFmpeg binary next to the executable if none is on `PATH`.
pub async fn ensure_ffmpeg() -> Result<(), ServiceError> {
    task::spawn_blocking(|| {
        ffmpeg_sidecar::download::auto_download()
            .map_err(|e| FFmpegServiceError::Download(e.to_string()))
    })
    .await??;
    Ok(())
}

/// Build the FFmpeg argument list (everything except the output path).
///
/// Each clip becomes a looped still input limited to its interval, scaled to
/// fit and centred on a square canvas; the stills are concatenated and the
/// narration is mapped as the only audio stream. `-t` trims the result to the
/// narration length.
pub(crate) fn composition_args(spec: &CompositionSpec) -> Result<Vec<String>, FFmpegServiceError> {
    let clips = &spec.clips;
    if clips.is_empty() {
        return Err(FFmpegServiceError::EmptyTimeline);
    }

    let fps = spec.fps.max(1);
    let size = spec.frame_size;
    let frame = 1.0 / f64::from(fps);
    let short = clips.iter().filter(|c| c.duration() < frame).count();
    if short > 0 {
        warn!(clips = short, "clips shorter than one frame are shown for one frame");
    }
    let mut args: Vec<String> = Vec::new();
    for clip in clips {
        args.extend([
            "-loop".into(),
            "1".into(),
            "-framerate".into(),
            fps.to_string(),
            "-t".into(),
            format!("{:.3}", clip.duration().max(frame)),
            "-i".into(),
            path_str(&clip.image)?,
        ]);
    }
    args.extend(["-i".into(), path_str(&spec.audio.path)?]);

    let mut filter = String::new();
    for i in 0..clips.len() {
        filter.push_str(&format!(
            "[{i}:v]scale={size}:{size}:force_original_aspect_ratio=decrease,\
             pad={size}:{size}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p[v{i}];"
        ));
    }
    for i in 0..clips.len() {
        filter.push_str(&format!("[v{i}]"));
    }
    filter.push_str(&format!("concat=n={}:v=1:a=0[outv]", clips.len()));

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[outv]".into(),
        "-map".into(),
        format!("{}:a", clips.len()),
        "-r".into(),
        fps.to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-t".into(),
        format!("{:.3}", spec.audio.duration_secs),
        "-movflags".into(),
        "+faststart".into(),
    ]);
    Ok(args)
}

/// [`VideoCompositor`] backed by a local FFmpeg binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCompositor;

impl FfmpegCompositor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VideoCompositor for FfmpegCompositor {
    async fn compose(&self, spec: CompositionSpec) -> Result<PathBuf, ServiceError> {
        let args = composition_args(&spec)?;
        let output = spec.output.clone();
        let output_str = path_str(&output)?;
        info!(clips = spec.clips.len(), duration = spec.audio.duration_secs, "creating video");

        task::spawn_blocking(move || -> Result<(), FFmpegServiceError> {
            let mut command = FfmpegCommand::new();
            command
                .hide_banner()
                .overwrite()
                .args(&args)
                .output(&output_str);
            run(command).map(|_| ())
        })
        .await??;

        info!(path = %output.display(), "video saved");
        Ok(output)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pipeline::timeline::TimedClip;
    use crate::services::SpeechTrack;

    fn spec(spans: &[(f64, f64)]) -> CompositionSpec {
        CompositionSpec {
            clips: spans
                .iter()
                .enumerate()
                .map(|(i, (start, end))| TimedClip {
                    image: PathBuf::from(format!("/tmp/job/image_{i}.png")),
                    start: *start,
                    end: *end,
                })
                .collect(),
            audio: SpeechTrack {
                path: PathBuf::from("/tmp/job/speech.mp3"),
                duration_secs: 60.0,
            },
            fps: 24,
            frame_size: 1024,
            output: PathBuf::from("/tmp/job/output.mp4"),
        }
    }

    #[test]
    fn args_loop_each_image_for_its_interval() {
        let args = composition_args(&spec(&[(0.0, 30.0), (30.0, 60.0)])).unwrap();
        let joined = args.join(" ");
        assert!(joined.starts_with("-loop 1 -framerate 24 -t 30.000 -i /tmp/job/image_0.png"));
        assert!(joined.contains("-i /tmp/job/image_1.png -i /tmp/job/speech.mp3"));
        assert!(joined.contains("[v0][v1]concat=n=2:v=1:a=0[outv]"));
        assert!(joined.contains("-map 2:a"));
        assert!(joined.contains("pad=1024:1024:(ow-iw)/2:(oh-ih)/2"));
        assert!(joined.ends_with("-t 60.000 -movflags +faststart"));
    }

    #[test]
    fn zero_length_clips_are_shown_for_one_frame() {
        let args = composition_args(&spec(&[(0.0, 30.0), (30.0, 60.0), (60.0, 60.0)])).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-t 0.042 -i /tmp/job/image_2.png"));
        assert!(joined.contains("[v0][v1][v2]concat=n=3"));
        assert!(joined.contains("-map 3:a"));
        assert!(joined.ends_with("-t 60.000 -movflags +faststart"));
    }

    #[test]
    fn empty_timeline_is_rejected() {
        assert!(matches!(
            composition_args(&spec(&[])),
            Err(FFmpegServiceError::EmptyTimeline)
        ));
    }
}
