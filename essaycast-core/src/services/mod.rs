//! External capabilities consumed by the pipeline.
//!
//! Each generative back-end sits behind a small async trait so the
//! orchestrator can be driven by real HTTP clients in production and by
//! in-memory fakes in tests.

pub mod ffmpeg;
pub mod openai;
pub mod research;
pub mod speech;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::language::LanguageDescriptor;
use crate::pipeline::request::{ImageModel, TextModel};
use crate::pipeline::timeline::TimedClip;

#[derive(Debug, Error)]
/// All errors a capability back-end can return.
pub enum ServiceError {
    /// I/O Error
    #[error("I/O error {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The remote API answered 2xx but the body was not what we expected.
    #[error("{service} returned an unexpected response: {detail}")]
    MalformedResponse {
        service: &'static str,
        detail: String,
    },

    #[error("FFmpeg service error {0}")]
    FFmpegError(#[from] ffmpeg::FFmpegServiceError),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thread join error {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// Inputs for one essay generation call.
#[derive(Debug, Clone)]
pub struct EssayRequest<'a> {
    pub topic: &'a str,
    pub target_word_count: u32,
    pub model: TextModel,
    pub language: LanguageDescriptor,
    /// Background notes from the research back-end, if any were gathered.
    pub research: Option<&'a str>,
}

/// Narration written to disk and its measured length.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechTrack {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Everything a compositor needs to produce one video.
#[derive(Debug, Clone)]
pub struct CompositionSpec {
    /// Contiguous, position-ordered clips covering `[0, duration_secs]`.
    pub clips: Vec<TimedClip>,
    pub audio: SpeechTrack,
    pub fps: u32,
    pub frame_size: u32,
    pub output: PathBuf,
}

/// Text completion: essays and per-portion image descriptions.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn essay(&self, request: EssayRequest<'_>) -> Result<String, ServiceError>;

    async fn image_prompt(
        &self,
        portion: &str,
        language: LanguageDescriptor,
    ) -> Result<String, ServiceError>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Synthesize `text` into `output_dir` and report the track duration.
    async fn synthesize(
        &self,
        text: &str,
        language_code: &str,
        output_dir: &Path,
    ) -> Result<SpeechTrack, ServiceError>;
}

/// Text-to-image.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Render `prompt` and store it as `image_{index}.png` in `output_dir`.
    async fn render(
        &self,
        prompt: &str,
        model: ImageModel,
        index: usize,
        output_dir: &Path,
    ) -> Result<PathBuf, ServiceError>;
}

/// Encodes timed still images plus a narration track into a video file.
#[async_trait]
pub trait VideoCompositor: Send + Sync {
    async fn compose(&self, spec: CompositionSpec) -> Result<PathBuf, ServiceError>;
}

/// Web research used to ground essays in current information.
#[async_trait]
pub trait ResearchService: Send + Sync {
    async fn research(
        &self,
        topic: &str,
        language: LanguageDescriptor,
    ) -> Result<String, ServiceError>;
}

/// The set of back-ends one orchestrator drives.
#[derive(Clone)]
pub struct Services {
    pub content: Arc<dyn ContentService>,
    pub speech: Arc<dyn SpeechService>,
    pub images: Arc<dyn ImageService>,
    pub compositor: Arc<dyn VideoCompositor>,
    /// `None` disables web research regardless of the request flag.
    pub research: Option<Arc<dyn ResearchService>>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("research", &self.research.is_some())
            .finish_non_exhaustive()
    }
}

/// Turn a non-2xx response into [`ServiceError::Api`], keeping a truncated
/// body for diagnostics.
pub(crate) async fn ensure_success(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Api {
        service,
        status: status.as_u16(),
        body: body.chars().take(512).collect(),
    })
}
