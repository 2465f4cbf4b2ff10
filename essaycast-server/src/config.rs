//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Which text-to-speech back-end narrates the essay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechBackend {
    /// Keyless Google Translate TTS.
    Google,
    /// OpenAI `audio/speech`.
    OpenAi,
}

impl std::str::FromStr for SpeechBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gtts" => Ok(SpeechBackend::Google),
            "openai" => Ok(SpeechBackend::OpenAi),
            other => Err(format!("unknown speech backend '{other}'")),
        }
    }
}

/// Runtime configuration for essaycast-server.
///
/// Every field except the OpenAI key has a default so the server starts with
/// only `OPENAI_API_KEY` set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:8000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, also write logs to a daily-rolling file in this directory.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    pub openai_api_key: Option<String>,
    pub openai_base_url: String,

    pub speech_backend: SpeechBackend,

    /// Whether the DuckDuckGo research back-end is available to requests.
    pub web_search: bool,

    /// Root directory for per-task working directories (default: `"output"`).
    pub output_dir: PathBuf,

    /// Orchestrator submission-queue capacity.
    pub queue_capacity: usize,

    /// Images rendered concurrently within one task.
    pub image_concurrency: usize,

    /// Download an FFmpeg binary at startup if none is found.
    pub download_ffmpeg: bool,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let speech = env_or("ESSAYCAST_SPEECH_BACKEND", "google");
        Self {
            bind_address: env_or("ESSAYCAST_BIND", "127.0.0.1:8000"),
            log_level: env_or("ESSAYCAST_LOG", "info"),
            log_json: parse_bool("ESSAYCAST_LOG_JSON", false),
            log_dir: std::env::var("ESSAYCAST_LOG_DIR").ok().map(PathBuf::from),
            cors_allowed_origins: std::env::var("ESSAYCAST_CORS_ORIGINS").ok(),
            openai_api_key: std::env::var("ESSAYCAST_OPENAI_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            openai_base_url: env_or(
                "ESSAYCAST_OPENAI_BASE_URL",
                essaycast_core::services::openai::DEFAULT_BASE_URL,
            ),
            speech_backend: speech.parse().unwrap_or_else(|e| {
                eprintln!("WARN: {e}; falling back to 'google'");
                SpeechBackend::Google
            }),
            web_search: parse_bool("ESSAYCAST_WEB_SEARCH", true),
            output_dir: PathBuf::from(env_or("ESSAYCAST_OUTPUT_DIR", "output")),
            queue_capacity: parse_env("ESSAYCAST_QUEUE_CAPACITY", 64),
            image_concurrency: parse_env("ESSAYCAST_IMAGE_CONCURRENCY", 3),
            download_ffmpeg: parse_bool("ESSAYCAST_DOWNLOAD_FFMPEG", true),
            enable_swagger: parse_bool("ESSAYCAST_ENABLE_SWAGGER", true),
        }
    }

    /// Orchestrator settings derived from this configuration.
    pub fn core_config(&self) -> essaycast_core::Config {
        essaycast_core::Config {
            output_root: self.output_dir.clone(),
            queue_capacity: self.queue_capacity,
            image_concurrency: self.image_concurrency,
            ..essaycast_core::Config::default()
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
