//! essaycast-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON or plain, optional rolling file).
//! 3. Make sure an FFmpeg binary is available.
//! 4. Build the generation back-ends and start the orchestrator.
//! 5. Build the Axum router and serve it with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use essaycast_core::Orchestrator;
use essaycast_core::services::Services;
use essaycast_core::services::ffmpeg::{self, FfmpegCompositor};
use essaycast_core::services::openai::OpenAiClient;
use essaycast_core::services::research::DuckDuckGoResearch;
use essaycast_core::services::speech::{GoogleTranslateSpeech, OpenAiSpeech};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, SpeechBackend};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "essaycast-server starting");

    // ── 3. FFmpeg ──────────────────────────────────────────────────────────────
    if cfg.download_ffmpeg {
        ffmpeg::ensure_ffmpeg()
            .await
            .context("FFmpeg is required to compose videos")?;
    }

    // ── 4. Back-ends and orchestrator ──────────────────────────────────────────
    let services = build_services(&cfg)?;
    info!(
        speech = ?cfg.speech_backend,
        web_search = cfg.web_search,
        output_dir = %cfg.output_dir.display(),
        "generation back-ends ready"
    );
    tokio::fs::create_dir_all(&cfg.output_dir).await?;
    let orchestrator = Orchestrator::start(services, cfg.core_config());

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        orchestrator,
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("essaycast-server stopped");
    Ok(())
}

/// Install the global subscriber. The returned guard flushes the log file on
/// drop and must live as long as `main`.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: ESSAYCAST_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let json_layer = cfg.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
    });
    let plain_layer = (!cfg.log_json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
    });

    let (file_layer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "essaycast-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(plain_layer)
        .with(file_layer)
        .init();
    guard
}

fn build_services(cfg: &Config) -> anyhow::Result<Services> {
    let api_key = cfg
        .openai_api_key
        .clone()
        .context("set OPENAI_API_KEY (or ESSAYCAST_OPENAI_API_KEY)")?;
    let openai = Arc::new(OpenAiClient::with_base_url(
        api_key.clone(),
        cfg.openai_base_url.clone(),
    ));

    let speech: Arc<dyn essaycast_core::services::SpeechService> = match cfg.speech_backend {
        SpeechBackend::Google => Arc::new(GoogleTranslateSpeech::new()),
        SpeechBackend::OpenAi => Arc::new(OpenAiSpeech::new(api_key, cfg.openai_base_url.clone())),
    };
    let research = if cfg.web_search {
        Some(Arc::new(DuckDuckGoResearch::new()) as Arc<dyn essaycast_core::services::ResearchService>)
    } else {
        warn!("web search disabled; essays rely on model knowledge only");
        None
    };

    Ok(Services {
        content: openai.clone(),
        speech,
        images: openai,
        compositor: Arc::new(FfmpegCompositor::new()),
        research,
    })
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
