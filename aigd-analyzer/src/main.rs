//! AI-generated content detector (aigd-analyzer) - Main entry point
//!
//! Serves `POST /analyze` for text, audio and image uploads backed by ONNX
//! classifiers, plus `/status`, `/test` and `/health`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aigd_analyzer::config::{Args, Config};
use aigd_analyzer::dispatcher::Dispatcher;
use aigd_analyzer::registry::{ModelRegistry, OnnxModelLoader};
use aigd_analyzer::{build_router, AppState};

const DEFAULT_LOG_FILTER: &str = "aigd_analyzer=info,tower_http=info";

fn init_tracing(config_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_level.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is resolved before tracing so logging.level can apply
    let config = Config::resolve(&args).context("Failed to resolve configuration")?;
    init_tracing(config.log_level.as_deref());

    info!(
        "Starting aigd-analyzer v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    config.log_summary();

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.upload_dir.display()
        )
    })?;

    let registry = Arc::new(ModelRegistry::new(OnnxModelLoader::new(config.models.clone())));
    let preload_registry = registry.clone();
    let status = tokio::task::spawn_blocking(move || preload_registry.preload())
        .await
        .context("Model preload task failed")?;
    if !(status.text || status.audio || status.image) {
        warn!("No models loaded; /analyze will answer 503 until artifacts are in place");
    }

    let state = AppState::new(Dispatcher::new(registry, config.upload_dir.clone()));
    let app = build_router(state, config.max_upload_bytes);

    info!("Starting HTTP server on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
