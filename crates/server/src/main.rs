use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cadence_core::{
    load_config, validate_config, HttpFinalizeStage, HttpPartialProcessor, LogFormat,
    SessionOrchestrator, StatusCallback, StatusSnapshot,
};
use cadence_server::api::{create_router, WsBroadcaster};
use cadence_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // config errors happen before logging is configured
        let _ = init_logging(LogFormat::Pretty);
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config_path = std::env::var("CADENCE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(config.logging.format).context("Failed to initialize logging")?;
    info!("Configuration loaded from {:?}", config_path);

    // Worker stages
    let processor = HttpPartialProcessor::from_config(&config.stages)
        .context("Partial worker is not configured (stages.partial_url)")?;
    let finalizer = HttpFinalizeStage::from_config(&config.stages)
        .context("Finalize worker is not configured (stages.finalize_url)")?;
    info!(
        timeout_secs = config.stages.timeout_secs,
        "Worker stages initialized"
    );

    // Snapshots fan out to WebSocket clients
    let ws_broadcaster = WsBroadcaster::default();
    let callback: StatusCallback = {
        let broadcaster = ws_broadcaster.clone();
        Arc::new(move |snapshot: &StatusSnapshot| broadcaster.status(snapshot))
    };

    let orchestrator = SessionOrchestrator::new(
        config.orchestrator.clone(),
        Arc::new(processor),
        Arc::new(finalizer),
    )
    .with_status_callback(callback)
    .spawn();

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, orchestrator.clone(), ws_broadcaster));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped, shutting down orchestrator");
    if let Err(e) = orchestrator.shutdown().await {
        error!("Orchestrator shutdown failed: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
