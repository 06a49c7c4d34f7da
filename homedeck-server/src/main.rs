//! homedeck-server - Home server console backend
//!
//! Serves the dashboard API: acquisition jobs with a live SSE log channel,
//! a sandboxed file browser, the music catalog and streaming, the service
//! registry and host statistics.

use anyhow::{Context, Result};
use clap::Parser;
use homedeck_common::config::{load_or_default, ConfigSource};
use homedeck_common::events::EventBus;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homedeck_server::config::{Args, ServerConfig};
use homedeck_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log level
    let (toml_config, config_source) =
        load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    let config = ServerConfig::resolve(&args, toml_config).context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("homedeck_server={0},homedeck_common={0},tower_http=info", config.log_level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting homedeck-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_source {
        ConfigSource::File(path) => info!("Config: {}", path.display()),
        ConfigSource::Defaults(Some(path)) => {
            warn!("Config file {} not found, using defaults", path.display())
        }
        ConfigSource::Defaults(None) => {
            warn!("No config directory available, using defaults")
        }
    }

    match &config.media_root {
        Some(root) => info!("Media root: {}", root.display()),
        None => warn!("No media root configured: acquisition and music catalog are disabled"),
    }
    match &config.browse_root {
        Some(root) => info!("Browse root: {}", root.display()),
        None => warn!("No browse root configured: file browser is disabled"),
    }
    info!("Service registry: {}", config.services_file.display());
    if let Some(timeout) = config.acquisition_timeout {
        info!("Acquisition timeout: {}s", timeout.as_secs());
    }

    let event_bus = EventBus::new(config.event_capacity);
    info!("Event bus initialized (capacity {})", event_bus.capacity());

    let listen_addr = config.listen_addr;
    let state = AppState::new(config, event_bus).context("Failed to initialize application state")?;
    let app = homedeck_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_addr))?;
    info!("Listening on http://{}", listen_addr);
    info!("Health check: http://{}/health", listen_addr);

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
            error!("Failed to listen for Ctrl+C: {}", e);
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
