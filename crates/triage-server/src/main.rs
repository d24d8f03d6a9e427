//! triage-server - signal triage backend
//!
//! Review API over HTTP with the triage loop running in the background.

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use triage_core::Pipeline;

mod config;
mod middleware;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("triage_server=info".parse()?))
        .init();

    info!("triage-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load()?;
    info!("Config loaded from {:?}", config.config_path);

    let pipeline = Pipeline::from_config(config.triage.clone())?;
    let bind = config.bind;
    let autostart = config.autostart_monitoring;
    if config.api_token.is_none() {
        warn!("No API token configured; /api routes are unauthenticated");
    }

    let state = state::AppState::new(config, pipeline);

    if autostart {
        state.monitoring.start(None).await?;
    }

    let app = routes::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "Server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.monitoring.stop().await;
    info!("Shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
