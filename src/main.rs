use anyhow::Result;
use solar_forecast::{api, config::Config, service::AppState, telemetry};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    let _log_guard = telemetry::init_tracing(&cfg.logging, &cfg.storage.log_dir())?;

    let state = AppState::from_config(cfg.clone())?;
    let app = api::router(state.clone());

    let addr = cfg.server.socket_addr()?;
    info!(%addr, "starting solar forecast service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    let saver = state.clone();
    match tokio::task::spawn_blocking(move || saver.save_model()).await? {
        Ok(path) => info!(path = %path.display(), "model persisted"),
        Err(e) => error!(error = %e, "failed to persist model on shutdown"),
    }

    warn!("shutdown complete");
    Ok(())
}
