use anyhow::{Context, Result};
use lookout_core::Config;
use lookout_store::EnrollmentStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod engine;
mod http;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        uploads = %config.uploads_dir.display(),
        listen = %config.listen_addr,
        "lookoutd starting"
    );

    let store = EnrollmentStore::open(&config.uploads_dir)
        .with_context(|| format!("opening store at {}", config.uploads_dir.display()))?;

    let engine = engine::spawn_engine(
        &config.detector_model_path(),
        &config.recognizer_model_path(),
    )
    .context("loading ONNX models")?;

    let state = Arc::new(http::AppState { engine, store });
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "lookoutd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("lookoutd shutting down");
        })
        .await?;

    Ok(())
}
