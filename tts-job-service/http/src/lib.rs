use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use tts_job_application::SynthesizeJobUseCase;
use tts_job_configuration::ServerConfig;

pub mod error;
pub mod handlers;

pub use error::{rejection_mapper, HttpError};
pub use handlers::*;

#[derive(Clone)]
pub struct AppState {
    pub usecase: Arc<dyn SynthesizeJobUseCase>,
}

impl AppState {
    pub fn new(usecase: Arc<dyn SynthesizeJobUseCase>) -> Self {
        Self { usecase }
    }
}

pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    // Reference audio travels base64 inside the JSON body.
    let run_route = post(run_job).layer(DefaultBodyLimit::max(config.max_body_bytes));

    Router::new()
        .route("/run", run_route)
        .route("/health", get(health_check))
        .with_state(state)
}

pub async fn serve(router: Router, config: &ServerConfig) -> anyhow::Result<()> {
    let address = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "listening for jobs");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
