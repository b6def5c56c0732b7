//! Abalone prediction service
//!
//! Loads the trained artifact pair and serves ring-count predictions over HTTP.

use abalone_core::{ServiceMetrics, StructuredLogger};
use abalone_service::{api, config::ServiceConfig, context::ModelContext};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting abalone-service");

    let config = ServiceConfig::load().context("failed to load service configuration")?;
    info!(
        port = config.port,
        model_path = %config.model_path.display(),
        preprocessor_path = %config.preprocessor_path.display(),
        "Service configured"
    );

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new("prediction-service");
    logger.log_startup(SERVICE_VERSION, config.port);

    let context = ModelContext::load(&config.model_path, &config.preprocessor_path, metrics.clone());
    let app_state = Arc::new(api::AppState::new(context, metrics));

    api::serve(
        config.port,
        app_state,
        api::shutdown_signal(tokio::signal::ctrl_c(), logger),
    )
    .await?;

    info!("Shutting down");
    Ok(())
}
