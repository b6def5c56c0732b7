//! HTTP API for age prediction, readiness and Prometheus metrics

use crate::context::ModelContext;
use abalone_core::{predict_one, Cell, RawFrame, ServiceMetrics, StructuredLogger, CATEGORICAL_FEATURE};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Request field names mapped to dataset column names
pub const COLUMN_NAME_MAPPING: &[(&str, &str)] = &[
    ("Whole_weight", "Whole weight"),
    ("Shucked_weight", "Shucked weight"),
    ("Viscera_weight", "Viscera weight"),
    ("Shell_weight", "Shell weight"),
];

/// Shared application state
pub struct AppState {
    pub context: ModelContext,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(context: ModelContext, metrics: ServiceMetrics) -> Self {
        Self {
            context,
            metrics,
            logger: StructuredLogger::new("prediction-service"),
        }
    }
}

/// Body of `POST /predict`
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionInput {
    #[serde(rename = "Length")]
    pub length: f64,
    #[serde(rename = "Diameter")]
    pub diameter: f64,
    #[serde(rename = "Height")]
    pub height: f64,
    #[serde(rename = "Whole_weight")]
    pub whole_weight: f64,
    #[serde(rename = "Shucked_weight")]
    pub shucked_weight: f64,
    #[serde(rename = "Viscera_weight")]
    pub viscera_weight: f64,
    #[serde(rename = "Shell_weight")]
    pub shell_weight: f64,
    #[serde(rename = "Sex")]
    pub sex: String,
}

impl PredictionInput {
    /// One-row frame keyed by dataset column names
    pub fn to_frame(&self) -> RawFrame {
        let mut frame = RawFrame::from_record([
            ("Length", Cell::from(self.length)),
            ("Diameter", Cell::from(self.diameter)),
            ("Height", Cell::from(self.height)),
            ("Whole_weight", Cell::from(self.whole_weight)),
            ("Shucked_weight", Cell::from(self.shucked_weight)),
            ("Viscera_weight", Cell::from(self.viscera_weight)),
            ("Shell_weight", Cell::from(self.shell_weight)),
            (CATEGORICAL_FEATURE, Cell::from(self.sex.as_str())),
        ]);
        frame.rename_columns(COLUMN_NAME_MAPPING);
        frame
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionOutput {
    pub predicted_rings: f64,
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

async fn root() -> impl IntoResponse {
    Json(json!({ "health_check": "App up and running!" }))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictionInput>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(input) => input,
        Err(rejection) => {
            state.metrics.inc_prediction_errors("validation");
            state
                .logger
                .log_prediction_failed("validation", &rejection.body_text());
            return detail(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text());
        }
    };

    let start = Instant::now();
    let artifacts = state.context.current().await;
    let record = input.to_frame();

    match predict_one(&record, artifacts.as_deref()) {
        Ok(predicted_rings) => {
            let elapsed = start.elapsed();
            state.metrics.observe_prediction_latency(elapsed.as_secs_f64());
            state.metrics.inc_predictions();
            let run_id = artifacts.as_ref().map(|a| a.run_id()).unwrap_or_default();
            state
                .logger
                .log_prediction(run_id, predicted_rings, elapsed.as_micros());
            (StatusCode::CREATED, Json(PredictionOutput { predicted_rings })).into_response()
        }
        Err(e) => {
            state.metrics.inc_prediction_errors(e.kind.as_str());
            state.logger.log_prediction_failed(e.kind.as_str(), &e.message);
            detail(StatusCode::BAD_REQUEST, e.message)
        }
    }
}

/// Readiness: 200 once an artifact pair is loaded, 503 otherwise
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.context.status().await;
    let status_code = if status.loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(status))
}

async fn reload(State(state): State<Arc<AppState>>) -> Response {
    match state.context.reload().await {
        Ok(loaded) => (
            StatusCode::OK,
            Json(json!({ "loaded": true, "run_id": loaded.run_id() })),
        )
            .into_response(),
        Err(e) => detail(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/readyz", get(readyz))
        .route("/reload", post(reload))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Resolve once `signal` fires.
///
/// A signal listener that fails to install never resolves, so the server keeps
/// running instead of shutting down right after start.
pub async fn shutdown_signal<F>(signal: F, logger: StructuredLogger)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => logger.log_shutdown("SIGINT received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> PredictionInput {
        PredictionInput {
            length: 0.455,
            diameter: 0.365,
            height: 0.095,
            whole_weight: 0.514,
            shucked_weight: 0.2245,
            viscera_weight: 0.101,
            shell_weight: 0.15,
            sex: "M".to_string(),
        }
    }

    #[test]
    fn test_to_frame_uses_dataset_column_names() {
        let frame = sample_input().to_frame();
        assert_eq!(frame.len(), 1);
        assert!(frame.missing_columns(&abalone_core::NUMERIC_FEATURES).is_empty());
        assert!(frame.column_index("Whole_weight").is_none());
        assert!(frame.column_index("Sex").is_some());
    }

    #[tokio::test]
    async fn test_shutdown_signal_resolves_on_signal() {
        let logger = StructuredLogger::new("test");
        let fired = shutdown_signal(async { Ok(()) }, logger);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(100), fired)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_shutdown_signal_waits_when_listener_fails() {
        let logger = StructuredLogger::new("test");
        let failing = shutdown_signal(
            async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal driver")) },
            logger,
        );
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(100), failing)
                .await
                .is_err()
        );
    }

    #[test]
    fn test_input_rejects_missing_field() {
        let body = r#"{"Length":0.4,"Diameter":0.3,"Height":0.1,"Whole_weight":0.5,
            "Shucked_weight":0.2,"Viscera_weight":0.1,"Sex":"F"}"#;
        assert!(serde_json::from_str::<PredictionInput>(body).is_err());
    }
}
