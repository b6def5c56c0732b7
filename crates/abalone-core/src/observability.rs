//! Observability infrastructure
//!
//! Provides:
//! - Prometheus metrics for the prediction service (latency, counts, errors,
//!   loaded model run)
//! - Structured logging of training, prediction and artifact events with
//!   tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for single-record inference latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounterVec,
    artifacts_loaded: IntGauge,
    model_run_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "abalone_prediction_latency_seconds",
                "Time spent preprocessing and predicting a single record",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "abalone_predictions_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "abalone_prediction_errors_total",
                "Total number of failed predictions by failure kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            artifacts_loaded: register_int_gauge!(
                "abalone_artifacts_loaded",
                "Whether a model/preprocessor pair is loaded (1) or not (0)"
            )
            .expect("Failed to register artifacts_loaded"),

            model_run_info: register_gauge_vec!(
                "abalone_model_run_info",
                "Training run of the currently loaded model",
                &["run_id"]
            )
            .expect("Failed to register model_run_info"),
        }
    }
}

/// Prediction service metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a metrics handle (registers the global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record the loaded run, or clear it when nothing is loaded
    pub fn set_loaded_run(&self, run_id: Option<&str>) {
        let inner = self.inner();
        inner.model_run_info.reset();
        match run_id {
            Some(run_id) => {
                inner.artifacts_loaded.set(1);
                inner.model_run_info.with_label_values(&[run_id]).set(1.0);
            }
            None => inner.artifacts_loaded.set(0),
        }
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Log a finished training run
    pub fn log_training_completed(
        &self,
        run_id: &str,
        rmse: f64,
        r2: f64,
        n_train: usize,
        n_test: usize,
        n_features: usize,
    ) {
        info!(
            event = "training_completed",
            component = %self.component,
            run_id = %run_id,
            rmse = rmse,
            r2 = r2,
            n_train = n_train,
            n_test = n_test,
            n_features = n_features,
            "Model trained and evaluated"
        );
    }

    /// Log a batch prediction run
    pub fn log_batch_prediction(&self, run_id: &str, rows: usize, output: Option<&str>) {
        info!(
            event = "batch_prediction_completed",
            component = %self.component,
            run_id = %run_id,
            rows = rows,
            output = ?output,
            "Batch prediction completed"
        );
    }

    /// Log a single served prediction
    pub fn log_prediction(&self, run_id: &str, predicted_rings: f64, latency_us: u128) {
        info!(
            event = "prediction_generated",
            component = %self.component,
            run_id = %run_id,
            predicted_rings = predicted_rings,
            latency_us = latency_us as u64,
            "Generated ring count prediction"
        );
    }

    /// Log a rejected single prediction
    pub fn log_prediction_failed(&self, kind: &str, detail: &str) {
        warn!(
            event = "prediction_failed",
            component = %self.component,
            kind = %kind,
            detail = %detail,
            "Prediction request rejected"
        );
    }

    pub fn log_artifacts_loaded(&self, run_id: &str, model_path: &str, preprocessor_path: &str) {
        info!(
            event = "artifacts_loaded",
            component = %self.component,
            run_id = %run_id,
            model_path = %model_path,
            preprocessor_path = %preprocessor_path,
            "Model and preprocessor loaded"
        );
    }

    pub fn log_artifacts_unavailable(&self, reason: &str) {
        error!(
            event = "artifacts_unavailable",
            component = %self.component,
            reason = %reason,
            "Model or preprocessor could not be loaded, predictions disabled"
        );
    }

    pub fn log_task_started(&self, task: &str, attempt: u32) {
        info!(
            event = "task_started",
            component = %self.component,
            task = %task,
            attempt = attempt,
            "Task started"
        );
    }

    pub fn log_task_retry(&self, task: &str, attempt: u32, delay_secs: f64, error: &str) {
        warn!(
            event = "task_retry",
            component = %self.component,
            task = %task,
            attempt = attempt,
            delay_secs = delay_secs,
            error = %error,
            "Task failed, retrying after delay"
        );
    }

    pub fn log_task_failed(&self, task: &str, attempts: u32, error: &str) {
        error!(
            event = "task_failed",
            component = %self.component,
            task = %task,
            attempts = attempts,
            error = %error,
            "Task failed"
        );
    }

    pub fn log_task_completed(&self, task: &str, attempts: u32, elapsed_ms: u128) {
        info!(
            event = "task_completed",
            component = %self.component,
            task = %task,
            attempts = attempts,
            elapsed_ms = elapsed_ms as u64,
            "Task completed"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "service_started",
            component = %self.component,
            version = %version,
            port = port,
            "Prediction service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            component = %self.component,
            reason = %reason,
            "Prediction service shutting down"
        );
    }
}
