//! Workflow tasks
//!
//! A [`Task`] is a named unit of work with an optional bounded retry policy
//! (fixed attempt count, fixed delay). Training runs as a single attempt: a
//! failed training run is a hard stop. Batch prediction is retried.

use crate::artifacts::{write_json_atomic, LoadedArtifacts};
use crate::error::Result;
use crate::observability::StructuredLogger;
use crate::predicting::predict_file;
use crate::training::{train, TrainOptions, TrainingReport};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Directory used when no artifacts directory is given
pub const DEFAULT_ARTIFACTS_DIR: &str = "local_objects";

/// File written next to the artifacts after a training workflow
pub const METRICS_FILE_NAME: &str = "training-metrics.json";

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

impl Default for RetryPolicy {
    /// One retry after 30 seconds
    fn default() -> Self {
        Self::new(1, Duration::from_secs(30))
    }
}

/// Named unit of work
#[derive(Clone)]
pub struct Task {
    name: String,
    policy: RetryPolicy,
    logger: StructuredLogger,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: RetryPolicy::none(),
            logger: StructuredLogger::new("workflow"),
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `work` until it succeeds or the retry budget is spent.
    ///
    /// The error of the last attempt is returned unchanged.
    pub fn run<T, E, F>(&self, mut work: F) -> std::result::Result<T, E>
    where
        E: Display,
        F: FnMut() -> std::result::Result<T, E>,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_retries + 1;
        let mut attempt = 1;

        loop {
            self.logger.log_task_started(&self.name, attempt);
            match work() {
                Ok(value) => {
                    self.logger
                        .log_task_completed(&self.name, attempt, started.elapsed().as_millis());
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts => {
                    self.logger.log_task_retry(
                        &self.name,
                        attempt,
                        self.policy.delay.as_secs_f64(),
                        &e.to_string(),
                    );
                    std::thread::sleep(self.policy.delay);
                    attempt += 1;
                }
                Err(e) => {
                    self.logger
                        .log_task_failed(&self.name, attempt, &e.to_string());
                    return Err(e);
                }
            }
        }
    }
}

/// Result of [`train_model_workflow`]
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    #[serde(flatten)]
    pub report: TrainingReport,
    pub metrics_path: PathBuf,
}

#[derive(Serialize)]
struct MetricRow {
    metric: &'static str,
    value: f64,
}

/// Train once (no retry) and record the evaluation metrics
pub fn train_model_workflow(
    data_path: &Path,
    artifacts_dir: Option<&Path>,
    test_fraction: f64,
    random_seed: u64,
) -> Result<WorkflowSummary> {
    let artifacts_dir = artifacts_dir.unwrap_or_else(|| Path::new(DEFAULT_ARTIFACTS_DIR));
    let options = TrainOptions::in_dir(artifacts_dir).with_split(test_fraction, random_seed);

    let report = Task::new("train-model").run(|| train(data_path, &options))?;

    let logger = StructuredLogger::new("workflow");
    logger.log_training_completed(
        &report.run_id,
        report.rmse,
        report.r2,
        report.n_train,
        report.n_test,
        report.n_features,
    );

    let metrics_path = artifacts_dir.join(METRICS_FILE_NAME);
    let table = [
        MetricRow {
            metric: "rmse",
            value: report.rmse,
        },
        MetricRow {
            metric: "r2",
            value: report.r2,
        },
    ];
    write_json_atomic(&metrics_path, &table)?;

    Ok(WorkflowSummary {
        report,
        metrics_path,
    })
}

/// Load the artifact pair and predict every row of `input_path`, retrying
/// the whole unit according to `policy`
pub fn predict_flow(
    input_path: &Path,
    model_path: &Path,
    preprocessor_path: &Path,
    output_path: Option<&Path>,
    policy: RetryPolicy,
) -> Result<Vec<f64>> {
    let (run_id, predictions) = Task::new("batch-predict")
        .with_retry(policy)
        .run(|| {
            let artifacts = LoadedArtifacts::load(model_path, preprocessor_path)?;
            let predictions = predict_file(input_path, &artifacts, output_path)?;
            Ok::<_, crate::error::PipelineError>((artifacts.run_id().to_string(), predictions))
        })?;

    StructuredLogger::new("workflow").log_batch_prediction(
        &run_id,
        predictions.len(),
        output_path.map(|p| p.to_string_lossy()).as_deref(),
    );
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.delay, Duration::from_secs(30));
    }

    #[test]
    fn test_task_without_retry_runs_once() {
        let calls = Cell::new(0);
        let result: std::result::Result<(), String> = Task::new("once").run(|| {
            calls.set(calls.get() + 1);
            Err("boom".to_string())
        });
        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_task_retries_until_success() {
        let calls = Cell::new(0);
        let result = Task::new("flaky")
            .with_retry(RetryPolicy::new(3, Duration::ZERO))
            .run(|| {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("not yet")
                } else {
                    Ok(calls.get())
                }
            });
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_task_gives_up_after_budget() {
        let calls = Cell::new(0);
        let result: std::result::Result<(), &str> = Task::new("broken")
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
            .run(|| {
                calls.set(calls.get() + 1);
                Err("still broken")
            });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_task_waits_between_attempts() {
        let started = Instant::now();
        let _: std::result::Result<(), &str> = Task::new("slow")
            .with_retry(RetryPolicy::new(1, Duration::from_millis(20)))
            .run(|| Err("fail"));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_predict_flow_without_artifacts_fails_after_retries() {
        let dir = TempDir::new().unwrap();
        let err = predict_flow(
            &dir.path().join("input.csv"),
            &dir.path().join("model.json"),
            &dir.path().join("preprocessor.json"),
            None,
            RetryPolicy::new(1, Duration::ZERO),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
    }

    #[test]
    fn test_train_workflow_missing_dataset_is_hard_stop() {
        let dir = TempDir::new().unwrap();
        let err = train_model_workflow(
            &dir.path().join("missing.csv"),
            Some(dir.path()),
            0.2,
            42,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::DataLoad(_)));
        assert!(!dir.path().join(METRICS_FILE_NAME).exists());
    }
}
