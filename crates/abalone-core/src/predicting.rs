//! Batch and single-record inference
//!
//! Both paths run the fitted preprocessor and then the linear model. The
//! single-record path never returns a bare pipeline error: failures are
//! tagged with the stage that produced them so the HTTP layer can turn them
//! into client-facing messages.

use crate::artifacts::LoadedArtifacts;
use crate::dataset::{self, RawFrame};
use crate::error::{PipelineError, Result};
use crate::model::LinearModel;
use crate::preprocessing::PreprocessorState;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Name of the single column written by [`predict_file`]
pub const PREDICTION_COLUMN: &str = "prediction";

/// Stage at which a single-record prediction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictErrorKind {
    /// No artifact pair is loaded
    NotLoaded,
    /// Required input fields are absent
    MissingColumns,
    /// Any other encoding failure
    Preprocessing,
    /// The model itself failed
    Prediction,
}

impl PredictErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictErrorKind::NotLoaded => "not_loaded",
            PredictErrorKind::MissingColumns => "missing_columns",
            PredictErrorKind::Preprocessing => "preprocessing",
            PredictErrorKind::Prediction => "prediction",
        }
    }
}

/// Tagged failure of [`predict_one`]
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct PredictError {
    pub kind: PredictErrorKind,
    pub message: String,
}

impl PredictError {
    fn new(kind: PredictErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_loaded() -> Self {
        Self::new(
            PredictErrorKind::NotLoaded,
            "Model or preprocessor not loaded.",
        )
    }
}

/// Encode `raw` and predict one value per row, preserving row order
pub fn predict_batch(
    raw: &RawFrame,
    model: &LinearModel,
    state: &PreprocessorState,
) -> Result<Vec<f64>> {
    let features = state.apply(raw)?;
    let predictions = model.predict(&features)?;
    debug!(rows = predictions.len(), "Batch predicted");
    Ok(predictions)
}

/// Predict the ring count for a one-row frame
pub fn predict_one(
    record: &RawFrame,
    artifacts: Option<&LoadedArtifacts>,
) -> std::result::Result<f64, PredictError> {
    let artifacts = artifacts.ok_or_else(PredictError::not_loaded)?;

    if record.len() != 1 {
        return Err(PredictError::new(
            PredictErrorKind::Preprocessing,
            format!(
                "Preprocessing failed: expected exactly one record, got {}",
                record.len()
            ),
        ));
    }

    let features = artifacts.state().apply(record).map_err(|e| match e {
        PipelineError::MissingColumn { columns } => PredictError::new(
            PredictErrorKind::MissingColumns,
            format!(
                "Preprocessing failed: Missing columns {:?}. Input columns are: {:?}",
                columns,
                record.columns()
            ),
        ),
        other => PredictError::new(
            PredictErrorKind::Preprocessing,
            format!("Preprocessing failed: {}", other),
        ),
    })?;

    let predictions = artifacts
        .linear_model()
        .predict(&features)
        .map_err(|e| {
            let detail = match e {
                PipelineError::Prediction(detail) => detail,
                other => other.to_string(),
            };
            PredictError::new(
                PredictErrorKind::Prediction,
                format!("Prediction failed: {}", detail),
            )
        })?;

    predictions.first().copied().ok_or_else(|| {
        PredictError::new(
            PredictErrorKind::Prediction,
            "Prediction failed: model returned no output",
        )
    })
}

/// Predict every row of a CSV file, optionally writing a `prediction` CSV
pub fn predict_file(
    input_path: &Path,
    artifacts: &LoadedArtifacts,
    output_path: Option<&Path>,
) -> Result<Vec<f64>> {
    let raw = dataset::read_csv(input_path)?;
    let predictions = predict_batch(&raw, artifacts.linear_model(), artifacts.state())?;

    if let Some(out) = output_path {
        write_predictions(out, &predictions)?;
    }
    Ok(predictions)
}

fn write_predictions(path: &Path, predictions: &[f64]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| PipelineError::persistence(path, e))?;
    writer
        .write_record([PREDICTION_COLUMN])
        .map_err(|e| PipelineError::persistence(path, e))?;
    for value in predictions {
        writer
            .write_record([value.to_string()])
            .map_err(|e| PipelineError::persistence(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::persistence(path, e))?;
    Ok(())
}
