//! Batch prediction command

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tabled::Tabled;
use tracing::info;

use abalone_core::artifacts::{MODEL_FILE_NAME, PREPROCESSOR_FILE_NAME};
use abalone_core::{predict_flow, RetryPolicy};

use crate::output::{print_info, print_json, print_table, OutputFormat};

/// Row for the predictions table
#[derive(Tabled, Serialize)]
struct PredictionRow {
    #[tabled(rename = "Row")]
    row: usize,
    #[tabled(rename = "Predicted rings", display_with = "display_rings")]
    predicted_rings: f64,
}

fn display_rings(value: &f64) -> String {
    format!("{:.3}", value)
}

/// Predict every row of `input` with the pair stored in `artifacts_dir`
pub fn run_prediction(
    input: &Path,
    artifacts_dir: &Path,
    output: Option<&Path>,
    retries: u32,
    retry_delay_secs: u64,
    format: OutputFormat,
) -> Result<()> {
    let policy = RetryPolicy::new(retries, Duration::from_secs(retry_delay_secs));
    info!(
        input = %input.display(),
        artifacts_dir = %artifacts_dir.display(),
        retries,
        "Starting batch prediction"
    );
    let predictions = predict_flow(
        input,
        &artifacts_dir.join(MODEL_FILE_NAME),
        &artifacts_dir.join(PREPROCESSOR_FILE_NAME),
        output,
        policy,
    )
    .with_context(|| format!("prediction for {} failed", input.display()))?;

    info!(rows = predictions.len(), "Batch prediction finished");

    let rows: Vec<PredictionRow> = predictions
        .into_iter()
        .enumerate()
        .map(|(row, predicted_rings)| PredictionRow {
            row,
            predicted_rings,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            print_table(&rows);
            if let Some(out) = output {
                print_info(&format!("Predictions written to {}", out.display()));
            }
        }
    }

    Ok(())
}
