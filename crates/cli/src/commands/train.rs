//! Training command

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tracing::info;

use abalone_core::training::{DEFAULT_RANDOM_SEED, DEFAULT_TEST_FRACTION};
use abalone_core::train_model_workflow;

use crate::output::{color_r2, format_metric, print_json, print_success, OutputFormat};

/// Train on `trainset_path` and write the artifact pair into `artifacts_dir`
pub fn run_training(trainset_path: &Path, artifacts_dir: &Path, format: OutputFormat) -> Result<()> {
    info!(
        dataset = %trainset_path.display(),
        artifacts_dir = %artifacts_dir.display(),
        "Starting training"
    );
    let summary = train_model_workflow(
        trainset_path,
        Some(artifacts_dir),
        DEFAULT_TEST_FRACTION,
        DEFAULT_RANDOM_SEED,
    )
    .with_context(|| format!("training on {} failed", trainset_path.display()))?;

    info!(run_id = %summary.report.run_id, "Training finished");

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            let report = &summary.report;
            print_success("Training completed");
            println!();
            println!("{}", "Artifacts".bold());
            println!("{}", "-".repeat(50));
            println!("Run:                    {}", report.run_id.cyan());
            println!("Model:                  {}", report.model_path.display());
            println!("Preprocessor:           {}", report.preprocessor_path.display());
            println!("Metrics:                {}", summary.metrics_path.display());
            println!();
            println!("{}", "Data".bold());
            println!("{}", "-".repeat(50));
            println!("Training rows:          {}", report.n_train);
            println!("Test rows:              {}", report.n_test);
            println!("Features:               {}", report.n_features);
            println!();
            println!("{}", "Evaluation".bold());
            println!("{}", "-".repeat(50));
            println!("RMSE:                   {}", format_metric(report.rmse));
            println!("R²:                     {}", color_r2(report.r2));
        }
    }

    Ok(())
}
