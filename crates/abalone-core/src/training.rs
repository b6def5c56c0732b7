//! Training pipeline
//!
//! read CSV → seeded train/test split → fit preprocessor on the train
//! partition → fit linear model → evaluate on the test partition → persist
//! the artifact pair.

use crate::artifacts::{save_pair, ModelArtifact, MODEL_FILE_NAME, PREPROCESSOR_FILE_NAME};
use crate::dataset::{self, CATEGORICAL_FEATURE, NUMERIC_FEATURES, TARGET};
use crate::error::{PipelineError, Result};
use crate::model::{LinearModel, RegressionMetrics};
use crate::preprocessing;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

/// Options for a training run
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Fraction of rows held out for evaluation, in (0, 1)
    pub test_fraction: f64,
    /// Seed for the train/test shuffle
    pub random_seed: u64,
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
}

impl TrainOptions {
    /// Default split settings with both artifacts inside `artifacts_dir`
    pub fn in_dir(artifacts_dir: &Path) -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            random_seed: DEFAULT_RANDOM_SEED,
            model_path: artifacts_dir.join(MODEL_FILE_NAME),
            preprocessor_path: artifacts_dir.join(PREPROCESSOR_FILE_NAME),
        }
    }

    pub fn with_split(mut self, test_fraction: f64, random_seed: u64) -> Self {
        self.test_fraction = test_fraction;
        self.random_seed = random_seed;
        self
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub rmse: f64,
    pub r2: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub run_id: String,
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
}

/// Train, evaluate and persist a model from the CSV at `dataset_path`
pub fn train(dataset_path: &Path, options: &TrainOptions) -> Result<TrainingReport> {
    let raw = dataset::read_csv(dataset_path)?;
    if raw.is_empty() {
        return Err(PipelineError::DataLoad(format!(
            "{}: dataset contains no records",
            dataset_path.display()
        )));
    }

    let mut required: Vec<&str> = NUMERIC_FEATURES.to_vec();
    required.push(CATEGORICAL_FEATURE);
    required.push(TARGET);
    let missing = raw.missing_columns(&required);
    if !missing.is_empty() {
        return Err(PipelineError::Schema(format!(
            "{}: missing columns {:?}",
            dataset_path.display(),
            missing
        )));
    }

    let target = raw.target_column(TARGET)?;
    let (train_idx, test_idx) =
        dataset::train_test_split(raw.len(), options.test_fraction, options.random_seed)?;
    debug!(
        n_train = train_idx.len(),
        n_test = test_idx.len(),
        seed = options.random_seed,
        "Split dataset"
    );

    let train_raw = raw.select_rows(&train_idx);
    let test_raw = raw.select_rows(&test_idx);
    let y_train: Vec<f64> = train_idx.iter().map(|&i| target[i]).collect();
    let y_test: Vec<f64> = test_idx.iter().map(|&i| target[i]).collect();

    let (x_train, state) = preprocessing::fit(&train_raw)?;
    let model = LinearModel::fit(&x_train, &y_train)?;

    let x_test = state.apply(&test_raw)?;
    let y_pred = model.predict(&x_test)?;
    let metrics = RegressionMetrics::evaluate(&y_test, &y_pred)?;

    let n_features = state.n_features();
    let (model_artifact, preprocessor_artifact) =
        ModelArtifact::pair(model, state, Some(metrics))?;
    save_pair(
        &model_artifact,
        &preprocessor_artifact,
        &options.model_path,
        &options.preprocessor_path,
    )?;

    info!(
        run_id = %model_artifact.run_id,
        rmse = metrics.rmse,
        r2 = metrics.r2,
        "Training finished"
    );

    Ok(TrainingReport {
        rmse: metrics.rmse,
        r2: metrics.r2,
        n_train: train_idx.len(),
        n_test: test_idx.len(),
        n_features,
        run_id: model_artifact.run_id,
        model_path: options.model_path.clone(),
        preprocessor_path: options.preprocessor_path.clone(),
    })
}
