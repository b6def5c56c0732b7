//! Core library for the abalone age predictor
//!
//! This crate provides the functionality shared by the CLI and the
//! prediction service:
//! - Dataset loading and train/test splitting
//! - Feature preprocessing (standardization + one-hot encoding)
//! - Linear model fitting and evaluation
//! - Paired artifact persistence
//! - Batch and single-record prediction
//! - Workflow tasks with bounded retry
//! - Metrics and structured logging

pub mod artifacts;
pub mod dataset;
pub mod error;
pub mod model;
pub mod observability;
pub mod predicting;
pub mod preprocessing;
pub mod training;
pub mod workflow;

pub use artifacts::{LoadedArtifacts, ModelArtifact, PreprocessorArtifact};
pub use dataset::{Cell, RawFrame, CATEGORICAL_FEATURE, NUMERIC_FEATURES, TARGET};
pub use error::{PipelineError, Result};
pub use model::{LinearModel, RegressionMetrics};
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predicting::{predict_batch, predict_file, predict_one, PredictError, PredictErrorKind};
pub use preprocessing::{FeatureFrame, PreprocessorState};
pub use training::{train, TrainOptions, TrainingReport};
pub use workflow::{predict_flow, train_model_workflow, RetryPolicy, Task, WorkflowSummary};
