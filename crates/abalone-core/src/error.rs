//! Error taxonomy for the training and inference pipeline

use thiserror::Error;

/// Result alias used throughout the pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while loading data, encoding features, fitting,
/// persisting or invoking the model.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Dataset file missing, unreadable or not valid CSV
    #[error("failed to load dataset: {0}")]
    DataLoad(String),

    /// An expected column is absent or holds values of the wrong kind
    #[error("schema error: {0}")]
    Schema(String),

    /// Required feature columns are absent at inference time
    #[error("missing columns {columns:?}")]
    MissingColumn { columns: Vec<String> },

    /// A value could not be encoded into the feature frame
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Artifact write/read failure or an inconsistent artifact pair
    #[error("artifact persistence failed: {0}")]
    Persistence(String),

    /// Model invocation failure
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// Invalid option passed by the caller
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl PipelineError {
    pub fn persistence(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        PipelineError::Persistence(format!("{}: {}", path.display(), err))
    }
}
