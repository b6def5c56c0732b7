//! Loaded model context shared by request handlers
//!
//! The artifact pair is loaded once at startup. A failed load leaves the
//! context empty instead of aborting the process; every prediction then
//! reports "not loaded". The pair is only replaced through [`ModelContext::reload`].

use abalone_core::{LoadedArtifacts, PipelineError, ServiceMetrics, StructuredLogger};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Snapshot of the context for readiness reporting
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct ModelContext {
    model_path: PathBuf,
    preprocessor_path: PathBuf,
    artifacts: RwLock<Option<Arc<LoadedArtifacts>>>,
    last_error: RwLock<Option<String>>,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl ModelContext {
    /// Load the artifact pair, degrading to an empty context on failure
    pub fn load(
        model_path: impl Into<PathBuf>,
        preprocessor_path: impl Into<PathBuf>,
        metrics: ServiceMetrics,
    ) -> Self {
        let model_path = model_path.into();
        let preprocessor_path = preprocessor_path.into();
        let logger = StructuredLogger::new("prediction-service");

        let (artifacts, last_error) = match LoadedArtifacts::load(&model_path, &preprocessor_path) {
            Ok(loaded) => {
                logger.log_artifacts_loaded(
                    loaded.run_id(),
                    &model_path.display().to_string(),
                    &preprocessor_path.display().to_string(),
                );
                metrics.set_loaded_run(Some(loaded.run_id()));
                (Some(Arc::new(loaded)), None)
            }
            Err(e) => {
                logger.log_artifacts_unavailable(&e.to_string());
                metrics.set_loaded_run(None);
                (None, Some(e.to_string()))
            }
        };

        Self {
            model_path,
            preprocessor_path,
            artifacts: RwLock::new(artifacts),
            last_error: RwLock::new(last_error),
            metrics,
            logger,
        }
    }

    /// Currently loaded pair, if any
    pub async fn current(&self) -> Option<Arc<LoadedArtifacts>> {
        self.artifacts.read().await.clone()
    }

    /// Re-read the artifact pair from disk.
    ///
    /// On failure the previously loaded pair stays in place.
    pub async fn reload(&self) -> Result<Arc<LoadedArtifacts>, PipelineError> {
        let model_path = self.model_path.clone();
        let preprocessor_path = self.preprocessor_path.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            LoadedArtifacts::load(&model_path, &preprocessor_path)
        })
        .await
        .map_err(|e| PipelineError::Persistence(format!("artifact load task failed: {}", e)))?;

        match loaded {
            Ok(loaded) => {
                let loaded = Arc::new(loaded);
                let mut guard = self.artifacts.write().await;
                *guard = Some(loaded.clone());
                *self.last_error.write().await = None;
                self.logger.log_artifacts_loaded(
                    loaded.run_id(),
                    &self.model_path.display().to_string(),
                    &self.preprocessor_path.display().to_string(),
                );
                self.metrics.set_loaded_run(Some(loaded.run_id()));
                Ok(loaded)
            }
            Err(e) => {
                self.logger.log_artifacts_unavailable(&e.to_string());
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> ArtifactStatus {
        let current = self.current().await;
        let reason = self.last_error.read().await.clone();
        match current {
            Some(artifacts) => ArtifactStatus {
                loaded: true,
                run_id: Some(artifacts.run_id().to_string()),
                reason,
            },
            None => ArtifactStatus {
                loaded: false,
                run_id: None,
                reason: reason.or_else(|| Some("Model or preprocessor not loaded.".to_string())),
            },
        }
    }
}
