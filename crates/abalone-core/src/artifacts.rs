//! Paired artifact persistence
//!
//! A training run produces two JSON documents: the fitted preprocessor and
//! the fitted model. Both carry the run id, and the model records the
//! SHA-256 checksum of the preprocessor state it was trained against, so a
//! mismatched pair is rejected at load time instead of producing silently
//! wrong feature frames.

use crate::error::{PipelineError, Result};
use crate::model::{LinearModel, RegressionMetrics};
use crate::preprocessing::PreprocessorState;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bumped whenever the on-disk layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Default artifact file names inside an artifacts directory
pub const MODEL_FILE_NAME: &str = "model.json";
pub const PREPROCESSOR_FILE_NAME: &str = "preprocessor.json";

/// Serialized preprocessor state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorArtifact {
    pub format_version: u32,
    pub run_id: String,
    pub trained_at: DateTime<Utc>,
    pub state: PreprocessorState,
}

/// Serialized model with the checksum of its companion preprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub run_id: String,
    pub trained_at: DateTime<Utc>,
    pub preprocessor_checksum: String,
    pub model: LinearModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RegressionMetrics>,
}

impl ModelArtifact {
    /// Build both artifacts of one training run
    pub fn pair(
        model: LinearModel,
        state: PreprocessorState,
        metrics: Option<RegressionMetrics>,
    ) -> Result<(ModelArtifact, PreprocessorArtifact)> {
        let trained_at = Utc::now();
        let checksum = state_checksum(&state)?;
        let run_id = format!(
            "{}-{}",
            trained_at.format("%Y%m%dT%H%M%S%3fZ"),
            &checksum[..12]
        );

        let preprocessor = PreprocessorArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            run_id: run_id.clone(),
            trained_at,
            state,
        };
        let model = ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            run_id,
            trained_at,
            preprocessor_checksum: checksum,
            model,
            metrics,
        };
        Ok((model, preprocessor))
    }
}

/// A verified model/preprocessor pair ready for inference
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub model: ModelArtifact,
    pub preprocessor: PreprocessorArtifact,
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
}

impl LoadedArtifacts {
    /// Load both artifacts and check that they come from the same run
    pub fn load(model_path: &Path, preprocessor_path: &Path) -> Result<Self> {
        let model: ModelArtifact = read_json(model_path)?;
        let preprocessor: PreprocessorArtifact = read_json(preprocessor_path)?;

        for (path, version) in [
            (model_path, model.format_version),
            (preprocessor_path, preprocessor.format_version),
        ] {
            if version != ARTIFACT_FORMAT_VERSION {
                return Err(PipelineError::persistence(
                    path,
                    format!(
                        "unsupported format version {} (expected {})",
                        version, ARTIFACT_FORMAT_VERSION
                    ),
                ));
            }
        }

        if model.run_id != preprocessor.run_id {
            return Err(PipelineError::Persistence(format!(
                "artifact pair mismatch: model run '{}' vs preprocessor run '{}'",
                model.run_id, preprocessor.run_id
            )));
        }

        let checksum = state_checksum(&preprocessor.state)?;
        if checksum != model.preprocessor_checksum {
            return Err(PipelineError::Persistence(format!(
                "preprocessor checksum mismatch: expected {}, got {}",
                model.preprocessor_checksum, checksum
            )));
        }

        model
            .model
            .validate()
            .map_err(|e| PipelineError::persistence(model_path, e))?;

        if model.model.feature_names() != preprocessor.state.feature_names().as_slice() {
            return Err(PipelineError::Persistence(
                "model features do not match preprocessor output columns".to_string(),
            ));
        }

        info!(
            run_id = %model.run_id,
            model_path = %model_path.display(),
            preprocessor_path = %preprocessor_path.display(),
            "Loaded artifact pair"
        );

        Ok(Self {
            model,
            preprocessor,
            model_path: model_path.to_path_buf(),
            preprocessor_path: preprocessor_path.to_path_buf(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.model.run_id
    }

    pub fn linear_model(&self) -> &LinearModel {
        &self.model.model
    }

    pub fn state(&self) -> &PreprocessorState {
        &self.preprocessor.state
    }
}

/// Write the preprocessor first, then the model that references it
pub fn save_pair(
    model: &ModelArtifact,
    preprocessor: &PreprocessorArtifact,
    model_path: &Path,
    preprocessor_path: &Path,
) -> Result<()> {
    write_json_atomic(preprocessor_path, preprocessor)?;
    write_json_atomic(model_path, model)?;
    info!(
        run_id = %model.run_id,
        model_path = %model_path.display(),
        preprocessor_path = %preprocessor_path.display(),
        "Saved artifact pair"
    );
    Ok(())
}

/// SHA-256 of the JSON form of a preprocessor state
pub fn state_checksum(state: &PreprocessorState) -> Result<String> {
    let bytes = serde_json::to_vec(state)
        .map_err(|e| PipelineError::Persistence(format!("failed to serialize state: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Serialize `value` to `path` through a temp file and rename.
///
/// The temp file sits next to the target as `<file name>.tmp` and is removed
/// when any step fails.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;
    }

    let temp_path = temp_path_for(path)?;
    if let Err(e) = write_temp_and_rename(&temp_path, path, value) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    debug!(path = %path.display(), "Wrote artifact");
    Ok(())
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| PipelineError::persistence(path, "artifact path has no file name"))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

fn write_temp_and_rename<T: Serialize>(temp_path: &Path, path: &Path, value: &T) -> Result<()> {
    let file = File::create(temp_path).map_err(|e| PipelineError::persistence(temp_path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| PipelineError::persistence(temp_path, e))?;
    writer
        .flush()
        .map_err(|e| PipelineError::persistence(temp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| PipelineError::persistence(temp_path, e))?;
    drop(writer);

    fs::rename(temp_path, path).map_err(|e| PipelineError::persistence(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| PipelineError::persistence(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| PipelineError::persistence(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Cell, RawFrame, CATEGORICAL_FEATURE, NUMERIC_FEATURES};
    use crate::preprocessing;
    use tempfile::TempDir;

    fn fitted() -> (LinearModel, PreprocessorState) {
        let mut columns: Vec<String> = NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect();
        columns.push(CATEGORICAL_FEATURE.to_string());
        let mut raw = RawFrame::new(columns);
        let mut target = Vec::new();
        for i in 0..12 {
            let mut row: Vec<Cell> = (0..NUMERIC_FEATURES.len())
                .map(|j| Cell::Number(0.1 * i as f64 + 0.03 * ((i * j) % 5) as f64))
                .collect();
            row.push(Cell::from(["M", "F", "I"][i % 3]));
            raw.push_row(row).unwrap();
            target.push((5 + i) as f64);
        }
        let (encoded, state) = preprocessing::fit(&raw).unwrap();
        let model = LinearModel::fit(&encoded, &target).unwrap();
        (model, state)
    }

    #[test]
    fn test_checksum_is_stable() {
        let (_, state) = fitted();
        let a = state_checksum(&state).unwrap();
        let b = state_checksum(&state).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_save_and_load_pair() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("nested").join(MODEL_FILE_NAME);
        let preproc_path = dir.path().join("nested").join(PREPROCESSOR_FILE_NAME);

        let (model, state) = fitted();
        let (model_artifact, preproc_artifact) = ModelArtifact::pair(model, state, None).unwrap();
        save_pair(&model_artifact, &preproc_artifact, &model_path, &preproc_path).unwrap();

        assert!(!dir.path().join("nested").join("model.json.tmp").exists());
        assert!(!dir.path().join("nested").join("preprocessor.json.tmp").exists());

        let loaded = LoadedArtifacts::load(&model_path, &preproc_path).unwrap();
        assert_eq!(loaded.run_id(), model_artifact.run_id);
        assert_eq!(loaded.model, model_artifact);
        assert_eq!(loaded.preprocessor, preproc_artifact);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = LoadedArtifacts::load(
            &dir.path().join(MODEL_FILE_NAME),
            &dir.path().join(PREPROCESSOR_FILE_NAME),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
    }

    #[test]
    fn test_load_rejects_mismatched_runs() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join(MODEL_FILE_NAME);
        let preproc_path = dir.path().join(PREPROCESSOR_FILE_NAME);

        let (model, state) = fitted();
        let (model_a, preproc_a) = ModelArtifact::pair(model.clone(), state.clone(), None).unwrap();
        let mut preproc_b = preproc_a.clone();
        preproc_b.run_id = format!("{}-other", preproc_a.run_id);

        save_pair(&model_a, &preproc_b, &model_path, &preproc_path).unwrap();
        let err = LoadedArtifacts::load(&model_path, &preproc_path).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_load_rejects_tampered_state() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join(MODEL_FILE_NAME);
        let preproc_path = dir.path().join(PREPROCESSOR_FILE_NAME);

        let (model, state) = fitted();
        let (model_a, preproc_a) = ModelArtifact::pair(model, state, None).unwrap();
        save_pair(&model_a, &preproc_a, &model_path, &preproc_path).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&preproc_path).unwrap()).unwrap();
        doc["state"]["numeric"][0]["mean"] = serde_json::json!(123.0);
        fs::write(&preproc_path, serde_json::to_string(&doc).unwrap()).unwrap();

        let err = LoadedArtifacts::load(&model_path, &preproc_path).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_load_rejects_corrupt_json() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join(MODEL_FILE_NAME);
        let preproc_path = dir.path().join(PREPROCESSOR_FILE_NAME);
        fs::write(&model_path, b"not json").unwrap();
        fs::write(&preproc_path, b"{}").unwrap();

        assert!(matches!(
            LoadedArtifacts::load(&model_path, &preproc_path),
            Err(PipelineError::Persistence(_))
        ));
    }

    #[test]
    fn test_write_into_file_parent_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();

        let err = write_json_atomic(&blocker.join("model.json"), &1u32).unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
    }

    #[test]
    fn test_load_rejects_truncated_coefficients() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join(MODEL_FILE_NAME);
        let preproc_path = dir.path().join(PREPROCESSOR_FILE_NAME);

        let (model, state) = fitted();
        let (model_a, preproc_a) = ModelArtifact::pair(model, state, None).unwrap();
        save_pair(&model_a, &preproc_a, &model_path, &preproc_path).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&model_path).unwrap()).unwrap();
        doc["model"]["coefficients"] = serde_json::json!([1.0]);
        fs::write(&model_path, serde_json::to_string(&doc).unwrap()).unwrap();

        let err = LoadedArtifacts::load(&model_path, &preproc_path).unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
        assert!(err.to_string().contains("coefficients"));
    }

    #[test]
    fn test_temp_name_keeps_full_file_name() {
        let a = temp_path_for(Path::new("out/model.json")).unwrap();
        let b = temp_path_for(Path::new("out/model.csv")).unwrap();
        assert_eq!(a, Path::new("out/model.json.tmp"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // Renaming a file onto a non-empty directory fails after the temp file is written
        let target = dir.path().join("model.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"x").unwrap();

        let err = write_json_atomic(&target, &1u32).unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
        assert!(!dir.path().join("model.json.tmp").exists());
    }
}
