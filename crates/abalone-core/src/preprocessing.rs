//! Feature preprocessing
//!
//! Standardizes the numeric measurements and one-hot encodes the categorical
//! column. The fitted [`PreprocessorState`] fixes the output column order:
//! the seven numeric columns in [`NUMERIC_FEATURES`] order, then one
//! `Sex_<value>` indicator per category seen at fit time (sorted).
//!
//! Categories that were not seen at fit time encode to an all-zero indicator
//! block. Categories seen at fit time but absent from the input still get
//! their (zero) column, so fit-time and inference-time frames always agree.

use crate::dataset::{RawFrame, CATEGORICAL_FEATURE, NUMERIC_FEATURES};
use crate::error::{PipelineError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Encoded feature matrix with its column names
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    values: DMatrix<f64>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>, values: DMatrix<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(PipelineError::Encoding(format!(
                "{} column names for a matrix with {} columns",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.values.row(i).iter().copied().collect()
    }
}

/// Standardization parameters for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation, or 1.0 for a constant column
    pub scale: f64,
}

impl ScalerParams {
    fn fit(column: &str, values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std.is_finite() && std > f64::EPSILON * mean.abs().max(1.0) {
            std
        } else {
            1.0
        };
        Self {
            column: column.to_string(),
            mean,
            scale,
        }
    }

    #[inline]
    fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// Fitted preprocessing parameters, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorState {
    numeric: Vec<ScalerParams>,
    categorical_column: String,
    categories: Vec<String>,
}

/// Fit a preprocessor on `raw` and return the encoded training frame with it
pub fn fit(raw: &RawFrame) -> Result<(FeatureFrame, PreprocessorState)> {
    let state = PreprocessorState::fit(raw)?;
    let encoded = state.apply(raw)?;
    Ok((encoded, state))
}

/// Apply a previously fitted preprocessor
pub fn apply(raw: &RawFrame, state: &PreprocessorState) -> Result<FeatureFrame> {
    state.apply(raw)
}

impl PreprocessorState {
    /// Learn per-column means/scales and the categorical vocabulary
    pub fn fit(raw: &RawFrame) -> Result<Self> {
        ensure_columns(raw)?;
        if raw.is_empty() {
            return Err(PipelineError::Encoding(
                "cannot fit preprocessor on an empty frame".to_string(),
            ));
        }

        let numeric = NUMERIC_FEATURES
            .iter()
            .map(|name| {
                let values = numeric_column(raw, name)?;
                Ok(ScalerParams::fit(name, &values))
            })
            .collect::<Result<Vec<_>>>()?;

        let categories = categorical_column(raw)?
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            numeric,
            categorical_column: CATEGORICAL_FEATURE.to_string(),
            categories,
        })
    }

    /// Encode `raw` with the fitted parameters.
    ///
    /// Extra input columns are ignored. Missing required columns are
    /// reported together in a single [`PipelineError::MissingColumn`].
    pub fn apply(&self, raw: &RawFrame) -> Result<FeatureFrame> {
        ensure_columns(raw)?;

        let n_rows = raw.len();
        let n_numeric = self.numeric.len();
        let mut values = DMatrix::<f64>::zeros(n_rows, self.n_features());

        for (col, params) in self.numeric.iter().enumerate() {
            let column = numeric_column(raw, &params.column)?;
            for (row, value) in column.into_iter().enumerate() {
                values[(row, col)] = params.transform(value);
            }
        }

        for (row, category) in categorical_column(raw)?.into_iter().enumerate() {
            if let Ok(pos) = self.categories.binary_search(&category) {
                values[(row, n_numeric + pos)] = 1.0;
            }
        }

        FeatureFrame::new(self.feature_names(), values)
    }

    /// Output column names in encoding order
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|p| p.column.clone())
            .chain(
                self.categories
                    .iter()
                    .map(|c| format!("{}_{}", self.categorical_column, c)),
            )
            .collect()
    }

    pub fn n_features(&self) -> usize {
        self.numeric.len() + self.categories.len()
    }
}

fn ensure_columns(raw: &RawFrame) -> Result<()> {
    let mut required: Vec<&str> = NUMERIC_FEATURES.to_vec();
    required.push(CATEGORICAL_FEATURE);
    let missing = raw.missing_columns(&required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumn { columns: missing })
    }
}

fn numeric_column(raw: &RawFrame, name: &str) -> Result<Vec<f64>> {
    let idx = raw
        .column_index(name)
        .ok_or_else(|| PipelineError::MissingColumn {
            columns: vec![name.to_string()],
        })?;

    raw.rows()
        .enumerate()
        .map(|(row, cells)| match cells[idx].as_f64() {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(PipelineError::Encoding(format!(
                "row {}: column '{}' expects a finite number, got {:?}",
                row, name, cells[idx]
            ))),
        })
        .collect()
}

fn categorical_column(raw: &RawFrame) -> Result<Vec<String>> {
    let idx = raw
        .column_index(CATEGORICAL_FEATURE)
        .ok_or_else(|| PipelineError::MissingColumn {
            columns: vec![CATEGORICAL_FEATURE.to_string()],
        })?;

    raw.rows()
        .enumerate()
        .map(|(row, cells)| match cells[idx].as_text() {
            Some(label) => Ok(label.trim().to_string()),
            None => Err(PipelineError::Encoding(format!(
                "row {}: column '{}' expects a category label, got {:?}",
                row, CATEGORICAL_FEATURE, cells[idx]
            ))),
        })
        .collect()
}
