//! Tabular dataset handling
//!
//! A [`RawFrame`] is a named-column table of untyped cells. CSV files load
//! every cell as text; records arriving over HTTP carry JSON numbers. The
//! preprocessor decides how each column is interpreted.

use crate::error::{PipelineError, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::Path;
use tracing::debug;

/// Numeric measurement columns, in feature-frame order
pub const NUMERIC_FEATURES: [&str; 7] = [
    "Length",
    "Diameter",
    "Height",
    "Whole weight",
    "Shucked weight",
    "Viscera weight",
    "Shell weight",
];

/// Categorical column (abalone sex: M, F or I)
pub const CATEGORICAL_FEATURE: &str = "Sex";

/// Label column (ring count)
pub const TARGET: &str = "Rings";

/// A single table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    /// Numeric value of the cell, parsing text when needed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Label value of the cell; numbers are not labels
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            Cell::Number(_) => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// Row-major table with named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a one-row frame from `(column, value)` pairs
    pub fn from_record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Cell)>,
    {
        let (columns, row): (Vec<String>, Vec<Cell>) =
            fields.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self {
            columns,
            rows: vec![row],
        }
    }

    /// Append a row; its width must match the header
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::Schema(format!(
                "row has {} cells, header has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Names from `required` that are not present in this frame, in order
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Rename columns according to `(from, to)` pairs; unknown names are ignored
    pub fn rename_columns(&mut self, mapping: &[(&str, &str)]) {
        for column in self.columns.iter_mut() {
            if let Some((_, to)) = mapping.iter().find(|(from, _)| column == from) {
                *column = to.to_string();
            }
        }
    }

    /// New frame holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> RawFrame {
        RawFrame {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Read an integer-valued label column as `f64`
    pub fn target_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| PipelineError::Schema(format!("target column '{}' not found", name)))?;

        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                let value = row[idx].as_f64().ok_or_else(|| {
                    PipelineError::Schema(format!(
                        "row {}: target '{}' is not numeric",
                        row_idx, name
                    ))
                })?;
                if !value.is_finite() || value.fract() != 0.0 {
                    return Err(PipelineError::Schema(format!(
                        "row {}: target '{}' must be an integer ring count, got {}",
                        row_idx, name, value
                    )));
                }
                Ok(value)
            })
            .collect()
    }
}

/// Load a CSV file with a header row into a [`RawFrame`]
pub fn read_csv(path: &Path) -> Result<RawFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| PipelineError::DataLoad(format!("{}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| {
            PipelineError::DataLoad(format!("{}: unable to read CSV header: {}", path.display(), e))
        })?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();

    let mut frame = RawFrame::new(headers);
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            PipelineError::DataLoad(format!(
                "{}: failed to parse CSV row {}: {}",
                path.display(),
                row_idx + 2,
                e
            ))
        })?;
        let row = record.iter().map(Cell::from).collect();
        frame.push_row(row).map_err(|e| {
            PipelineError::DataLoad(format!("{}: row {}: {}", path.display(), row_idx + 2, e))
        })?;
    }

    debug!(path = %path.display(), rows = frame.len(), "Loaded dataset");
    Ok(frame)
}

/// Deterministic shuffled split of `n` row indices into `(train, test)`.
///
/// The test partition holds `ceil(n * test_fraction)` rows.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    random_seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n_test = (n as f64 * test_fraction).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::InvalidParameter(format!(
            "cannot split {} rows with test_fraction {}: both partitions must be non-empty",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(random_seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}
