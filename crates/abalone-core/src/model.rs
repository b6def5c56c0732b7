//! Ordinary least squares linear model
//!
//! Fitting centers the design matrix and target, solves the centered system
//! with an SVD pseudo-inverse and recovers the intercept from the means. The
//! one-hot block plus intercept is rank deficient; the pseudo-inverse picks
//! the minimum-norm coefficients instead of failing.

use crate::error::{PipelineError, Result};
use crate::preprocessing::FeatureFrame;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Relative cutoff below which singular values are treated as zero
const SINGULAR_VALUE_RTOL: f64 = 1e-10;

/// Fitted linear coefficients and intercept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    /// Fit by least squares with an intercept
    pub fn fit(features: &FeatureFrame, target: &[f64]) -> Result<Self> {
        if features.nrows() == 0 {
            return Err(PipelineError::InvalidParameter(
                "cannot fit a model on zero rows".to_string(),
            ));
        }
        if features.nrows() != target.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "{} feature rows but {} targets",
                features.nrows(),
                target.len()
            )));
        }

        let x = features.values();
        let x_mean = x.row_mean();
        let y = DVector::from_column_slice(target);
        let y_mean = y.mean();

        let centered = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - x_mean[j]);
        let y_centered = y.add_scalar(-y_mean);

        let svd = centered.svd(true, true);
        let cutoff = svd.singular_values.max() * SINGULAR_VALUE_RTOL;
        let coefficients = svd
            .solve(&y_centered, cutoff)
            .map_err(|e| PipelineError::Prediction(format!("least squares solve failed: {}", e)))?;

        let intercept = y_mean
            - x_mean
                .iter()
                .zip(coefficients.iter())
                .map(|(m, c)| m * c)
                .sum::<f64>();

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::Prediction(
                "least squares produced non-finite coefficients".to_string(),
            ));
        }

        Ok(Self {
            feature_names: features.columns().to_vec(),
            coefficients: coefficients.iter().copied().collect(),
            intercept,
        })
    }

    /// Predict one value per row.
    ///
    /// The frame's columns must match the fit-time feature names exactly.
    pub fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>> {
        self.validate().map_err(PipelineError::Prediction)?;
        if features.columns() != self.feature_names.as_slice() {
            return Err(PipelineError::Prediction(format!(
                "feature mismatch: model expects {:?}, got {:?}",
                self.feature_names,
                features.columns()
            )));
        }

        // Row-wise dot products keep the summation order independent of batch size
        let values = features.values();
        let predictions: Vec<f64> = (0..values.nrows())
            .map(|i| {
                values
                    .row(i)
                    .iter()
                    .zip(&self.coefficients)
                    .fold(self.intercept, |acc, (x, c)| acc + x * c)
            })
            .collect();

        if let Some(row) = predictions.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Prediction(format!(
                "non-finite prediction for row {}",
                row
            )));
        }
        Ok(predictions)
    }

    /// Check that the coefficients line up with the feature names and are finite
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(format!(
                "model has {} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err("model has non-finite coefficients".to_string());
        }
        Ok(())
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

/// Held-out regression accuracy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "cannot evaluate {} predictions against {} targets",
                predicted.len(),
                actual.len()
            )));
        }

        let n = actual.len() as f64;
        let ss_res: f64 = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .sum();
        let mean = actual.iter().sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            rmse: (ss_res / n).sqrt(),
            r2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn frame(columns: &[&str], rows: usize, data: &[f64]) -> FeatureFrame {
        FeatureFrame::new(
            columns.iter().map(|s| s.to_string()).collect(),
            DMatrix::from_row_slice(rows, columns.len(), data),
        )
        .unwrap()
    }

    #[test]
    fn test_fit_recovers_exact_line() {
        // y = 2a - 3b + 5
        let x = frame(
            &["a", "b"],
            5,
            &[1.0, 0.0, 2.0, 1.0, 3.0, 5.0, 4.0, 2.0, 0.5, 0.25],
        );
        let y: Vec<f64> = (0..5)
            .map(|i| 2.0 * x.values()[(i, 0)] - 3.0 * x.values()[(i, 1)] + 5.0)
            .collect();

        let model = LinearModel::fit(&x, &y).unwrap();
        assert_abs_diff_eq!(model.coefficients()[0], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.coefficients()[1], -3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.intercept(), 5.0, epsilon = 1e-9);

        let predictions = model.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(&y) {
            assert_abs_diff_eq!(*p, *t, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_fit_handles_collinear_one_hot_block() {
        // Two indicator columns that always sum to one, plus intercept
        let x = frame(
            &["v", "c_a", "c_b"],
            4,
            &[1.0, 1.0, 0.0, 2.0, 0.0, 1.0, 3.0, 1.0, 0.0, 4.0, 0.0, 1.0],
        );
        let y = vec![3.0, 7.0, 7.0, 11.0]; // 2v + 1 (+2 for c_b)

        let model = LinearModel::fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(&y) {
            assert_abs_diff_eq!(*p, *t, epsilon = 1e-8);
        }
        // Minimum-norm solution splits the category effect symmetrically
        assert_abs_diff_eq!(
            model.coefficients()[1] + model.coefficients()[2],
            0.0,
            epsilon = 1e-8
        );
    }

    #[test]
    fn test_predict_rejects_mismatched_columns() {
        let x = frame(&["a", "b"], 3, &[1.0, 2.0, 2.0, 1.0, 3.0, 3.0]);
        let model = LinearModel::fit(&x, &[1.0, 2.0, 3.0]).unwrap();

        let other = frame(&["b", "a"], 1, &[1.0, 2.0]);
        assert!(matches!(
            model.predict(&other),
            Err(PipelineError::Prediction(_))
        ));
    }

    #[test]
    fn test_predict_rejects_coefficient_count_mismatch() {
        let model: LinearModel = serde_json::from_value(serde_json::json!({
            "feature_names": ["a", "b", "c"],
            "coefficients": [1.0],
            "intercept": 0.0
        }))
        .unwrap();

        let x = frame(&["a", "b", "c"], 1, &[1.0, 100.0, 100.0]);
        let err = model.predict(&x).unwrap_err();
        assert!(matches!(err, PipelineError::Prediction(_)));
        assert!(err.to_string().contains("1 coefficients for 3 features"));
    }

    #[test]
    fn test_fit_rejects_length_mismatch() {
        let x = frame(&["a"], 2, &[1.0, 2.0]);
        assert!(matches!(
            LinearModel::fit(&x, &[1.0]),
            Err(PipelineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_predict_preserves_row_order() {
        let x = frame(&["a"], 3, &[1.0, 2.0, 3.0]);
        let model = LinearModel::fit(&x, &[10.0, 20.0, 30.0]).unwrap();

        let reversed = frame(&["a"], 3, &[3.0, 2.0, 1.0]);
        let predictions = model.predict(&reversed).unwrap();
        assert_eq!(predictions.len(), 3);
        assert_abs_diff_eq!(predictions[0], 30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(predictions[2], 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_metrics_perfect_fit() {
        let m = RegressionMetrics::evaluate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_metrics_values() {
        let m = RegressionMetrics::evaluate(&[1.0, 2.0, 3.0, 4.0], &[2.0, 2.0, 3.0, 3.0]).unwrap();
        // residuals 1, 0, 0, 1 -> mse 0.5; ss_tot = 5
        assert_abs_diff_eq!(m.rmse, 0.5f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(m.r2, 1.0 - 2.0 / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_metrics_constant_target() {
        let m = RegressionMetrics::evaluate(&[4.0, 4.0], &[4.0, 5.0]).unwrap();
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_metrics_empty() {
        assert!(RegressionMetrics::evaluate(&[], &[]).is_err());
    }
}
