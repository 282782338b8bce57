//! Input standardization and target log transform.
//!
//! The statistics computed on the training inputs are stored on the `Transformer`
//! and reused unchanged for every later prediction, so a model always sees inputs
//! on the scale it was trained on.

use crate::construction::{LOG_EPSILON, ShapeError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("The input transform has not been fitted. Fit it on training data before transforming.")]
    NotFitted,

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Per-column centering and scaling learned from the training inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStandardization {
    pub mean: Array1<f64>,
    /// Population standard deviation of each column, or 1.0 for constant columns.
    pub scale: Array1<f64>,
}

impl ColumnStandardization {
    fn fit(x: ArrayView2<f64>) -> Result<Self, ShapeError> {
        let mean = x.mean_axis(Axis(0)).ok_or(ShapeError::NoSamples)?;
        let std = x.std_axis(Axis(0), 0.0);

        let scale = std.mapv(|s| if s > 0.0 { s } else { 1.0 });
        let constant_columns: Vec<usize> = std
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == 0.0)
            .map(|(i, _)| i)
            .collect();
        if !constant_columns.is_empty() {
            log::warn!(
                "Columns {:?} have zero variance; they are centered but left unscaled.",
                constant_columns
            );
        }

        Ok(ColumnStandardization { mean, scale })
    }

    fn apply(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

/// Holds the optional input standardization and the target log policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub standardize_inputs: bool,
    pub log_target: bool,
    /// Number of feature columns seen at fit time; `None` until fitted.
    pub n_features: Option<usize>,
    /// Present only when `standardize_inputs` is set and the transformer is fitted.
    pub standardization: Option<ColumnStandardization>,
}

impl Transformer {
    pub fn new(standardize_inputs: bool, log_target: bool) -> Self {
        Transformer {
            standardize_inputs,
            log_target,
            n_features: None,
            standardization: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    /// Learns the column statistics from `x` and returns the transformed inputs.
    ///
    /// Any previously fitted statistics are replaced.
    pub fn fit_transform_inputs(
        &mut self,
        x: ArrayView2<f64>,
    ) -> Result<Array2<f64>, TransformError> {
        if x.nrows() == 0 {
            return Err(ShapeError::NoSamples.into());
        }

        self.standardization = if self.standardize_inputs {
            Some(ColumnStandardization::fit(x)?)
        } else {
            None
        };
        self.n_features = Some(x.ncols());

        self.transform_inputs(x)
    }

    /// Applies the stored statistics to `x` without recomputing them.
    pub fn transform_inputs(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TransformError> {
        let expected = self.n_features.ok_or(TransformError::NotFitted)?;
        if x.ncols() != expected {
            return Err(ShapeError::FeatureCountMismatch {
                found: x.ncols(),
                expected,
            }
            .into());
        }

        Ok(match &self.standardization {
            Some(stats) => stats.apply(x),
            None => x.to_owned(),
        })
    }

    /// `ln(y + 1e-8)` when the log-target policy is on, otherwise a copy of `y`.
    pub fn maybe_log_target(&self, y: ArrayView1<f64>) -> Array1<f64> {
        if self.log_target {
            y.mapv(|v| (v + LOG_EPSILON).ln())
        } else {
            y.to_owned()
        }
    }

    /// Exact inverse of [`Transformer::maybe_log_target`].
    pub fn invert_target(&self, y_transformed: ArrayView1<f64>) -> Array1<f64> {
        if self.log_target {
            y_transformed.mapv(|v| v.exp() - LOG_EPSILON)
        } else {
            y_transformed.to_owned()
        }
    }
}
