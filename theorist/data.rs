//! # Data Loading and Validation
//!
//! Reads tab-separated tables into the `ndarray` structures used by the fitting
//! pipeline. The first row is a header. One column (by default `y`) is the target;
//! every other column is a numeric feature, kept in file order, and its header becomes
//! the feature's symbol in the printed equation.
//!
//! Failures here are assumed to be user-input errors, so `DataError` names the
//! offending row and column.

use crate::construction::{ShapeError, matrix_from_rows};
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Default name of the target column.
pub const DEFAULT_TARGET_COLUMN: &str = "y";

/// A container for validated data ready for model fitting.
#[derive(Debug)]
pub struct TrainingData {
    /// Feature matrix, shape `[n_samples, n_features]`.
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
}

/// A container for validated data ready for prediction.
#[derive(Debug)]
pub struct PredictionData {
    pub x: Array2<f64>,
    pub feature_names: Vec<String>,
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to parse the tab-separated input: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("The required column '{0}' was not found in the input file. Please check spelling and case.")]
    ColumnNotFound(String),

    #[error("The input file has no feature columns besides the target column '{0}'.")]
    NoFeatureColumns(String),

    #[error("The input file contains a header but no data rows.")]
    NoDataRows,

    #[error("Row {row}, column '{column}': could not parse '{value}' as a number.")]
    NotNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Row {row}, column '{column}': non-finite value (NaN or Infinity). All data must be finite.")]
    NonFinite { row: usize, column: String },

    #[error("Malformed table: {0}")]
    Shape(#[from] ShapeError),
}

/// Loads and validates data for fitting. The target column is required.
pub fn load_training_data(path: impl AsRef<Path>, target: &str) -> Result<TrainingData, DataError> {
    read_training_data(File::open(path)?, target)
}

/// Loads and validates data for prediction. A target column, if present, is ignored.
pub fn load_prediction_data(
    path: impl AsRef<Path>,
    target: &str,
) -> Result<PredictionData, DataError> {
    read_prediction_data(File::open(path)?, target)
}

pub fn read_training_data<R: Read>(reader: R, target: &str) -> Result<TrainingData, DataError> {
    let table = internal::read_table(reader)?;
    let target_idx = table
        .headers
        .iter()
        .position(|h| h == target)
        .ok_or_else(|| DataError::ColumnNotFound(target.to_string()))?;

    let (x, feature_names) = table.features_excluding(Some(target_idx), target)?;
    let y = table.column(target_idx);

    log::info!(
        "Loaded {} training rows with {} features.",
        y.len(),
        feature_names.len()
    );
    Ok(TrainingData {
        x,
        y,
        feature_names,
    })
}

pub fn read_prediction_data<R: Read>(
    reader: R,
    target: &str,
) -> Result<PredictionData, DataError> {
    let table = internal::read_table(reader)?;
    let target_idx = table.headers.iter().position(|h| h == target);
    let (x, feature_names) = table.features_excluding(target_idx, target)?;

    log::info!(
        "Loaded {} prediction rows with {} features.",
        x.nrows(),
        feature_names.len()
    );
    Ok(PredictionData { x, feature_names })
}

/// Internal module for shared table parsing.
mod internal {
    use super::*;

    /// A fully parsed, rectangular numeric table.
    pub(super) struct Table {
        pub headers: Vec<String>,
        pub values: Array2<f64>,
    }

    impl Table {
        pub fn column(&self, idx: usize) -> Array1<f64> {
            self.values.column(idx).to_owned()
        }

        /// Returns every column except `skip`, with their headers.
        pub fn features_excluding(
            &self,
            skip: Option<usize>,
            target: &str,
        ) -> Result<(Array2<f64>, Vec<String>), DataError> {
            let keep: Vec<usize> = (0..self.headers.len())
                .filter(|&i| Some(i) != skip)
                .collect();
            if keep.is_empty() {
                return Err(DataError::NoFeatureColumns(target.to_string()));
            }
            let names = keep.iter().map(|&i| self.headers[i].clone()).collect();
            let x = self.values.select(ndarray::Axis(1), &keep);
            Ok((x, names))
        }
    }

    pub(super) fn read_table<R: Read>(reader: R) -> Result<Table, DataError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(ShapeError::NoFeatures.into());
        }

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (row_idx, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(ShapeError::RaggedRows {
                    row: row_idx,
                    found: record.len(),
                    expected: headers.len(),
                }
                .into());
            }

            let mut row = Vec::with_capacity(headers.len());
            for (field, column) in record.iter().zip(headers.iter()) {
                let value: f64 = field.parse().map_err(|_| DataError::NotNumeric {
                    row: row_idx,
                    column: column.clone(),
                    value: field.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(DataError::NonFinite {
                        row: row_idx,
                        column: column.clone(),
                    });
                }
                row.push(value);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(DataError::NoDataRows);
        }

        let values = matrix_from_rows(&rows)?;
        Ok(Table { headers, values })
    }
}
