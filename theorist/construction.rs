use crate::terms::{Term, TermLayout};
use ndarray::{Array2, ArrayView2, Axis, Zip};
use thiserror::Error;

/// Additive guard used by every log term: `ln(x + LOG_EPSILON)`.
pub const LOG_EPSILON: f64 = 1e-8;

/// Shape problems with caller-provided matrices and vectors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("The input matrix has no feature columns; at least one feature is required.")]
    NoFeatures,

    #[error("The input matrix has no rows; at least one sample is required to fit a model.")]
    NoSamples,

    #[error("Row {row} has {found} values, but row 0 has {expected}. The input must be rectangular.")]
    RaggedRows {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Input has {found} feature columns, but the model expects {expected}.")]
    FeatureCountMismatch { found: usize, expected: usize },

    #[error("The input matrix has {x_rows} rows, but the target vector has {y_len} values.")]
    RowCountMismatch { x_rows: usize, y_len: usize },
}

/// Evaluates the guarded log term for a single value.
///
/// Non-positive inputs are clamped to zero before the shift, so the result is
/// always finite: `ln(max(x, 0) + 1e-8)`. For `x >= 0` this equals `ln(x + 1e-8)`.
#[inline]
pub fn guarded_log(x: f64) -> f64 {
    (x.max(0.0) + LOG_EPSILON).ln()
}

/// Converts row-major nested vectors into a raw input matrix, rejecting ragged input.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>, ShapeError> {
    let Some(first) = rows.first() else {
        return Err(ShapeError::NoSamples);
    };
    let n_features = first.len();
    if n_features == 0 {
        return Err(ShapeError::NoFeatures);
    }

    if let Some((row_idx, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != n_features)
    {
        return Err(ShapeError::RaggedRows {
            row: row_idx,
            found: row.len(),
            expected: n_features,
        });
    }

    Ok(Array2::from_shape_fn((rows.len(), n_features), |(r, c)| {
        rows[r][c]
    }))
}

/// Constructs the design matrix for `x` following the column order of `layout`.
///
/// This is a pure function of its inputs. Each column is filled by matching on the
/// term descriptor at that position, so the matrix can never disagree with the
/// layout that the equation formatter reads.
pub fn construct_design_matrix(
    x: ArrayView2<f64>,
    layout: &TermLayout,
) -> Result<Array2<f64>, ShapeError> {
    if x.ncols() == 0 {
        return Err(ShapeError::NoFeatures);
    }
    if x.ncols() != layout.n_features {
        return Err(ShapeError::FeatureCountMismatch {
            found: x.ncols(),
            expected: layout.n_features,
        });
    }

    let n_samples = x.nrows();
    let mut design = Array2::<f64>::zeros((n_samples, layout.len()));

    for (mut column, term) in design.axis_iter_mut(Axis(1)).zip(layout.iter()) {
        match *term {
            Term::Intercept => column.fill(1.0),
            Term::Linear(i) => column.assign(&x.column(i)),
            Term::Log(i) => {
                Zip::from(&mut column)
                    .and(x.column(i))
                    .for_each(|out, &v| *out = guarded_log(v));
            }
            Term::Interaction(i, j) => {
                Zip::from(&mut column)
                    .and(x.column(i))
                    .and(x.column(j))
                    .for_each(|out, &a, &b| *out = a * b);
            }
        }
    }

    log::trace!(
        "Constructed design matrix with shape ({}, {}).",
        design.nrows(),
        design.ncols()
    );

    Ok(design)
}
