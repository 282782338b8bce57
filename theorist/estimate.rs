//! # Coefficient Estimation
//!
//! Solves for the coefficient vector of the expanded design matrix. Two paths exist:
//!
//! 1.  **Least squares:** minimizes `||A c - y||^2` through the pseudo-inverse built
//!     from the SVD of `A`. Rank-deficient and underdetermined systems return the
//!     minimum-norm solution, which matters here because linear and log columns are
//!     often nearly collinear and small data sets have fewer rows than terms.
//!
//! 2.  **Ridge:** minimizes `||A c - y||^2 + alpha ||c||^2` from the same SVD using
//!     the filter factors `s / (s^2 + alpha)`. The intercept is an ordinary column of
//!     `A`, so it is penalized together with every other term.
//!
//! Both paths share one decomposition routine and discard singular values at or below
//! `SINGULAR_VALUE_RTOL * s_max`, so ridge with `alpha = 0` is the least-squares solution.

use ndarray::{Array1, ArrayView1, ArrayView2, Zip, s};
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::SVD;
use thiserror::Error;

/// Singular values below this fraction of the largest one are treated as zero.
pub const SINGULAR_VALUE_RTOL: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error(
        "The design matrix has {rows} rows, but the target vector has {targets} values. They must match."
    )]
    DimensionMismatch { rows: usize, targets: usize },

    #[error("Ridge alpha must be finite and non-negative, but was {0}.")]
    InvalidRidgeAlpha(f64),

    #[error("A linear algebra routine failed while solving for coefficients: {0}")]
    LinalgError(#[from] LinalgError),

    #[error("The singular value decomposition did not return the requested singular vectors.")]
    MissingSingularVectors,
}

/// Which objective the coefficients are fitted against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Solver {
    LeastSquares,
    Ridge { alpha: f64 },
}

/// Fits the coefficient vector for `design` against `y` with the chosen solver.
pub fn fit_coefficients(
    design: ArrayView2<f64>,
    y: ArrayView1<f64>,
    solver: Solver,
) -> Result<Array1<f64>, EstimationError> {
    log::debug!(
        "Solving for {} coefficients from {} samples with {:?}.",
        design.ncols(),
        design.nrows(),
        solver
    );
    if design.nrows() < design.ncols() {
        log::debug!("System is underdetermined; returning the minimum-norm solution.");
    }

    match solver {
        Solver::LeastSquares => solve_least_squares(design, y),
        Solver::Ridge { alpha } => solve_ridge(design, y, alpha),
    }
}

/// Minimum-norm least-squares solution of `design · c ≈ y`.
pub fn solve_least_squares(
    design: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<Array1<f64>, EstimationError> {
    check_dimensions(design, y)?;
    svd_filtered_solve(design, y, 0.0)
}

/// Ridge solution of `design · c ≈ y` with penalty `alpha ||c||^2` on every coefficient.
pub fn solve_ridge(
    design: ArrayView2<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
) -> Result<Array1<f64>, EstimationError> {
    check_dimensions(design, y)?;
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(EstimationError::InvalidRidgeAlpha(alpha));
    }
    svd_filtered_solve(design, y, alpha)
}

fn check_dimensions(design: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), EstimationError> {
    if design.nrows() != y.len() {
        return Err(EstimationError::DimensionMismatch {
            rows: design.nrows(),
            targets: y.len(),
        });
    }
    Ok(())
}

/// Computes `V · diag(f(s)) · U^T · y` with `f(s) = s / (s^2 + alpha)` on the retained
/// singular values and zero elsewhere.
fn svd_filtered_solve(
    design: ArrayView2<f64>,
    y: ArrayView1<f64>,
    alpha: f64,
) -> Result<Array1<f64>, EstimationError> {
    let (u_opt, singular, vt_opt) = design.svd(true, true)?;
    let u = u_opt.ok_or(EstimationError::MissingSingularVectors)?;
    let vt = vt_opt.ok_or(EstimationError::MissingSingularVectors)?;
    let k = singular.len();

    let s_max = singular.iter().copied().fold(0.0_f64, f64::max);
    let cutoff = SINGULAR_VALUE_RTOL * s_max;
    let rank = singular.iter().filter(|&&sv| sv > cutoff).count();
    log::debug!("Design matrix has numerical rank {} of {}.", rank, design.ncols());

    // Project y onto the left singular vectors, then shrink each component.
    let uty = u.slice(s![.., ..k]).t().dot(&y);
    let shrunk = Zip::from(&singular).and(&uty).map_collect(|&sv, &b| {
        if sv > cutoff {
            sv * b / (sv * sv + alpha)
        } else {
            0.0
        }
    });

    Ok(vt.slice(s![..k, ..]).t().dot(&shrunk))
}
