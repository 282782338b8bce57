use crate::construction::ShapeError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The label attached to a single column of the design matrix.
///
/// Feature indices are zero-based column positions in the raw input matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    /// The constant column of ones.
    Intercept,
    /// The raw feature value `x_i`.
    Linear(usize),
    /// The guarded logarithm `ln(x_i + 1e-8)`.
    Log(usize),
    /// The product `x_i * x_j` with `i <= j`. When `i == j` this is the square `x_i^2`.
    Interaction(usize, usize),
}

impl Term {
    /// Returns true for the pure square terms `x_i^2`.
    pub fn is_square(&self) -> bool {
        matches!(self, Term::Interaction(i, j) if i == j)
    }
}

/// The ordered sequence of terms that defines the design matrix.
///
/// This is built once per fitted model and read by both the matrix construction
/// and the equation formatter, so the column order is defined in exactly one place:
/// intercept, linear terms, log terms (when enabled), then the upper-triangular
/// pairwise products enumerated row by row.
///
/// Only the shape parameters are serialized; the term sequence is rebuilt on load so
/// a stored model can never carry a layout that disagrees with this constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayoutShape", into = "LayoutShape")]
pub struct TermLayout {
    pub n_features: usize,
    pub use_log: bool,
    pub terms: Vec<Term>,
    pub intercept_col: usize,
    pub linear_cols: Range<usize>,
    /// Empty when log terms are disabled.
    pub log_cols: Range<usize>,
    pub interaction_cols: Range<usize>,
}

impl TermLayout {
    pub fn new(n_features: usize, use_log: bool) -> Result<Self, ShapeError> {
        if n_features == 0 {
            return Err(ShapeError::NoFeatures);
        }

        let expected = Self::expected_term_count(n_features, use_log);
        let mut terms = Vec::with_capacity(expected);

        let intercept_col = terms.len();
        terms.push(Term::Intercept);

        let linear_start = terms.len();
        terms.extend((0..n_features).map(Term::Linear));
        let linear_cols = linear_start..terms.len();

        let log_start = terms.len();
        if use_log {
            terms.extend((0..n_features).map(Term::Log));
        }
        let log_cols = log_start..terms.len();

        let interaction_start = terms.len();
        for i in 0..n_features {
            for j in i..n_features {
                terms.push(Term::Interaction(i, j));
            }
        }
        let interaction_cols = interaction_start..terms.len();

        debug_assert_eq!(terms.len(), expected);

        Ok(TermLayout {
            n_features,
            use_log,
            terms,
            intercept_col,
            linear_cols,
            log_cols,
            interaction_cols,
        })
    }

    /// `1 + f + f + f(f+1)/2` with log terms, `1 + f + f(f+1)/2` without.
    pub fn expected_term_count(n_features: usize, use_log: bool) -> usize {
        let log_terms = if use_log { n_features } else { 0 };
        1 + n_features + log_terms + n_features * (n_features + 1) / 2
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }
}

/// Serialized form of a [`TermLayout`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayoutShape {
    pub n_features: usize,
    pub use_log: bool,
}

impl TryFrom<LayoutShape> for TermLayout {
    type Error = ShapeError;

    fn try_from(shape: LayoutShape) -> Result<Self, Self::Error> {
        TermLayout::new(shape.n_features, shape.use_log)
    }
}

impl From<TermLayout> for LayoutShape {
    fn from(layout: TermLayout) -> Self {
        LayoutShape {
            n_features: layout.n_features,
            use_log: layout.use_log,
        }
    }
}

impl<'a> IntoIterator for &'a TermLayout {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}
