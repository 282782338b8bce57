use crate::construction::{LOG_EPSILON, ShapeError, construct_design_matrix};
use crate::equation::{default_feature_names, format_equation, standardized_feature_names};
use crate::estimate::{EstimationError, Solver, fit_coefficients};
use crate::terms::TermLayout;
use crate::transform::{TransformError, Transformer};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Printed in front of the equation by [`FittedModel::describe`].
pub const EQUATION_PREFIX: &str = "Discovered equation: ";

/// Printed by [`ParabolaRegressor::describe`] when no model has been fitted yet.
pub const NOT_FITTED_MESSAGE: &str = "model not fitted";

// --- Public Data Structures ---

/// Every switch of the fitting pipeline.
///
/// Missing fields take their default when read from a TOML file, so a config file only
/// needs the settings it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorConfig {
    /// Include the `log(x + 1e-8)` block in the design matrix.
    pub use_log: bool,
    /// Solve the ridge problem instead of plain least squares.
    pub use_ridge: bool,
    /// Ridge penalty. Ignored unless `use_ridge` is set.
    pub ridge_alpha: f64,
    /// Standardize every input column with statistics from the training data.
    pub standardize_inputs: bool,
    /// Fit against `log(y + 1e-8)` and exponentiate predictions back.
    pub log_target: bool,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        RegressorConfig {
            use_log: true,
            use_ridge: false,
            ridge_alpha: 1.0,
            standardize_inputs: false,
            log_target: false,
        }
    }
}

/// A fitted model. Immutable once produced by [`RegressorConfig::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub config: RegressorConfig,
    pub feature_names: Vec<String>,
    pub layout: TermLayout,
    pub transformer: Transformer,
    /// One coefficient per entry of `layout`, in the same order.
    pub coefficients: Array1<f64>,
}

/// Custom error type for model fitting, prediction, loading and saving.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid input shape: {0}")]
    Shape(#[from] ShapeError),

    #[error("The model has not been fitted. Call fit before predicting.")]
    NotFitted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Non-finite values (NaN or Infinity) were found in {0}. All inputs must be finite.")]
    NonFiniteInput(&'static str),

    #[error(
        "The log-target transform requires every target value to be greater than -1e-8, but found {0}."
    )]
    InvalidTarget(f64),

    #[error("{found} feature names were supplied for {expected} feature columns.")]
    MismatchedFeatureNames { found: usize, expected: usize },

    #[error("Coefficient estimation failed: {0}")]
    Estimation(#[from] EstimationError),

    #[error("Internal error: {0}")]
    InternalInvariant(String),

    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML file: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

impl From<TransformError> for ModelError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::NotFitted => ModelError::NotFitted,
            TransformError::Shape(shape) => ModelError::Shape(shape),
        }
    }
}

impl RegressorConfig {
    /// Loads a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let config: RegressorConfig = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.use_ridge && !(self.ridge_alpha.is_finite() && self.ridge_alpha >= 0.0) {
            return Err(ModelError::InvalidConfig(format!(
                "ridge_alpha must be finite and non-negative, but was {}",
                self.ridge_alpha
            )));
        }
        Ok(())
    }

    pub fn solver(&self) -> Solver {
        if self.use_ridge {
            Solver::Ridge {
                alpha: self.ridge_alpha,
            }
        } else {
            Solver::LeastSquares
        }
    }

    /// Builds the design matrix this configuration would fit against, without fitting.
    pub fn design_matrix(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        let layout = TermLayout::new(x.ncols(), self.use_log)?;
        Ok(construct_design_matrix(x, &layout)?)
    }

    /// Fits a model with the default feature symbols `x1 … xN`.
    pub fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<FittedModel, ModelError> {
        self.fit_with_names(x, y, default_feature_names(x.ncols()))
    }

    /// Fits a model whose equation uses `feature_names` as symbols.
    ///
    /// The pipeline is: input transform, design matrix, target transform, solve.
    pub fn fit_with_names(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        feature_names: Vec<String>,
    ) -> Result<FittedModel, ModelError> {
        // --- 1. Validate Inputs ---
        self.validate()?;
        if x.ncols() == 0 {
            return Err(ShapeError::NoFeatures.into());
        }
        if x.nrows() == 0 {
            return Err(ShapeError::NoSamples.into());
        }
        if x.nrows() != y.len() {
            return Err(ShapeError::RowCountMismatch {
                x_rows: x.nrows(),
                y_len: y.len(),
            }
            .into());
        }
        if feature_names.len() != x.ncols() {
            return Err(ModelError::MismatchedFeatureNames {
                found: feature_names.len(),
                expected: x.ncols(),
            });
        }
        if !x.iter().all(|v| v.is_finite()) {
            return Err(ModelError::NonFiniteInput("the input matrix"));
        }
        if !y.iter().all(|v| v.is_finite()) {
            return Err(ModelError::NonFiniteInput("the target vector"));
        }
        if self.log_target {
            if let Some(&bad) = y.iter().find(|&&v| v <= -LOG_EPSILON) {
                return Err(ModelError::InvalidTarget(bad));
            }
        }

        log::info!(
            "Fitting model on {} samples with {} features.",
            x.nrows(),
            x.ncols()
        );

        // --- 2. Transform and Expand ---
        let mut transformer = Transformer::new(self.standardize_inputs, self.log_target);
        let x_transformed = transformer.fit_transform_inputs(x)?;
        let y_transformed = transformer.maybe_log_target(y);

        let layout = TermLayout::new(x.ncols(), self.use_log)?;
        let design = construct_design_matrix(x_transformed.view(), &layout)?;
        log::debug!(
            "Design matrix: {} rows x {} terms ({} linear, {} log, {} quadratic).",
            design.nrows(),
            design.ncols(),
            layout.linear_cols.len(),
            layout.log_cols.len(),
            layout.interaction_cols.len()
        );

        // --- 3. Solve ---
        let coefficients = fit_coefficients(design.view(), y_transformed.view(), self.solver())?;
        if coefficients.len() != layout.len() {
            return Err(ModelError::InternalInvariant(format!(
                "solver returned {} coefficients for {} terms",
                coefficients.len(),
                layout.len()
            )));
        }

        let residual = &y_transformed - &design.dot(&coefficients);
        log::info!(
            "Fit complete. Training RMSE (on the fitted scale): {:.6e}",
            (residual.dot(&residual) / residual.len() as f64).sqrt()
        );

        Ok(FittedModel {
            config: self.clone(),
            feature_names,
            layout,
            transformer,
            coefficients,
        })
    }
}

impl FittedModel {
    pub fn n_features(&self) -> usize {
        self.layout.n_features
    }

    /// Predicts one value per row of `x`.
    ///
    /// Applies the training-time input transform, expands `x` with the stored layout,
    /// multiplies by the coefficients, and undoes the target transform.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ShapeError::FeatureCountMismatch {
                found: x.ncols(),
                expected: self.n_features(),
            }
            .into());
        }

        let x_transformed = self.transformer.transform_inputs(x)?;
        let design = construct_design_matrix(x_transformed.view(), &self.layout)?;
        let linear_predictor = design.dot(&self.coefficients);

        Ok(self.transformer.invert_target(linear_predictor.view()))
    }

    /// The fitted equation, e.g. `y = 0.100 + 2.000*x1 + …`.
    ///
    /// A standardized model's coefficients act on `z = (x - mean) / scale`, so its
    /// symbols read `z_x1`, `z_x2`, … and its log terms evaluate `ln(max(z, 0) + 1e-8)`.
    pub fn equation(&self) -> String {
        if self.transformer.standardization.is_some() {
            let symbols = standardized_feature_names(&self.feature_names);
            format_equation(self.coefficients.view(), &self.layout, &symbols)
        } else {
            format_equation(self.coefficients.view(), &self.layout, &self.feature_names)
        }
    }

    /// Writes `Discovered equation: y = …` followed by a newline.
    pub fn describe_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{EQUATION_PREFIX}{}", self.equation())
    }

    /// Prints the discovered equation to standard output.
    pub fn describe(&self) {
        println!("{EQUATION_PREFIX}{}", self.equation());
    }

    /// Saves the fitted model to a file in a human-readable TOML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a fitted model from a TOML file.
    ///
    /// The file is rejected unless every stored part agrees with the term layout, so a
    /// model that loads can always predict.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model: FittedModel = toml::from_str(&toml_string)?;
        model.check_consistency()?;
        Ok(model)
    }

    fn check_consistency(&self) -> Result<(), ModelError> {
        let n_features = self.layout.n_features;
        if self.coefficients.len() != self.layout.len() {
            return Err(ModelError::InternalInvariant(format!(
                "model file holds {} coefficients for {} terms",
                self.coefficients.len(),
                self.layout.len()
            )));
        }
        if self.feature_names.len() != n_features {
            return Err(ModelError::MismatchedFeatureNames {
                found: self.feature_names.len(),
                expected: n_features,
            });
        }
        if self.config.use_log != self.layout.use_log {
            return Err(ModelError::InternalInvariant(format!(
                "config use_log = {} but the term layout was built with use_log = {}",
                self.config.use_log, self.layout.use_log
            )));
        }

        let transformer = &self.transformer;
        match transformer.n_features {
            None => return Err(ModelError::NotFitted),
            Some(n) if n != n_features => {
                return Err(ModelError::InternalInvariant(format!(
                    "input transform was fitted on {n} features, but the layout has {n_features}"
                )));
            }
            Some(_) => {}
        }
        if transformer.standardize_inputs != self.config.standardize_inputs
            || transformer.log_target != self.config.log_target
        {
            return Err(ModelError::InternalInvariant(
                "input transform settings disagree with the stored configuration".to_string(),
            ));
        }
        if transformer.standardization.is_some() != transformer.standardize_inputs {
            return Err(ModelError::InternalInvariant(format!(
                "standardize_inputs = {} but standardization statistics are {}",
                transformer.standardize_inputs,
                if transformer.standardization.is_some() {
                    "present"
                } else {
                    "missing"
                }
            )));
        }
        if let Some(stats) = &transformer.standardization {
            if stats.mean.len() != n_features || stats.scale.len() != n_features {
                return Err(ModelError::InternalInvariant(format!(
                    "standardization holds {} means and {} scales for {} features",
                    stats.mean.len(),
                    stats.scale.len(),
                    n_features
                )));
            }
            if !stats.scale.iter().all(|s| s.is_finite() && *s > 0.0) {
                return Err(ModelError::InternalInvariant(
                    "standardization scales must be finite and positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Fit-in-place wrapper around [`FittedModel`] for callers that keep one estimator
/// object for the duration of an experiment.
#[derive(Debug, Clone, Default)]
pub struct ParabolaRegressor {
    config: RegressorConfig,
    fitted: Option<FittedModel>,
}

impl ParabolaRegressor {
    pub fn new(config: RegressorConfig) -> Self {
        ParabolaRegressor {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &RegressorConfig {
        &self.config
    }

    /// Fits the model and returns `self` for chaining.
    ///
    /// A failed fit leaves any previously fitted state untouched.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<&mut Self, ModelError> {
        let model = self.config.fit(x, y)?;
        self.fitted = Some(model);
        Ok(self)
    }

    pub fn fitted(&self) -> Option<&FittedModel> {
        self.fitted.as_ref()
    }

    pub fn coefficients(&self) -> Option<ArrayView1<'_, f64>> {
        self.fitted.as_ref().map(|m| m.coefficients.view())
    }

    pub fn term_layout(&self) -> Option<&TermLayout> {
        self.fitted.as_ref().map(|m| &m.layout)
    }

    /// Builds the design matrix for `x` under this estimator's configuration.
    /// Independent of any fitted state.
    pub fn design_matrix(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        self.config.design_matrix(x)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ModelError> {
        self.fitted.as_ref().ok_or(ModelError::NotFitted)?.predict(x)
    }

    /// Writes the discovered equation, or the not-fitted notice, to `writer`.
    pub fn describe_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match &self.fitted {
            Some(model) => model.describe_to(writer),
            None => writeln!(writer, "{NOT_FITTED_MESSAGE}"),
        }
    }

    /// Prints the discovered equation to standard output. Never fails.
    pub fn describe(&self) {
        match &self.fitted {
            Some(model) => model.describe(),
            None => println!("{NOT_FITTED_MESSAGE}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn reference_data() -> (Array2<f64>, Array1<f64>) {
        (
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
            array![1.0, 2.0, 3.0],
        )
    }

    #[test]
    fn fit_produces_one_coefficient_per_term() {
        let (x, y) = reference_data();
        let model = RegressorConfig::default().fit(x.view(), y.view()).unwrap();
        assert_eq!(model.coefficients.len(), 8);
        assert_eq!(model.coefficients.len(), model.layout.len());
    }

    #[test]
    fn predict_returns_one_value_per_row() {
        let (x, y) = reference_data();
        let model = RegressorConfig::default().fit(x.view(), y.view()).unwrap();

        let in_sample = model.predict(x.view()).unwrap();
        assert_eq!(in_sample.len(), 3);

        let out_of_sample = model.predict(array![[7.0, 8.0], [9.0, 10.0]].view()).unwrap();
        assert_eq!(out_of_sample.len(), 2);
        assert!(out_of_sample.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn minimum_norm_fit_interpolates_underdetermined_training_data() {
        let (x, y) = reference_data();
        let model = RegressorConfig::default().fit(x.view(), y.view()).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*p, *t, epsilon = 1e-6);
        }
    }

    #[test]
    fn row_count_mismatch_is_a_shape_error() {
        let (x, _) = reference_data();
        let y = array![1.0, 2.0];
        let err = RegressorConfig::default().fit(x.view(), y.view()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Shape(ShapeError::RowCountMismatch { x_rows: 3, y_len: 2 })
        ));
    }

    #[test]
    fn zero_features_is_a_shape_error() {
        let x = Array2::<f64>::zeros((3, 0));
        let y = array![1.0, 2.0, 3.0];
        let err = RegressorConfig::default().fit(x.view(), y.view()).unwrap_err();
        assert!(matches!(err, ModelError::Shape(ShapeError::NoFeatures)));
    }

    #[test]
    fn predict_rejects_wrong_feature_count() {
        let (x, y) = reference_data();
        let model = RegressorConfig::default().fit(x.view(), y.view()).unwrap();
        let err = model.predict(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Shape(ShapeError::FeatureCountMismatch {
                found: 3,
                expected: 2
            })
        ));
    }

    #[test]
    fn negative_ridge_alpha_is_a_config_error() {
        let (x, y) = reference_data();
        let config = RegressorConfig {
            use_ridge: true,
            ridge_alpha: -0.5,
            ..RegressorConfig::default()
        };
        let err = config.fit(x.view(), y.view()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig(_)));
    }

    #[test]
    fn log_target_rejects_targets_below_the_guard() {
        let (x, _) = reference_data();
        let config = RegressorConfig {
            log_target: true,
            ..RegressorConfig::default()
        };
        let err = config
            .fit(x.view(), array![1.0, -2.0, 3.0].view())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidTarget(v) if v == -2.0));
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let x = array![[1.0, f64::NAN], [3.0, 4.0]];
        let y = array![1.0, 2.0];
        let err = RegressorConfig::default().fit(x.view(), y.view()).unwrap_err();
        assert!(matches!(err, ModelError::NonFiniteInput(_)));
    }

    #[test]
    fn regressor_predict_before_fit_is_a_state_error() {
        let regressor = ParabolaRegressor::default();
        let err = regressor
            .predict(array![[1.0, 2.0]].view())
            .unwrap_err();
        assert!(matches!(err, ModelError::NotFitted));
        assert!(regressor.coefficients().is_none());
    }

    #[test]
    fn describe_before_fit_reports_not_fitted() {
        let regressor = ParabolaRegressor::default();
        let mut out = Vec::new();
        regressor.describe_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "model not fitted\n");
    }

    #[test]
    fn describe_after_fit_prints_the_equation() {
        let (x, y) = reference_data();
        let mut regressor = ParabolaRegressor::default();
        regressor.fit(x.view(), y.view()).unwrap();

        let mut out = Vec::new();
        regressor.describe_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Discovered equation: y ="));
        assert!(text.contains("*log(x1 + 1e-8)"));
        assert!(text.contains("*x1*x2"));
        assert!(text.trim_end().ends_with("*x2^2"));
    }

    #[test]
    fn failed_refit_keeps_the_previous_model() {
        let (x, y) = reference_data();
        let mut regressor = ParabolaRegressor::default();
        regressor.fit(x.view(), y.view()).unwrap();
        let before = regressor.fitted().cloned();

        assert!(regressor.fit(x.view(), array![1.0].view()).is_err());
        assert_eq!(regressor.fitted().cloned(), before);
    }

    #[test]
    fn design_matrix_does_not_need_a_fit() {
        let (x, _) = reference_data();
        let regressor = ParabolaRegressor::default();
        assert_eq!(regressor.design_matrix(x.view()).unwrap().dim(), (3, 8));
    }

    #[test]
    fn config_defaults_fill_missing_toml_fields() {
        let config: RegressorConfig = toml::from_str("use_ridge = true\nridge_alpha = 0.25\n").unwrap();
        assert!(config.use_log);
        assert!(config.use_ridge);
        assert_eq!(config.ridge_alpha, 0.25);
        assert!(!config.standardize_inputs);
        assert!(!config.log_target);
    }
}
