use crate::construction::LOG_EPSILON;
use crate::terms::{Term, TermLayout};
use itertools::Itertools;
use ndarray::ArrayView1;

/// Default symbols `x1 … xN` for unnamed features.
pub fn default_feature_names(n_features: usize) -> Vec<String> {
    (1..=n_features).map(|i| format!("x{i}")).collect()
}

/// Symbols for features that were standardized before expansion: `dose` becomes `z_dose`.
pub fn standardized_feature_names(feature_names: &[String]) -> Vec<String> {
    feature_names.iter().map(|name| format!("z_{name}")).collect()
}

/// The symbolic form of a single term, or `None` for the intercept.
pub fn term_symbol(term: &Term, feature_names: &[String]) -> Option<String> {
    match *term {
        Term::Intercept => None,
        Term::Linear(i) => Some(feature_names[i].clone()),
        Term::Log(i) => Some(format!("log({} + {:e})", feature_names[i], LOG_EPSILON)),
        Term::Interaction(i, _) if term.is_square() => Some(format!("{}^2", feature_names[i])),
        Term::Interaction(i, j) => Some(format!("{}*{}", feature_names[i], feature_names[j])),
    }
}

/// Renders `y = c0 + c1*x1 + …` by walking the coefficients and the layout in lockstep.
///
/// # Panics
/// If the coefficient count differs from the number of terms, or if fewer feature names
/// are supplied than the layout references. Either indicates that the coefficient vector
/// was produced for a different layout, which is a bug rather than bad input.
pub fn format_equation(
    coefficients: ArrayView1<f64>,
    layout: &TermLayout,
    feature_names: &[String],
) -> String {
    assert_eq!(
        coefficients.len(),
        layout.len(),
        "coefficient vector length does not match the term layout"
    );
    assert_eq!(
        feature_names.len(),
        layout.n_features,
        "feature name count does not match the term layout"
    );

    let rendered = coefficients
        .iter()
        .zip(layout.iter())
        .map(|(&coef, term)| match term_symbol(term, feature_names) {
            None => format!("{coef:.3}"),
            Some(symbol) => format!("{coef:.3}*{symbol}"),
        })
        .join(" + ");

    format!("y = {rendered}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn two_feature_equation_lists_every_term_in_layout_order() {
        let layout = TermLayout::new(2, true).unwrap();
        let coefficients = array![0.5, 1.0, -2.0, 0.25, 0.0, 3.0, -1.5, 0.125];
        let names = default_feature_names(2);

        let equation = format_equation(coefficients.view(), &layout, &names);
        assert_eq!(
            equation,
            "y = 0.500 + 1.000*x1 + -2.000*x2 + 0.250*log(x1 + 1e-8) + 0.000*log(x2 + 1e-8) \
             + 3.000*x1^2 + -1.500*x1*x2 + 0.125*x2^2"
        );
    }

    #[test]
    fn custom_names_replace_default_symbols() {
        let layout = TermLayout::new(1, false).unwrap();
        let coefficients = array![1.0, 2.0, 3.0];
        let names = vec!["dose".to_string()];
        assert_eq!(
            format_equation(coefficients.view(), &layout, &names),
            "y = 1.000 + 2.000*dose + 3.000*dose^2"
        );
    }

    #[test]
    fn log_symbol_uses_the_guard_constant() {
        let names = default_feature_names(3);
        assert_eq!(
            term_symbol(&Term::Log(2), &names).as_deref(),
            Some("log(x3 + 1e-8)")
        );
        assert_eq!(term_symbol(&Term::Intercept, &names), None);
    }

    #[test]
    fn standardized_symbols_carry_the_z_prefix() {
        let layout = TermLayout::new(1, true).unwrap();
        let coefficients = array![0.0, 1.0, 2.0, 3.0];
        let names = standardized_feature_names(&["dose".to_string()]);
        assert_eq!(
            format_equation(coefficients.view(), &layout, &names),
            "y = 0.000 + 1.000*z_dose + 2.000*log(z_dose + 1e-8) + 3.000*z_dose^2"
        );
    }

    #[test]
    #[should_panic(expected = "coefficient vector length does not match the term layout")]
    fn misaligned_coefficients_panic() {
        let layout = TermLayout::new(2, true).unwrap();
        let coefficients = array![1.0, 2.0, 3.0];
        format_equation(coefficients.view(), &layout, &default_feature_names(2));
    }
}
