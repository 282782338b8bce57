#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod construction;
pub mod data;
pub mod equation;
pub mod estimate;
pub mod model;
pub mod terms;
pub mod transform;

pub use construction::{LOG_EPSILON, ShapeError, construct_design_matrix, matrix_from_rows};
pub use model::{FittedModel, ModelError, ParabolaRegressor, RegressorConfig};
pub use terms::{Term, TermLayout};
