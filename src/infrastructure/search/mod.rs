//! Hyperparameter search and reference trainer

mod linear;
mod random;

pub use linear::{default_hyperparameters, LinearRegressionTrainer, ARCHITECTURE, OBJECTIVE_METRIC};
pub use random::RandomSearch;
