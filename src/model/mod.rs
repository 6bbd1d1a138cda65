//! Fitted model state: feature scaler, logistic classifier and their on-disk artifacts.

pub mod artifact;
mod logistic;
mod scaler;

pub use logistic::{sigmoid, FitOutcome, LogisticModel, DECISION_THRESHOLD};
pub use scaler::StandardScaler;
