//! Risk band presentation for churn probabilities.

mod engine;

pub use engine::{RiskAssessment, RiskEngine, RiskLevel};
