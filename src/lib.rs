//! Churn predictor — logistic-regression churn scoring for bank customers.
//!
//! Modular structure:
//! - [`features`] — Fixed-order customer feature vector and input coercion
//! - [`model`] — Standard scaler, logistic classifier and versioned artifacts
//! - [`training`] — Seeded split, fit and hold-out evaluation
//! - [`predict`] — Read-only single and batch prediction service
//! - [`risk`] — Risk band presentation
//! - [`storage`] — Encrypted prediction history
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod training;
pub mod predict;
pub mod risk;
pub mod storage;
pub mod logging;

pub use config::AppConfig;
pub use error::{ChurnError, Result};
pub use features::{FeatureVector, FEATURE_NAMES};
pub use model::{LogisticModel, StandardScaler};
pub use training::{EvaluationReport, Trainer};
pub use predict::{BatchSummary, BatchTable, Prediction, Predictor};
pub use risk::RiskEngine;
pub use storage::HistoryStore;
pub use logging::StructuredLogger;
