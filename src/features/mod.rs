//! Customer feature vector: the fixed-order model input shared by trainer and predictor.

mod coerce;

pub use coerce::{coerce_cell, coerce_json, zero_fill_non_finite, Coerced};

use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 8;

/// Column order used when the scaler and classifier are fit. Artifacts record it and
/// loading refuses any other order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "credit_score",
    "age",
    "tenure",
    "balance",
    "products_number",
    "credit_card",
    "active_member",
    "estimated_salary",
];

/// Label column in the training dataset
pub const LABEL_COLUMN: &str = "churn";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        index_of(name).map(|i| self.values[i])
    }

    /// Named pairs in feature order, e.g. for history payloads.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .named()
            .map(|(name, v)| (name.to_string(), serde_json::json!(v)))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self::new(values)
    }
}

/// Position of a feature in the fixed order.
pub fn index_of(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}
