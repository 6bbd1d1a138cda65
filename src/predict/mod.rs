//! Read-only prediction service over a loaded scaler and classifier.
//!
//! A `Predictor` is built once at startup and shared (`Arc<Predictor>`) by every caller.
//! Nothing here mutates model state, so concurrent predictions need no locking.

mod batch;

pub use batch::{BatchSummary, BatchTable, PREDICTION_COLUMN, PROBABILITY_COLUMN};

use crate::config::CoercionPolicy;
use crate::error::Result;
use crate::features::{
    coerce_json, zero_fill_non_finite, Coerced, FeatureVector, FEATURE_COUNT, FEATURE_NAMES,
};
use crate::model::{artifact, LogisticModel, StandardScaler};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::path::Path;

/// `|weight|` per feature, in feature order. A property of the fitted model, not of any input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureImportance {
    values: [f64; FEATURE_COUNT],
}

impl FeatureImportance {
    pub fn from_model(model: &LogisticModel) -> Self {
        Self {
            values: model.importance(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        crate::features::index_of(name).map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    /// Most influential feature; the earlier feature wins a tie.
    pub fn top(&self) -> (&'static str, f64) {
        self.iter()
            .fold((FEATURE_NAMES[0], f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
    }
}

impl Serialize for FeatureImportance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, v) in self.iter() {
            map.serialize_entry(name, &v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// 1 = predicted to churn
    pub label: u8,
    pub probability: f64,
    pub importance: FeatureImportance,
}

impl Prediction {
    pub fn churns(&self) -> bool {
        self.label == 1
    }
}

pub struct Predictor {
    scaler: StandardScaler,
    model: LogisticModel,
    importance: FeatureImportance,
    policy: CoercionPolicy,
}

impl Predictor {
    pub fn new(scaler: StandardScaler, model: LogisticModel) -> Self {
        let importance = FeatureImportance::from_model(&model);
        Self {
            scaler,
            model,
            importance,
            policy: CoercionPolicy::default(),
        }
    }

    /// Load both artifacts from `model_dir`. Either one failing, or the two coming from
    /// different fits, is fatal; there is no partially loaded predictor.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let (scaler, model) = artifact::load_pair(model_dir)?;
        tracing::info!(model_dir = %model_dir.display(), "predictor ready");
        Ok(Self::new(scaler, model))
    }

    pub fn with_policy(mut self, policy: CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CoercionPolicy {
        self.policy
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn model(&self) -> &LogisticModel {
        &self.model
    }

    pub fn importance(&self) -> &FeatureImportance {
        &self.importance
    }

    /// Non-finite components are scored as 0, the same as coerced request fields.
    pub fn predict_one(&self, features: &FeatureVector) -> Prediction {
        let input = zero_fill_non_finite(features);
        let scaled = self.scaler.transform_one(&input.value);
        let probability = self.model.probability(&scaled);
        Prediction {
            label: LogisticModel::label_for(probability),
            probability,
            importance: self.importance,
        }
    }

    /// Coerce a JSON object (request body or form fields) and predict.
    pub fn predict_json(&self, body: &serde_json::Value) -> Result<Coerced<Prediction>> {
        let input = coerce_json(body, self.policy)?;
        Ok(Coerced {
            value: self.predict_one(&input.value),
            coerced: input.coerced,
        })
    }

    /// Predict every row and return the table with probability and label columns
    /// appended. All rows are coerced before any prediction, so a rejected cell aborts
    /// the whole batch.
    pub fn predict_batch(&self, table: &BatchTable) -> Result<BatchTable> {
        batch::predict_table(self, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn fixture() -> Predictor {
        Predictor::new(
            StandardScaler {
                mean: [650.0, 39.0, 5.0, 76000.0, 1.5, 0.7, 0.5, 100000.0],
                scale: [96.0, 10.5, 2.9, 62000.0, 0.58, 0.46, 0.5, 57500.0],
            },
            LogisticModel {
                weights: [-0.06, 0.75, -0.04, 0.16, -0.05, -0.02, -0.53, 0.03],
                intercept: -1.6,
            },
        )
    }

    #[test]
    fn importance_is_absolute_weight_in_order() {
        let p = fixture();
        let names: Vec<&str> = p.importance().iter().map(|(n, _)| n).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());
        assert_eq!(p.importance().get("active_member"), Some(0.53));
        assert_eq!(p.importance().top(), ("age", 0.75));
    }

    #[test]
    fn label_agrees_with_probability() {
        let p = fixture();
        for age in [18.0, 35.0, 50.0, 65.0, 80.0] {
            let fv = FeatureVector::new([650.0, age, 5.0, 100000.0, 2.0, 1.0, 0.0, 60000.0]);
            let out = p.predict_one(&fv);
            assert!((0.0..=1.0).contains(&out.probability));
            assert_eq!(out.label == 1, out.probability >= 0.5);
        }
    }

    #[test]
    fn json_output_shape() {
        let p = fixture();
        let out = p.predict_one(&FeatureVector::default());
        let v = serde_json::to_value(&out).unwrap();
        assert!(v["probability"].is_f64());
        assert_eq!(v["importance"].as_object().unwrap().len(), FEATURE_COUNT);
        assert_eq!(v["importance"]["age"], serde_json::json!(0.75));
    }

    #[test]
    fn non_finite_input_scores_as_zero() {
        let p = fixture();
        let zero_age = p.predict_one(&FeatureVector::new([650.0, 0.0, 5.0, 100000.0, 2.0, 1.0, 1.0, 60000.0]));
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let out = p.predict_one(&FeatureVector::new([650.0, bad, 5.0, 100000.0, 2.0, 1.0, 1.0, 60000.0]));
            assert!((0.0..=1.0).contains(&out.probability));
            assert_eq!(out, zero_age);
        }
    }
}
