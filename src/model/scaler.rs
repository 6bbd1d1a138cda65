//! Per-feature standardization fit on the training partition.

use crate::features::{FeatureVector, FEATURE_COUNT};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; FEATURE_COUNT],
    /// Population standard deviation; 1.0 for constant features
    pub scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Fit on rows `[n, FEATURE_COUNT]`. An empty input yields the identity transform.
    pub fn fit(rows: ArrayView2<'_, f64>) -> Self {
        let n = rows.nrows();
        let mut mean = [0.0; FEATURE_COUNT];
        let mut scale = [1.0; FEATURE_COUNT];
        if n == 0 {
            return Self { mean, scale };
        }
        for (j, col) in rows.axis_iter(Axis(1)).take(FEATURE_COUNT).enumerate() {
            let m = col.sum() / n as f64;
            let var = col.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / n as f64;
            let s = var.sqrt();
            mean[j] = m;
            scale[j] = if s < 10.0 * f64::EPSILON { 1.0 } else { s };
        }
        Self { mean, scale }
    }

    pub fn transform_one(&self, x: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (x.values[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    pub fn transform(&self, rows: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = rows.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        out
    }
}
