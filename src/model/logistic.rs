//! Binary logistic regression with L2 penalty on the weights (intercept unpenalized).
//!
//! Fit minimizes `C * Σ logloss + ½‖w‖²`, solved with damped Newton steps. The problem
//! is strictly convex, so the optimum is the one any lbfgs/newton solver of the same
//! objective converges to.

use crate::config::TrainingConfig;
use crate::error::{ChurnError, Result};
use crate::features::FEATURE_COUNT;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Decision threshold on the probability.
pub const DECISION_THRESHOLD: f64 = 0.5;

const PARAMS: usize = FEATURE_COUNT + 1;
const ARMIJO: f64 = 1e-4;
const MIN_STEP: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: [f64; FEATURE_COUNT],
    pub intercept: f64,
}

#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub model: LogisticModel,
    pub iterations: usize,
    pub converged: bool,
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

impl LogisticModel {
    pub fn decision(&self, scaled: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(scaled)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }

    pub fn probability(&self, scaled: &[f64]) -> f64 {
        sigmoid(self.decision(scaled))
    }

    pub fn label_for(probability: f64) -> u8 {
        u8::from(probability >= DECISION_THRESHOLD)
    }

    /// Global importance: `|w_i|` in feature order.
    pub fn importance(&self) -> [f64; FEATURE_COUNT] {
        self.weights.map(f64::abs)
    }

    /// Fit on scaled rows `[n, FEATURE_COUNT]` and 0/1 labels.
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, cfg: &TrainingConfig) -> Result<FitOutcome> {
        let n = x.nrows();
        if n == 0 {
            return Err(ChurnError::Training("no training rows".into()));
        }
        if x.ncols() != FEATURE_COUNT || y.len() != n {
            return Err(ChurnError::Training(format!(
                "shape mismatch: x {:?}, y {}",
                x.dim(),
                y.len()
            )));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(ChurnError::Training("labels must be 0 or 1".into()));
        }
        let positives = y.sum();
        if positives == 0.0 || positives == n as f64 {
            return Err(ChurnError::Training(
                "training partition needs samples of both classes".into(),
            ));
        }

        let mut a = Array2::<f64>::ones((n, PARAMS));
        a.slice_mut(ndarray::s![.., ..FEATURE_COUNT]).assign(&x);

        let c = cfg.c;
        let mut theta = Array1::<f64>::zeros(PARAMS);
        let mut loss = objective(&a, y, &theta, c);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < cfg.max_iter {
            iterations += 1;
            let z = a.dot(&theta);
            let p = z.mapv(sigmoid);

            let mut grad = a.t().dot(&(&p - &y)) * c;
            for j in 0..FEATURE_COUNT {
                grad[j] += theta[j];
            }

            let s = p.mapv(|pi| pi * (1.0 - pi) * c);
            let weighted = &a * &s.view().insert_axis(ndarray::Axis(1));
            let mut hess = a.t().dot(&weighted);
            for j in 0..FEATURE_COUNT {
                hess[[j, j]] += 1.0;
            }

            let step = cholesky_solve(&hess, &grad).ok_or_else(|| {
                ChurnError::Training("hessian is not positive definite".into())
            })?;

            let slope = grad.dot(&step);
            let mut t = 1.0;
            let mut next = &theta - &(&step * t);
            let mut next_loss = objective(&a, y, &next, c);
            while next_loss > loss - ARMIJO * t * slope && t > MIN_STEP {
                t *= 0.5;
                next = &theta - &(&step * t);
                next_loss = objective(&a, y, &next, c);
            }

            let moved = step.iter().fold(0.0f64, |m, d| m.max((d * t).abs()));
            theta = next;
            loss = next_loss;
            if moved < cfg.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(iterations, "logistic regression did not converge");
        }

        let mut weights = [0.0; FEATURE_COUNT];
        for (j, w) in weights.iter_mut().enumerate() {
            *w = theta[j];
        }
        Ok(FitOutcome {
            model: LogisticModel {
                weights,
                intercept: theta[FEATURE_COUNT],
            },
            iterations,
            converged,
        })
    }
}

fn objective(a: &Array2<f64>, y: ArrayView1<'_, f64>, theta: &Array1<f64>, c: f64) -> f64 {
    let z = a.dot(theta);
    let data: f64 = z
        .iter()
        .zip(y.iter())
        .map(|(&zi, &yi)| softplus(zi) - yi * zi)
        .sum();
    let penalty: f64 = theta.iter().take(FEATURE_COUNT).map(|w| w * w).sum::<f64>() * 0.5;
    c * data + penalty
}

/// Solve `h · x = b` for symmetric positive definite `h`.
fn cholesky_solve(h: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = h[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    // forward: L y = b
    let mut fwd = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * fwd[k];
        }
        fwd[i] = sum / l[[i, i]];
    }
    // back: Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = fwd[i];
        for k in i + 1..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Some(x)
}
