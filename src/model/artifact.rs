//! Versioned on-disk layout for the fitted scaler and classifier.
//!
//! Each artifact is a JSON envelope:
//!
//! ```json
//! {
//!   "format": "churn-artifact",
//!   "version": 1,
//!   "kind": "standard_scaler",
//!   "fit_id": "<uuid shared by the scaler and model of one fit>",
//!   "feature_names": ["credit_score", "..."],
//!   "checksum": "<sha256 hex of the compact payload JSON>",
//!   "payload": { "mean": [...], "scale": [...] }
//! }
//! ```
//!
//! `logistic_regression` payloads carry `{ "weights": [...], "intercept": x }`. Floats
//! are written in shortest round-trip form, so a load returns the exact fitted values.
//!
//! Both files of a fit are staged next to their targets and renamed into place together.
//! [`load_pair`] refuses a scaler and model whose `fit_id`s differ.

use super::{LogisticModel, StandardScaler};
use crate::error::{ChurnError, Result};
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const ARTIFACT_FORMAT: &str = "churn-artifact";
pub const ARTIFACT_VERSION: u32 = 1;
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "churn_model.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    StandardScaler,
    LogisticRegression,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    kind: ArtifactKind,
    fit_id: String,
    feature_names: Vec<String>,
    checksum: String,
    payload: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScalerPayload {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelPayload {
    weights: Vec<f64>,
    intercept: f64,
}

pub fn scaler_path(dir: &Path) -> PathBuf {
    dir.join(SCALER_FILE)
}

pub fn model_path(dir: &Path) -> PathBuf {
    dir.join(MODEL_FILE)
}

fn checksum(payload: &serde_json::Value) -> Result<String> {
    let compact = serde_json::to_vec(payload)?;
    let mut h = Sha256::new();
    h.update(&compact);
    Ok(format!("{:x}", h.finalize()))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the envelope to a staging file beside `path` and return the staging path.
fn stage_envelope<P: Serialize>(path: &Path, kind: ArtifactKind, fit_id: &str, payload: &P) -> Result<PathBuf> {
    let payload = serde_json::to_value(payload)?;
    let envelope = Envelope {
        format: ARTIFACT_FORMAT.to_string(),
        version: ARTIFACT_VERSION,
        kind,
        fit_id: fit_id.to_string(),
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        checksum: checksum(&payload)?,
        payload,
    };
    let staged = staging_path(path);
    std::fs::write(&staged, serde_json::to_vec_pretty(&envelope)?)?;
    Ok(staged)
}

fn read_envelope<P: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<(P, String)> {
    let fail = |reason: String| ChurnError::ArtifactLoad {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
    let envelope: Envelope =
        serde_json::from_slice(&raw).map_err(|e| fail(format!("not an artifact envelope: {e}")))?;

    if envelope.format != ARTIFACT_FORMAT {
        return Err(fail(format!("unknown format `{}`", envelope.format)));
    }
    if envelope.version != ARTIFACT_VERSION {
        return Err(fail(format!("unsupported version {}", envelope.version)));
    }
    if envelope.kind != kind {
        return Err(fail(format!("expected {:?}, found {:?}", kind, envelope.kind)));
    }
    if envelope.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
        return Err(fail(format!(
            "feature order mismatch: {:?}",
            envelope.feature_names
        )));
    }
    let expected = checksum(&envelope.payload)?;
    if expected != envelope.checksum {
        return Err(fail("checksum mismatch".into()));
    }
    let payload =
        serde_json::from_value(envelope.payload).map_err(|e| fail(format!("bad payload: {e}")))?;
    Ok((payload, envelope.fit_id))
}

fn fixed(path: &Path, name: &str, v: &[f64]) -> Result<[f64; FEATURE_COUNT]> {
    let arr: [f64; FEATURE_COUNT] = v.try_into().map_err(|_| ChurnError::ArtifactLoad {
        path: path.to_path_buf(),
        reason: format!("`{name}` has {} values, expected {FEATURE_COUNT}", v.len()),
    })?;
    if arr.iter().any(|x| !x.is_finite()) {
        return Err(ChurnError::ArtifactLoad {
            path: path.to_path_buf(),
            reason: format!("`{name}` contains non-finite values"),
        });
    }
    Ok(arr)
}

/// Persist one fit into `dir` (created if absent), replacing any previous pair.
/// Returns the fit id recorded in both files.
pub fn save_pair(dir: &Path, scaler: &StandardScaler, model: &LogisticModel) -> Result<String> {
    std::fs::create_dir_all(dir)?;
    let fit_id = Uuid::new_v4().to_string();
    let scaler_payload = ScalerPayload {
        mean: scaler.mean.to_vec(),
        scale: scaler.scale.to_vec(),
    };
    let model_payload = ModelPayload {
        weights: model.weights.to_vec(),
        intercept: model.intercept,
    };

    let staged_scaler = stage_envelope(&scaler_path(dir), ArtifactKind::StandardScaler, &fit_id, &scaler_payload)?;
    let staged_model = match stage_envelope(&model_path(dir), ArtifactKind::LogisticRegression, &fit_id, &model_payload) {
        Ok(p) => p,
        Err(e) => {
            let _ = std::fs::remove_file(&staged_scaler);
            return Err(e);
        }
    };
    std::fs::rename(&staged_scaler, scaler_path(dir))?;
    std::fs::rename(&staged_model, model_path(dir))?;
    Ok(fit_id)
}

fn read_scaler(path: &Path) -> Result<(StandardScaler, String)> {
    let (p, fit_id): (ScalerPayload, String) = read_envelope(path, ArtifactKind::StandardScaler)?;
    let mean = fixed(path, "mean", &p.mean)?;
    let scale = fixed(path, "scale", &p.scale)?;
    if scale.iter().any(|s| *s <= 0.0) {
        return Err(ChurnError::ArtifactLoad {
            path: path.to_path_buf(),
            reason: "`scale` must be positive".into(),
        });
    }
    Ok((StandardScaler { mean, scale }, fit_id))
}

fn read_model(path: &Path) -> Result<(LogisticModel, String)> {
    let (p, fit_id): (ModelPayload, String) = read_envelope(path, ArtifactKind::LogisticRegression)?;
    let weights = fixed(path, "weights", &p.weights)?;
    if !p.intercept.is_finite() {
        return Err(ChurnError::ArtifactLoad {
            path: path.to_path_buf(),
            reason: "`intercept` is not finite".into(),
        });
    }
    Ok((
        LogisticModel {
            weights,
            intercept: p.intercept,
        },
        fit_id,
    ))
}

pub fn load_scaler(path: &Path) -> Result<StandardScaler> {
    read_scaler(path).map(|(scaler, _)| scaler)
}

pub fn load_model(path: &Path) -> Result<LogisticModel> {
    read_model(path).map(|(model, _)| model)
}

/// Load the scaler and model from `dir`. Both must come from the same fit.
pub fn load_pair(dir: &Path) -> Result<(StandardScaler, LogisticModel)> {
    let (scaler, scaler_fit) = read_scaler(&scaler_path(dir))?;
    let (model, model_fit) = read_model(&model_path(dir))?;
    if scaler_fit != model_fit {
        return Err(ChurnError::ArtifactLoad {
            path: model_path(dir),
            reason: format!("model fit {model_fit} does not match scaler fit {scaler_fit}"),
        });
    }
    Ok((scaler, model))
}
