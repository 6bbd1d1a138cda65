//! Service configuration. Loaded from a JSON file; anything missing falls back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Labeled training data (CSV with the 8 feature columns plus `churn`)
    pub dataset_path: PathBuf,
    /// Directory holding `scaler.json` and `churn_model.json`
    pub model_dir: PathBuf,
    /// Data directory (history store)
    pub data_dir: PathBuf,
    pub training: TrainingConfig,
    pub features: FeaturesConfig,
    pub batch: BatchConfig,
    pub risk: RiskConfig,
    pub history: HistoryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of rows held out for evaluation
    pub test_ratio: f64,
    /// Seed for the train/test permutation
    pub seed: u32,
    /// Inverse L2 regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Newton step size (max-abs) below which the fit is considered converged
    pub tol: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// Missing or non-numeric values become 0.0 (with a warning)
    #[default]
    ZeroFill,
    /// Non-numeric values fail with `InvalidFeature`; missing ones still become 0.0
    Reject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub policy: CoercionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Upper bound on rows accepted by the CLI; the predictor itself imposes none
    pub max_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Probability at or above this is reported as high risk (0.0–1.0)
    pub high_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Owner recorded on each history entry
    pub user_id: String,
    pub list_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("datasets/BankCustomerData.csv"),
            model_dir: PathBuf::from("models"),
            data_dir: PathBuf::from(".churn"),
            training: TrainingConfig::default(),
            features: FeaturesConfig::default(),
            batch: BatchConfig::default(),
            risk: RiskConfig::default(),
            history: HistoryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
            c: 1.0,
            max_iter: 100,
            tol: 1e-10,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_rows: 100_000 }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.5,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_id: "local".to_string(),
            list_limit: 100,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl AppConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<AppConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    /// Resolve the config file from `CHURN_CONFIG_PATH` (default `config.json`) and load it.
    pub fn from_env() -> Self {
        let path = std::env::var("CHURN_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.json"));
        Self::load(&path)
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.data_dir.join("history.db")
    }
}
