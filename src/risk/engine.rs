//! Maps a churn probability onto a risk band with a short human-readable headline.

use crate::config::RiskConfig;
use crate::predict::Prediction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64, config: &RiskConfig) -> Self {
        if probability >= config.high_threshold {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW RISK",
            RiskLevel::High => "HIGH RISK",
        }
    }
}

/// Presentation of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Probability as a percentage (0–100)
    pub percent: f64,
    pub top_factor: String,
    pub headline: String,
}

pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, prediction: &Prediction) -> RiskAssessment {
        let level = RiskLevel::from_probability(prediction.probability, &self.config);
        let percent = prediction.probability * 100.0;
        let (top, _) = prediction.importance.top();
        RiskAssessment {
            level,
            percent,
            top_factor: top.replace('_', " "),
            headline: format!("{} ({:.1}% chance of churn)", level.as_str(), percent),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}
