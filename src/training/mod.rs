//! Offline trainer: dataset → seeded split → scaler + classifier → evaluation → artifacts.

mod dataset;
mod report;
mod split;

pub use dataset::{load_dataset, read_dataset, Dataset};
pub use report::{ClassMetrics, EvaluationReport};
pub use split::{permutation, train_test_split, SplitIndices};

use crate::config::TrainingConfig;
use crate::error::Result;
use crate::model::{artifact, LogisticModel, StandardScaler};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything produced by one fit. Only the scaler and model are persisted.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub model: LogisticModel,
    pub report: EvaluationReport,
    pub train_rows: usize,
    pub test_rows: usize,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct SavedArtifacts {
    pub scaler: PathBuf,
    pub model: PathBuf,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit on `dataset`. The scaler sees training rows only.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainedModel> {
        let split = train_test_split(dataset.len(), self.config.test_ratio, self.config.seed)?;
        let train = dataset.select(&split.train);
        let test = dataset.select(&split.test);
        info!(
            train_rows = train.len(),
            test_rows = test.len(),
            seed = self.config.seed,
            "dataset split"
        );

        let scaler = StandardScaler::fit(train.features.view());
        let x_train = scaler.transform(train.features.view());
        let fit = LogisticModel::fit(x_train.view(), train.labels.view(), &self.config)?;
        info!(
            iterations = fit.iterations,
            converged = fit.converged,
            intercept = fit.model.intercept,
            "classifier fitted"
        );

        let x_test = scaler.transform(test.features.view());
        let predicted: Vec<u8> = x_test
            .rows()
            .into_iter()
            .map(|row| {
                let scaled: Vec<f64> = row.to_vec();
                LogisticModel::label_for(fit.model.probability(&scaled))
            })
            .collect();
        let actual: Vec<u8> = test.labels.iter().map(|&l| l as u8).collect();
        let report = EvaluationReport::compute(&predicted, &actual);
        info!(accuracy = report.accuracy, "evaluation complete");

        Ok(TrainedModel {
            scaler,
            model: fit.model,
            report,
            train_rows: train.len(),
            test_rows: test.len(),
            iterations: fit.iterations,
            converged: fit.converged,
        })
    }

    /// Write both artifacts into `model_dir`, creating it if needed. Existing files are replaced.
    pub fn save(&self, trained: &TrainedModel, model_dir: &Path) -> Result<SavedArtifacts> {
        let fit_id = artifact::save_pair(model_dir, &trained.scaler, &trained.model)?;
        let saved = SavedArtifacts {
            scaler: artifact::scaler_path(model_dir),
            model: artifact::model_path(model_dir),
        };
        info!(
            fit_id = %fit_id,
            scaler = %saved.scaler.display(),
            model = %saved.model.display(),
            "artifacts saved"
        );
        Ok(saved)
    }

    /// Load, fit, persist. The caller prints the report.
    pub fn run(&self, dataset_path: &Path, model_dir: &Path) -> Result<(TrainedModel, SavedArtifacts)> {
        let dataset = load_dataset(dataset_path)?;
        let trained = self.train(&dataset)?;
        let saved = self.save(&trained, model_dir)?;
        Ok((trained, saved))
    }
}
