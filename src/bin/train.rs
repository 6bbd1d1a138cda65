//! Offline training job: reads the configured dataset, fits scaler + classifier on the
//! seeded split, prints the evaluation report and writes both artifacts.

use churn_predictor::{config::AppConfig, logging::StructuredLogger, training::Trainer};
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env();
    StructuredLogger::init(config.log.json, &config.log.level);

    info!(dataset = %config.dataset_path.display(), "training started");
    let trainer = Trainer::new(config.training.clone());
    let (trained, saved) = match trainer.run(&config.dataset_path, &config.model_dir) {
        Ok(out) => out,
        Err(e) => {
            error!(error = %e, "training failed");
            return Err(e.into());
        }
    };

    println!("Model Evaluation:");
    println!("{}", trained.report);
    println!();
    println!("Model files saved successfully:");
    println!("- {}", saved.model.display());
    println!("- {}", saved.scaler.display());
    Ok(())
}
