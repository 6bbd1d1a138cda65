//! Churn predictor entrypoint: loads the artifacts once, then serves one command.
//!
//! ```text
//! churn-predictor predict '<json object>'      single prediction, JSON line on stdout
//! churn-predictor batch <in.csv> [out.csv]     batch prediction, CSV to file or stdout
//! churn-predictor history                      saved predictions, newest first
//! ```

use churn_predictor::{
    config::AppConfig,
    logging::StructuredLogger,
    predict::{BatchSummary, BatchTable, Predictor},
    risk::RiskEngine,
    storage::HistoryStore,
    ChurnError,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const USAGE: &str = "usage: churn-predictor predict '<json>' | batch <in.csv> [out.csv] | history";

enum Command {
    Predict(String),
    Batch { input: PathBuf, output: Option<PathBuf> },
    History,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    match args.next().as_deref() {
        Some("predict") => args.next().map(Command::Predict).ok_or_else(|| USAGE.to_string()),
        Some("batch") => {
            let input = args.next().map(PathBuf::from).ok_or_else(|| USAGE.to_string())?;
            Ok(Command::Batch {
                input,
                output: args.next().map(PathBuf::from),
            })
        }
        Some("history") => Ok(Command::History),
        _ => Err(USAGE.to_string()),
    }
}

fn open_history(config: &AppConfig) -> Result<Option<HistoryStore>, BoxError> {
    if !config.history.enabled {
        return Ok(None);
    }
    std::fs::create_dir_all(&config.data_dir)?;
    let secret = std::env::var("CHURN_HISTORY_SECRET").unwrap_or_else(|_| {
        warn!("CHURN_HISTORY_SECRET not set; using placeholder secret");
        "device-secret-placeholder".to_string()
    });
    Ok(Some(HistoryStore::open(&config.history_db_path(), secret.as_bytes())?))
}

fn run_predict(
    config: &AppConfig,
    predictor: &Arc<Predictor>,
    history: Option<&HistoryStore>,
    body: &str,
) -> Result<(), BoxError> {
    let body: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ChurnError::MalformedInput(e.to_string()))?;
    let input = churn_predictor::features::coerce_json(&body, predictor.policy())?;
    let prediction = predictor.predict_one(&input.value);
    let risk = RiskEngine::new(config.risk.clone()).assess(&prediction);
    info!(
        probability = prediction.probability,
        label = prediction.label,
        level = ?risk.level,
        "prediction served"
    );

    if let Some(store) = history {
        store.record_single(&config.history.user_id, &input.value, &prediction)?;
    }

    let out = json!({
        "churn": prediction.label,
        "probability": (prediction.probability * 10_000.0).round() / 10_000.0,
        "feature_importance": prediction.importance,
        "risk": risk,
        "coerced": input.coerced,
    });
    StructuredLogger::emit_json(&out, &mut std::io::stdout().lock())?;
    Ok(())
}

fn run_batch(
    config: &AppConfig,
    predictor: &Arc<Predictor>,
    history: Option<&HistoryStore>,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), BoxError> {
    let table = BatchTable::from_path(input)?;
    if table.len() > config.batch.max_rows {
        return Err(ChurnError::MalformedInput(format!(
            "batch has {} rows, limit is {}",
            table.len(),
            config.batch.max_rows
        ))
        .into());
    }
    let predicted = predictor.predict_batch(&table)?;
    let summary = BatchSummary::from_table(&predicted)?;
    info!(
        samples = summary.samples,
        positive = summary.positive_predictions,
        average_probability = summary.average_probability,
        "batch complete"
    );

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            predicted.write_csv(std::io::BufWriter::new(file))?;
            info!(path = %path.display(), "batch results written");
        }
        None => predicted.write_csv(std::io::stdout().lock())?,
    }

    if let Some(store) = history {
        store.record_batch(&config.history.user_id, &summary)?;
    }
    Ok(())
}

fn run_history(config: &AppConfig, history: Option<&HistoryStore>) -> Result<(), BoxError> {
    let Some(store) = history else {
        warn!("history is disabled");
        return Ok(());
    };
    let records = store.list_for_user(&config.history.user_id, config.history.list_limit)?;
    let mut stdout = std::io::stdout().lock();
    for record in &records {
        StructuredLogger::emit_json(record, &mut stdout)?;
    }
    Ok(())
}

fn main() -> Result<(), BoxError> {
    let config = AppConfig::from_env();
    StructuredLogger::init(config.log.json, &config.log.level);

    let command = parse_args(std::env::args().skip(1))?;
    let history = open_history(&config)?;

    if let Command::History = command {
        return run_history(&config, history.as_ref());
    }

    // Loading failure is fatal: there is no degraded mode without both artifacts.
    let predictor = Arc::new(Predictor::load(&config.model_dir)?.with_policy(config.features.policy));

    match command {
        Command::Predict(body) => run_predict(&config, &predictor, history.as_ref(), &body),
        Command::Batch { input, output } => {
            run_batch(&config, &predictor, history.as_ref(), &input, output.as_deref())
        }
        Command::History => Ok(()),
    }
}
