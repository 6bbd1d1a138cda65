//! Integration test: config load, train on a synthetic bank dataset, persist and reload
//! artifacts, then exercise single/batch prediction, risk banding and history storage.

use churn_predictor::{
    config::{AppConfig, RiskConfig, TrainingConfig},
    features::{FeatureVector, FEATURE_NAMES},
    model::artifact,
    predict::{BatchSummary, BatchTable, Predictor, PREDICTION_COLUMN, PROBABILITY_COLUMN},
    risk::{RiskEngine, RiskLevel},
    storage::{HistoryStore, RecordKind},
    training::Trainer,
    ChurnError,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCENARIO: [f64; 8] = [650.0, 40.0, 5.0, 100000.0, 2.0, 1.0, 1.0, 60000.0];

fn write_dataset(dir: &Path, rows: usize) -> PathBuf {
    let mut rng = StdRng::seed_from_u64(7);
    let mut csv = String::from(
        "customer_id,credit_score,country,gender,age,tenure,balance,products_number,credit_card,active_member,estimated_salary,churn\n",
    );
    for i in 0..rows {
        let credit: u32 = rng.gen_range(350..=850);
        let age: u32 = rng.gen_range(18..=80);
        let tenure: u32 = rng.gen_range(0..=10);
        let balance: f64 = if rng.gen_bool(0.35) {
            0.0
        } else {
            (rng.gen_range(20_000.0..220_000.0f64) * 100.0).round() / 100.0
        };
        let products: u32 = rng.gen_range(1..=4);
        let card: u32 = u32::from(rng.gen_bool(0.7));
        let active: u32 = u32::from(rng.gen_bool(0.5));
        let salary: f64 = (rng.gen_range(10_000.0..200_000.0f64) * 100.0).round() / 100.0;

        let z = 0.08 * (age as f64 - 42.0) - 1.0 * active as f64 + 0.000006 * (balance - 75_000.0)
            - 0.002 * (credit as f64 - 650.0)
            - 0.6;
        let p = 1.0 / (1.0 + (-z).exp());
        let churn = u32::from(rng.gen::<f64>() < p);

        csv.push_str(&format!(
            "{},{credit},France,Female,{age},{tenure},{balance},{products},{card},{active},{salary},{churn}\n",
            15_600_000 + i
        ));
    }
    let path = dir.join("BankCustomerData.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn trained_predictor(dir: &Path) -> Predictor {
    let dataset = write_dataset(dir, 400);
    let trainer = Trainer::new(TrainingConfig::default());
    trainer.run(&dataset, &dir.join("models")).unwrap();
    Predictor::load(&dir.join("models")).unwrap()
}

#[test]
fn config_load_default() {
    let c = AppConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.training.seed, 42);
    assert_eq!(c.training.test_ratio, 0.2);
    assert_eq!(c.model_dir, PathBuf::from("models"));
    assert!(c.history.enabled);
}

#[test]
fn config_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"model_dir": "artifacts", "features": {"policy": "reject"}}"#).unwrap();
    let c = AppConfig::load(&path);
    assert_eq!(c.model_dir, PathBuf::from("artifacts"));
    assert_eq!(c.features.policy, churn_predictor::config::CoercionPolicy::Reject);
    assert_eq!(c.training.seed, 42);
}

#[test]
fn train_persists_artifacts_that_reload_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), 400);
    let model_dir = dir.path().join("nested").join("models");

    let trainer = Trainer::new(TrainingConfig::default());
    let (trained, saved) = trainer.run(&dataset, &model_dir).unwrap();
    assert!(saved.scaler.exists());
    assert!(saved.model.exists());
    assert_eq!(trained.train_rows, 320);
    assert_eq!(trained.test_rows, 80);
    assert!(trained.converged);

    let r = &trained.report;
    assert!((0.0..=1.0).contains(&r.accuracy));
    assert_eq!(r.classes[0].support + r.classes[1].support, 80);
    let cells: usize = r.confusion.iter().flatten().sum();
    assert_eq!(cells, 80);

    let predictor = Predictor::load(&model_dir).unwrap();
    assert_eq!(predictor.scaler(), &trained.scaler);
    assert_eq!(predictor.model(), &trained.model);
}

#[test]
fn retraining_same_data_reproduces_probability() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), 400);
    let trainer = Trainer::new(TrainingConfig::default());
    trainer.run(&dataset, &dir.path().join("a")).unwrap();
    trainer.run(&dataset, &dir.path().join("b")).unwrap();

    let a = Predictor::load(&dir.path().join("a")).unwrap();
    let b = Predictor::load(&dir.path().join("b")).unwrap();
    let fv = FeatureVector::new(SCENARIO);
    let pa = a.predict_one(&fv);
    assert_eq!(pa.probability.to_bits(), b.predict_one(&fv).probability.to_bits());
    assert_eq!(pa.label, b.predict_one(&fv).label);

    // repeated calls on one predictor
    for _ in 0..10 {
        assert_eq!(a.predict_one(&fv), pa);
    }
}

#[test]
fn probabilities_are_bounded_and_labels_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());
    let extremes = [
        [0.0; 8],
        SCENARIO,
        [300.0, 18.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
        [850.0, 80.0, 10.0, 250_000.0, 4.0, 1.0, 0.0, 200_000.0],
        [1e9, 1e9, 1e9, 1e12, 1e9, 1.0, 0.0, 1e12],
        [-1e9, -1e9, -1e9, -1e12, -1e9, 0.0, 1.0, -1e12],
    ];
    for values in extremes {
        let out = predictor.predict_one(&FeatureVector::new(values));
        assert!((0.0..=1.0).contains(&out.probability), "{values:?}");
        assert_eq!(out.label == 1, out.probability >= 0.5, "{values:?}");
    }
}

#[test]
fn non_numeric_age_behaves_like_zero() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());

    let mut body = serde_json::Map::new();
    for (name, v) in FEATURE_NAMES.iter().zip(SCENARIO) {
        body.insert(name.to_string(), serde_json::json!(v));
    }
    body.insert("age".into(), serde_json::json!("abc"));
    let coerced = predictor.predict_json(&serde_json::Value::Object(body)).unwrap();
    assert_eq!(coerced.coerced, vec!["age"]);

    let mut zero_age = SCENARIO;
    zero_age[1] = 0.0;
    assert_eq!(coerced.value, predictor.predict_one(&FeatureVector::new(zero_age)));
}

#[test]
fn batch_row_equals_single_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());
    let csv = format!(
        "{}\n{}\n",
        FEATURE_NAMES.join(","),
        SCENARIO.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    );
    let out = predictor
        .predict_batch(&BatchTable::from_csv_reader(csv.as_bytes()).unwrap())
        .unwrap();
    let single = predictor.predict_one(&FeatureVector::new(SCENARIO));

    let prob: f64 = out.rows[0][out.column(PROBABILITY_COLUMN).unwrap()].parse().unwrap();
    let label: u8 = out.rows[0][out.column(PREDICTION_COLUMN).unwrap()].parse().unwrap();
    assert!((prob - single.probability).abs() < 1e-12);
    assert_eq!(label, single.label);

    let summary = BatchSummary::from_table(&out).unwrap();
    assert_eq!(summary.samples, 1);
    assert_eq!(summary.positive_predictions, usize::from(single.label));
}

#[test]
fn importance_does_not_depend_on_input() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());
    let a = predictor.predict_one(&FeatureVector::new(SCENARIO));
    let b = predictor.predict_one(&FeatureVector::default());
    assert_eq!(a.importance, b.importance);
    for (name, v) in a.importance.iter() {
        let i = FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        assert_eq!(v, predictor.model().weights[i].abs());
        assert!(v >= 0.0);
    }
}

#[test]
fn empty_batch_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());
    let table = BatchTable::from_csv_reader("credit_score,age\n".as_bytes()).unwrap();
    let out = predictor.predict_batch(&table).unwrap();
    assert!(out.is_empty());
    assert!(out.column(PROBABILITY_COLUMN).is_some());
    assert!(out.column(PREDICTION_COLUMN).is_some());
}

#[test]
fn predictor_is_shareable_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = Arc::new(trained_predictor(dir.path()));
    let expected = predictor.predict_one(&FeatureVector::new(SCENARIO));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let p = Arc::clone(&predictor);
            std::thread::spawn(move || p.predict_one(&FeatureVector::new(SCENARIO)))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

#[test]
fn missing_inputs_fail_with_typed_errors() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(TrainingConfig::default());
    let err = trainer
        .run(&dir.path().join("missing.csv"), &dir.path().join("models"))
        .unwrap_err();
    assert!(matches!(err, ChurnError::DatasetNotFound { .. }));

    assert!(matches!(
        Predictor::load(&dir.path().join("models")),
        Err(ChurnError::ArtifactLoad { .. })
    ));
}

#[test]
fn scaler_alone_is_not_a_usable_predictor() {
    let dir = tempfile::tempdir().unwrap();
    trained_predictor(dir.path());
    std::fs::remove_file(artifact::model_path(&dir.path().join("models"))).unwrap();
    assert!(matches!(
        Predictor::load(&dir.path().join("models")),
        Err(ChurnError::ArtifactLoad { .. })
    ));
}

#[test]
fn risk_engine_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());
    let engine = RiskEngine::new(RiskConfig::default());
    let mut p = predictor.predict_one(&FeatureVector::new(SCENARIO));

    p.probability = 0.732;
    let high = engine.assess(&p);
    assert_eq!(high.level, RiskLevel::High);
    assert_eq!(high.headline, "HIGH RISK (73.2% chance of churn)");
    assert!(!high.top_factor.contains('_'));

    p.probability = 0.1;
    assert_eq!(engine.assess(&p).level, RiskLevel::Low);
}

#[test]
fn history_roundtrip_and_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());
    let store = HistoryStore::open(&dir.path().join("history.db"), b"test-secret").unwrap();

    let fv = FeatureVector::new(SCENARIO);
    let pred = predictor.predict_one(&fv);
    let single = store.record_single("u1", &fv, &pred).unwrap();

    let table = predictor
        .predict_batch(&BatchTable::from_csv_reader("age\n30\n70\n".as_bytes()).unwrap())
        .unwrap();
    let summary = BatchSummary::from_table(&table).unwrap();
    let batch = store.record_batch("u1", &summary).unwrap();
    store.record_single("u2", &fv, &pred).unwrap();

    let got = store.get(&single.id).unwrap().unwrap();
    assert_eq!(got, single);
    assert_eq!(got.data["balance"], serde_json::json!(100000.0));
    assert_eq!(got.prediction, if pred.label == 1 { "Yes" } else { "No" });

    let list = store.list_for_user("u1", 100).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, batch.id);
    assert_eq!(list[0].kind, RecordKind::Batch);
    assert_eq!(list[0].data["samples"], serde_json::json!(2));
    assert_eq!(store.list_for_user("u1", 1).unwrap().len(), 1);

    assert!(store.get("nope").unwrap().is_none());
    let removed = store.prune_before(i64::MAX).unwrap();
    assert_eq!(removed, 3);
}

#[test]
fn history_payload_is_encrypted_at_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    let store = HistoryStore::open(&path, b"secret-a").unwrap();
    let fv = FeatureVector::new([123456.0, 40.0, 5.0, 100000.0, 2.0, 1.0, 1.0, 60000.0]);
    let pred = churn_predictor::predict::Prediction {
        label: 0,
        probability: 0.25,
        importance: *Predictor::new(
            churn_predictor::StandardScaler {
                mean: [0.0; 8],
                scale: [1.0; 8],
            },
            churn_predictor::LogisticModel {
                weights: [0.0; 8],
                intercept: 0.0,
            },
        )
        .importance(),
    };
    let rec = store.record_single("u", &fv, &pred).unwrap();
    drop(store);

    let raw = std::fs::read(&path).unwrap();
    let needle = b"123456";
    assert!(!raw.windows(needle.len()).any(|w| w == needle));

    let wrong_key = HistoryStore::open(&path, b"secret-b").unwrap();
    assert!(matches!(wrong_key.get(&rec.id), Err(ChurnError::Storage(_))));
}

#[test]
fn non_finite_features_stay_in_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = trained_predictor(dir.path());
    let mut zero_age = SCENARIO;
    zero_age[1] = 0.0;
    let expected = predictor.predict_one(&FeatureVector::new(zero_age));
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut values = SCENARIO;
        values[1] = bad;
        let out = predictor.predict_one(&FeatureVector::new(values));
        assert!((0.0..=1.0).contains(&out.probability));
        assert_eq!(out, expected);
    }
}

#[test]
fn model_and_scaler_from_separate_trainings_do_not_load() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), 400);
    let trainer = Trainer::new(TrainingConfig::default());
    trainer.run(&dataset, &dir.path().join("a")).unwrap();
    trainer.run(&dataset, &dir.path().join("b")).unwrap();

    std::fs::copy(
        artifact::scaler_path(&dir.path().join("b")),
        artifact::scaler_path(&dir.path().join("a")),
    )
    .unwrap();
    assert!(matches!(
        Predictor::load(&dir.path().join("a")),
        Err(ChurnError::ArtifactLoad { .. })
    ));
    assert!(Predictor::load(&dir.path().join("b")).is_ok());
}
