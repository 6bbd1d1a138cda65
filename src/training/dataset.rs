//! Labeled training data: CSV with a header, the 8 feature columns and `churn`.
//!
//! Training input is strict. Every feature and label cell must be numeric; unlike the
//! prediction path nothing is zero-filled here.

use crate::error::{ChurnError, Result};
use crate::features::{FEATURE_COUNT, FEATURE_NAMES, LABEL_COLUMN};
use ndarray::{Array1, Array2};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Dataset {
    /// `[n, FEATURE_COUNT]` in `FEATURE_NAMES` order
    pub features: Array2<f64>,
    /// 0.0 / 1.0
    pub labels: Array1<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select(ndarray::Axis(0), indices),
            labels: self.labels.select(ndarray::Axis(0), indices),
        }
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).map_err(|source| ChurnError::DatasetNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let ds = read_dataset(std::io::BufReader::new(file))?;
    tracing::info!(path = %path.display(), rows = ds.len(), "dataset loaded");
    Ok(ds)
}

pub fn read_dataset<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ChurnError::MalformedInput(format!("dataset has no `{name}` column")))
    };
    let mut cols = [0usize; FEATURE_COUNT];
    for (slot, name) in cols.iter_mut().zip(FEATURE_NAMES) {
        *slot = column(name)?;
    }
    let label_col = column(LABEL_COLUMN)?;

    let mut values = Vec::new();
    let mut labels = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let cell = |idx: usize, name: &str| -> Result<f64> {
            let raw = record.get(idx).unwrap_or("").trim();
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    ChurnError::MalformedInput(format!(
                        "row {}: column `{name}` is not numeric: {raw:?}",
                        row + 1
                    ))
                })
        };
        for (idx, name) in cols.iter().zip(FEATURE_NAMES) {
            values.push(cell(*idx, name)?);
        }
        let label = cell(label_col, LABEL_COLUMN)?;
        if label != 0.0 && label != 1.0 {
            return Err(ChurnError::MalformedInput(format!(
                "row {}: `{LABEL_COLUMN}` must be 0 or 1, got {label}",
                row + 1
            )));
        }
        labels.push(label);
    }

    let n = labels.len();
    let features = Array2::from_shape_vec((n, FEATURE_COUNT), values)
        .map_err(|e| ChurnError::MalformedInput(e.to_string()))?;
    Ok(Dataset {
        features,
        labels: Array1::from_vec(labels),
    })
}
