//! Tabular batch prediction over CSV input.

use super::Predictor;
use crate::error::{ChurnError, Result};
use crate::features::{coerce_cell, FEATURE_COUNT, FEATURE_NAMES};
use crate::model::LogisticModel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

pub const PROBABILITY_COLUMN: &str = "Churn Probability";
pub const PREDICTION_COLUMN: &str = "Churn Prediction";

/// Header plus string cells. Rows read from CSV have exactly `headers.len()` cells;
/// hand-built short rows are padded with missing cells on prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BatchTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Parse CSV with a header row. Short rows are padded with empty (missing) cells;
    /// input with no header, invalid UTF-8 or rows wider than the header is malformed.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(ChurnError::MalformedInput("no columns to parse".into()));
        }
        let width = headers.len();
        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() > width {
                return Err(ChurnError::MalformedInput(format!(
                    "row {}: expected {width} fields, saw {}",
                    i + 1,
                    record.len()
                )));
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = csv::Writer::from_writer(writer);
        let io = |e: csv::Error| ChurnError::Io(std::io::Error::new(std::io::ErrorKind::Other, e));
        w.write_record(&self.headers).map_err(io)?;
        for row in &self.rows {
            w.write_record(row).map_err(io)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of `name`, appending an empty column when absent.
    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(i) = self.column(name) {
            return i;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }
}

pub(super) fn predict_table(predictor: &Predictor, table: &BatchTable) -> Result<BatchTable> {
    let n = table.len();
    let cols: [Option<usize>; FEATURE_COUNT] = FEATURE_NAMES.map(|name| table.column(name));
    let absent: Vec<&str> = FEATURE_NAMES
        .iter()
        .zip(cols.iter())
        .filter(|(_, c)| c.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !absent.is_empty() && n > 0 {
        tracing::warn!(columns = ?absent, "batch is missing feature columns; treating as 0");
    }

    let width = table.headers.len();
    if let Some(i) = table.rows.iter().position(|r| r.len() > width) {
        return Err(ChurnError::MalformedInput(format!(
            "row {}: expected {width} fields, saw {}",
            i + 1,
            table.rows[i].len()
        )));
    }
    let mut out = table.clone();
    for row in &mut out.rows {
        row.resize(width, String::new());
    }
    let mut x = Array2::<f64>::zeros((n, FEATURE_COUNT));
    let mut coerced_cells = 0usize;
    for (i, row) in table.rows.iter().enumerate() {
        for (j, (name, col)) in FEATURE_NAMES.iter().zip(cols.iter()).enumerate() {
            let Some(col) = *col else {
                continue;
            };
            let (v, coerced) = coerce_cell(name, row.get(col).map(String::as_str), predictor.policy())?;
            x[[i, j]] = v;
            if coerced {
                coerced_cells += 1;
                out.rows[i][col] = "0".to_string();
            }
        }
    }
    if coerced_cells > 0 {
        tracing::warn!(cells = coerced_cells, "batch cells coerced to 0");
    }

    let scaled = predictor.scaler.transform(x.view());
    let prob_col = out.ensure_column(PROBABILITY_COLUMN);
    let label_col = out.ensure_column(PREDICTION_COLUMN);
    for (i, row) in scaled.rows().into_iter().enumerate() {
        let scaled_row: Vec<f64> = row.to_vec();
        let probability = predictor.model.probability(&scaled_row);
        out.rows[i][prob_col] = probability.to_string();
        out.rows[i][label_col] = LogisticModel::label_for(probability).to_string();
    }
    tracing::info!(rows = n, "batch predicted");
    Ok(out)
}

/// Aggregate over a predicted table, as stored in history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub samples: usize,
    pub positive_predictions: usize,
    /// 0.0 for an empty batch
    pub average_probability: f64,
}

impl BatchSummary {
    pub fn from_table(table: &BatchTable) -> Result<Self> {
        let missing = |c: &str| ChurnError::MalformedInput(format!("table has no `{c}` column"));
        let prob_col = table
            .column(PROBABILITY_COLUMN)
            .ok_or_else(|| missing(PROBABILITY_COLUMN))?;
        let label_col = table
            .column(PREDICTION_COLUMN)
            .ok_or_else(|| missing(PREDICTION_COLUMN))?;

        let mut sum = 0.0;
        let mut positive_predictions = 0;
        for (i, row) in table.rows.iter().enumerate() {
            let bad = |c: &str| ChurnError::MalformedInput(format!("row {}: bad `{c}` value", i + 1));
            let p: f64 = row
                .get(prob_col)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| bad(PROBABILITY_COLUMN))?;
            let l: u8 = row
                .get(label_col)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| bad(PREDICTION_COLUMN))?;
            sum += p;
            if l == 1 {
                positive_predictions += 1;
            }
        }
        let samples = table.len();
        Ok(Self {
            samples,
            positive_predictions,
            average_probability: if samples == 0 { 0.0 } else { sum / samples as f64 },
        })
    }
}
