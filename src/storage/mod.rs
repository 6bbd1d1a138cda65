//! Encrypted local storage for prediction history.

mod encrypted;

pub use encrypted::{HistoryRecord, HistoryStore, RecordKind};
