//! SQLite-backed prediction history with AES-GCM encryption of the customer payload.
//! Key derived from a device-bound secret (in production: Secure Enclave / Keystore / DPAPI).

use crate::error::{ChurnError, Result};
use crate::features::FeatureVector;
use crate::predict::{BatchSummary, Prediction};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| ChurnError::Storage(e.to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|_| ChurnError::Storage("encryption failed".into()))?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| ChurnError::Storage(format!("payload encoding: {e}")))?;
    if raw.len() < NONCE_LEN {
        return Err(ChurnError::Storage("payload too short".into()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| ChurnError::Storage(e.to_string()))?;
    cipher
        .decrypt(nonce.into(), ct)
        .map_err(|_| ChurnError::Storage("payload decryption failed".into()))
}

/// Current time truncated to the millisecond precision stored on disk.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Single,
    Batch,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Single => "single",
            RecordKind::Batch => "batch",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(RecordKind::Single),
            "batch" => Some(RecordKind::Batch),
            _ => None,
        }
    }
}

/// One saved prediction. `data` holds the input features (single) or the batch summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: RecordKind,
    /// "Yes", "No" or "Batch"
    pub prediction: String,
    pub probability: f64,
    pub data: serde_json::Value,
}

impl HistoryRecord {
    pub fn single(user_id: &str, features: &FeatureVector, prediction: &Prediction) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            timestamp: now_millis(),
            kind: RecordKind::Single,
            prediction: if prediction.churns() { "Yes" } else { "No" }.to_string(),
            probability: prediction.probability,
            data: features.to_json(),
        }
    }

    pub fn batch(user_id: &str, summary: &BatchSummary) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            timestamp: now_millis(),
            kind: RecordKind::Batch,
            prediction: "Batch".to_string(),
            probability: summary.average_probability,
            data: serde_json::to_value(summary)?,
        })
    }
}

pub struct HistoryStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl HistoryStore {
    /// Open or create DB at path. Key is derived from `secret` (in production: device-bound).
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                kind TEXT NOT NULL,
                prediction TEXT NOT NULL,
                probability REAL NOT NULL,
                payload_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_predictions_user_ts ON predictions(user_id, ts);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ChurnError::Storage("history connection poisoned".into()))
    }

    /// Insert record (payload stored encrypted)
    pub fn insert(&self, record: &HistoryRecord) -> Result<()> {
        let enc = encrypt(&self.key, serde_json::to_string(&record.data)?.as_bytes())?;
        self.lock()?.execute(
            "INSERT OR REPLACE INTO predictions (id, user_id, ts, kind, prediction, probability, payload_enc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.user_id,
                record.timestamp.timestamp_millis(),
                record.kind.as_str(),
                record.prediction,
                record.probability,
                enc
            ],
        )?;
        Ok(())
    }

    pub fn record_single(
        &self,
        user_id: &str,
        features: &FeatureVector,
        prediction: &Prediction,
    ) -> Result<HistoryRecord> {
        let record = HistoryRecord::single(user_id, features, prediction);
        self.insert(&record)?;
        tracing::debug!(id = %record.id, "single prediction saved");
        Ok(record)
    }

    pub fn record_batch(&self, user_id: &str, summary: &BatchSummary) -> Result<HistoryRecord> {
        let record = HistoryRecord::batch(user_id, summary)?;
        self.insert(&record)?;
        tracing::debug!(id = %record.id, samples = summary.samples, "batch summary saved");
        Ok(record)
    }

    fn decode(&self, row: &Row<'_>) -> Result<HistoryRecord> {
        let ts: i64 = row.get(2)?;
        let kind: String = row.get(3)?;
        let enc: String = row.get(6)?;
        let plain = decrypt(&self.key, &enc)?;
        Ok(HistoryRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            timestamp: Utc
                .timestamp_millis_opt(ts)
                .single()
                .ok_or_else(|| ChurnError::Storage(format!("bad timestamp {ts}")))?,
            kind: RecordKind::parse(&kind)
                .ok_or_else(|| ChurnError::Storage(format!("unknown record kind `{kind}`")))?,
            prediction: row.get(4)?,
            probability: row.get(5)?,
            data: serde_json::from_slice(&plain)?,
        })
    }

    /// Read record by id (decrypt payload)
    pub fn get(&self, id: &str) -> Result<Option<HistoryRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, ts, kind, prediction, probability, payload_enc FROM predictions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.decode(row)?));
        }
        Ok(None)
    }

    /// Newest first.
    pub fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, ts, kind, prediction, probability, payload_enc FROM predictions
             WHERE user_id = ?1 ORDER BY ts DESC, rowid DESC LIMIT ?2",
        )?;
        let mut rows = stmt.query(params![user_id, limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(self.decode(row)?);
        }
        Ok(out)
    }

    /// Retention: delete records older than given timestamp (ms)
    pub fn prune_before(&self, ts_millis: i64) -> Result<u64> {
        let n = self
            .lock()?
            .execute("DELETE FROM predictions WHERE ts < ?1", params![ts_millis])?;
        Ok(n as u64)
    }
}
