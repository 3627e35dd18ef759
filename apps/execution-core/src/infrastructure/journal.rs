//! Daily-rotated trade journal (§10.4).
//!
//! Distinct from the [`TransactionLog`](super::transaction_log::TransactionLog):
//! the journal is an audit trail for operators and the health monitor, not
//! the write-ahead authority the state machine replays from. One file per
//! UTC calendar day at `{base}/trades/YYYY-MM-DD.jsonl`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Datelike;
use serde::Serialize;
use thiserror::Error;

use crate::domain::shared::Timestamp;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("trade journal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("trade journal serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One line of the trade journal. `schema_version` lets future readers
/// detect format changes without guessing from field presence.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub schema_version: u32,
    pub ts_utc: Timestamp,
    pub event_type: String,
    pub trade_id: String,
    pub internal_order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

const SCHEMA_VERSION: u32 = 1;

/// Appends journal entries to the file for the current UTC day, rotating to
/// a new file whenever the day changes. Feeds
/// [`SubsystemHealthMonitor`](crate::application::services::recovery::SubsystemHealthMonitor):
/// a write failure is reported to it rather than propagated to the caller,
/// since a journal outage must not block trading.
pub struct TradeJournal {
    base_dir: PathBuf,
    open_day: Mutex<Option<(i32, u32, u32)>>,
}

impl TradeJournal {
    /// `base_dir` is the root the runtime is configured with; entries land
    /// under `{base_dir}/trades/`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            open_day: Mutex::new(None),
        }
    }

    fn path_for(&self, now: Timestamp) -> PathBuf {
        let d = now.as_datetime();
        self.base_dir.join("trades").join(format!("{:04}-{:02}-{:02}.jsonl", d.year(), d.month(), d.day()))
    }

    /// Append one entry, rotating the file if the UTC day has changed since
    /// the last write.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write
    /// fails.
    pub fn record(&self, event_type: impl Into<String>, trade_id: impl Into<String>, internal_order_id: impl Into<String>, detail: Option<serde_json::Value>) -> Result<(), JournalError> {
        let now = Timestamp::now();
        let entry = JournalEntry {
            schema_version: SCHEMA_VERSION,
            ts_utc: now,
            event_type: event_type.into(),
            trade_id: trade_id.into(),
            internal_order_id: internal_order_id.into(),
            detail,
        };
        self.append(now, &entry)
    }

    fn append(&self, now: Timestamp, entry: &JournalEntry) -> Result<(), JournalError> {
        let path = self.path_for(now);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        let d = now.as_datetime();
        *self.open_day.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some((d.year(), d.month(), d.day()));
        Ok(())
    }
}
