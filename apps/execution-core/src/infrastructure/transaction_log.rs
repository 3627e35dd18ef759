//! File-backed, checksummed transaction log (C2).
//!
//! One UTF-8 line per event: `"<crc32_hex>:<compact_json>\n"`. The JSON
//! object's keys are sorted (via `serde_json::Map`, a `BTreeMap` without the
//! `preserve_order` feature) so two writers of the same event always produce
//! the same bytes. Lines without the checksum prefix are accepted on read
//! for backward compatibility with pre-checksum logs.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::order_execution::events::OrderStateChanged;
use crate::domain::order_execution::ports::TransactionLogPort;
use crate::domain::shared::Timestamp;

#[derive(Debug, Error)]
pub enum TransactionLogError {
    #[error("transaction log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transaction log serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("transaction log corrupted at offset {offset}: checksum mismatch")]
    Corrupted { offset: usize },
    #[error("ORDER_* event missing required field {field}")]
    MissingField { field: &'static str },
}

/// One decoded line from the log.
#[derive(Debug, Clone)]
pub struct RawLogRecord {
    pub event_type: String,
    pub logged_at: Timestamp,
    pub fields: Map<String, Value>,
}

/// Append-only, checksummed, newline-delimited-JSON transaction log.
///
/// Implements [`TransactionLogPort`] by wrapping every `OrderStateChanged`
/// as an `ORDER_STATE_CHANGED` record, and additionally exposes
/// [`append_raw`](Self::append_raw)/[`events_of_type`](Self::events_of_type)
/// for the execution engine's `ORDER_SUBMIT`/`ORDER_SUBMIT_FAILED` events,
/// which are logged before the order even exists in the state machine and
/// so have no `OrderStateChanged` shape to wrap.
pub struct TransactionLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl TransactionLog {
    /// Open (creating if absent) the log file at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TransactionLogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append a raw, caller-shaped event. `event_type` starting with
    /// `"ORDER_"` must carry an `internal_order_id` field — this is a
    /// programmer-contract violation, not a recoverable error.
    ///
    /// # Errors
    ///
    /// Returns an error if the required field is missing, serialization
    /// fails, or the write fails.
    pub fn append_raw(&self, event_type: &str, mut fields: Map<String, Value>) -> Result<(), TransactionLogError> {
        if event_type.starts_with("ORDER_") && !fields.contains_key("internal_order_id") {
            return Err(TransactionLogError::MissingField {
                field: "internal_order_id",
            });
        }
        fields.insert("event_type".to_string(), Value::String(event_type.to_string()));
        fields.insert("logged_at".to_string(), Value::String(Timestamp::now().to_rfc3339()));

        let payload = serde_json::to_string(&fields)?;
        let checksum = crc32fast::hash(payload.as_bytes());
        let line = format!("{checksum:08x}:{payload}\n");

        let mut file = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        file.flush()?;
        let _ = file.sync_data();
        Ok(())
    }

    /// Read every record in append order, verifying checksums.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a line fails JSON
    /// parsing, or a checksummed line fails its checksum.
    pub fn read_all(&self) -> Result<Vec<RawLogRecord>, TransactionLogError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for (offset, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            records.push(parse_line(&line, offset)?);
        }
        Ok(records)
    }

    /// Every raw record of a given `event_type`, in append order.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`read_all`](Self::read_all).
    pub fn events_of_type(&self, event_type: &str) -> Result<Vec<RawLogRecord>, TransactionLogError> {
        Ok(self.read_all()?.into_iter().filter(|r| r.event_type == event_type).collect())
    }
}

fn parse_line(line: &str, offset: usize) -> Result<RawLogRecord, TransactionLogError> {
    let body = if let Some((prefix, rest)) = line.split_once(':') {
        if prefix.len() == 8 && prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            let expected = u32::from_str_radix(prefix, 16).unwrap_or(0);
            let actual = crc32fast::hash(rest.as_bytes());
            if actual != expected {
                return Err(TransactionLogError::Corrupted { offset });
            }
            rest
        } else {
            line
        }
    } else {
        line
    };

    let mut fields: Map<String, Value> = serde_json::from_str(body)?;
    let event_type = fields
        .remove("event_type")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let logged_at = fields
        .remove("logged_at")
        .and_then(|v| v.as_str().and_then(|s| Timestamp::parse(s).ok()))
        .unwrap_or_default();
    Ok(RawLogRecord {
        event_type,
        logged_at,
        fields,
    })
}

impl TransactionLogPort for TransactionLog {
    fn append(&self, event: &OrderStateChanged) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Value::Object(fields) = serde_json::to_value(event)? else {
            unreachable!("OrderStateChanged always serializes to a JSON object")
        };
        self.append_raw("ORDER_STATE_CHANGED", fields).map_err(|e| Box::new(e) as _)
    }

    fn replay(&self) -> Result<Vec<OrderStateChanged>, Box<dyn std::error::Error + Send + Sync>> {
        let records = self.events_of_type("ORDER_STATE_CHANGED").map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
        records
            .into_iter()
            .map(|r| serde_json::from_value(Value::Object(r.fields)).map_err(|e| Box::new(e) as _))
            .collect()
    }
}
