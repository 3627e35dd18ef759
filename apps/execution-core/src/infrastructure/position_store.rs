//! Durable position store (C3) — an embedded ACID key-value store keyed by
//! symbol, backed by Turso (the Rust rewrite of SQLite).
//!
//! The public API is synchronous: the runtime's main loop is a single
//! cooperative thread, so this wraps Turso's async API in a dedicated
//! single-threaded Tokio runtime and blocks on it per call, the same way
//! the teacher's `StatePersistence` used Turso but from an async context.

use std::path::Path;
use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use turso::{Builder, Connection, Database, Value};

use crate::domain::shared::{Money, Quantity, Symbol, Timestamp};

/// A row in the position store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub entry_price: Money,
    pub entry_time: Timestamp,
    pub strategy: String,
    pub order_id: String,
    pub stop_loss: Option<Money>,
    pub take_profit: Option<Money>,
    pub current_price: Option<Money>,
    pub unrealized_pnl: Option<Money>,
}

#[derive(Debug, Error)]
pub enum PositionStoreError {
    #[error("position store connection error: {0}")]
    Connection(String),
    #[error("position store query error: {0}")]
    Query(String),
    #[error("stored value was not a parseable decimal: {0}")]
    InvalidDecimal(String),
    #[error("position store runtime error: {0}")]
    Runtime(String),
}

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS positions (
    symbol TEXT PRIMARY KEY,
    quantity TEXT NOT NULL,
    entry_price TEXT NOT NULL,
    entry_time TEXT NOT NULL,
    strategy TEXT NOT NULL,
    order_id TEXT NOT NULL,
    stop_loss TEXT,
    take_profit TEXT,
    current_price TEXT,
    unrealized_pnl TEXT
)";

/// Durable symbol -> `Position` store. Safe to open, close, and reopen
/// repeatedly against the same file: `close()` drops every handle before
/// returning.
pub struct PositionStore {
    runtime: tokio::runtime::Runtime,
    db: Database,
    conn: Mutex<Connection>,
}

impl PositionStore {
    /// Open (creating if absent) the position store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime, database file, or schema migration
    /// fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PositionStoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PositionStoreError::Runtime(e.to_string()))?;
        let path = path.as_ref().to_string_lossy().into_owned();
        let (db, conn) = runtime.block_on(async move {
            let db = Builder::new_local(&path)
                .build()
                .await
                .map_err(|e| PositionStoreError::Connection(e.to_string()))?;
            let conn = db.connect().map_err(|e| PositionStoreError::Connection(e.to_string()))?;
            conn.execute(CREATE_TABLE_SQL, ())
                .await
                .map_err(|e| PositionStoreError::Query(e.to_string()))?;
            Ok::<_, PositionStoreError>((db, conn))
        })?;
        Ok(Self {
            runtime,
            db,
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or schema migration fails.
    pub fn open_in_memory() -> Result<Self, PositionStoreError> {
        Self::open(":memory:")
    }

    /// Insert or replace the position for `position.symbol`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert(&self, position: &Position) -> Result<(), PositionStoreError> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let params: Vec<Value> = vec![
            Value::Text(position.symbol.as_str().to_string()),
            Value::Text(Decimal::from(position.quantity).to_string()),
            Value::Text(Decimal::from(position.entry_price).to_string()),
            Value::Text(position.entry_time.to_rfc3339()),
            Value::Text(position.strategy.clone()),
            Value::Text(position.order_id.clone()),
            position.stop_loss.map(|m| Value::Text(Decimal::from(m).to_string())).unwrap_or(Value::Null),
            position.take_profit.map(|m| Value::Text(Decimal::from(m).to_string())).unwrap_or(Value::Null),
            position.current_price.map(|m| Value::Text(Decimal::from(m).to_string())).unwrap_or(Value::Null),
            position.unrealized_pnl.map(|m| Value::Text(Decimal::from(m).to_string())).unwrap_or(Value::Null),
        ];
        self.runtime.block_on(async {
            conn.execute(
                "INSERT OR REPLACE INTO positions (
                    symbol, quantity, entry_price, entry_time, strategy, order_id,
                    stop_loss, take_profit, current_price, unrealized_pnl
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params,
            )
            .await
            .map_err(|e| PositionStoreError::Query(e.to_string()))
        })?;
        Ok(())
    }

    /// Look up the position for `symbol`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored decimal is corrupt.
    pub fn get(&self, symbol: &Symbol) -> Result<Option<Position>, PositionStoreError> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let symbol = symbol.clone();
        self.runtime.block_on(async move {
            let mut rows = conn
                .query(
                    "SELECT symbol, quantity, entry_price, entry_time, strategy, order_id,
                        stop_loss, take_profit, current_price, unrealized_pnl
                     FROM positions WHERE symbol = ?",
                    vec![Value::Text(symbol.as_str().to_string())],
                )
                .await
                .map_err(|e| PositionStoreError::Query(e.to_string()))?;
            match rows.next().await.map_err(|e| PositionStoreError::Query(e.to_string()))? {
                Some(row) => Ok(Some(row_to_position(&row)?)),
                None => Ok(None),
            }
        })
    }

    /// All positions currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored decimal is corrupt.
    pub fn get_all(&self) -> Result<Vec<Position>, PositionStoreError> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.runtime.block_on(async move {
            let mut rows = conn
                .query(
                    "SELECT symbol, quantity, entry_price, entry_time, strategy, order_id,
                        stop_loss, take_profit, current_price, unrealized_pnl
                     FROM positions",
                    (),
                )
                .await
                .map_err(|e| PositionStoreError::Query(e.to_string()))?;
            let mut positions = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| PositionStoreError::Query(e.to_string()))? {
                positions.push(row_to_position(&row)?);
            }
            Ok(positions)
        })
    }

    /// Remove the position for `symbol`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, symbol: &Symbol) -> Result<(), PositionStoreError> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let symbol = symbol.clone();
        self.runtime.block_on(async move {
            conn.execute("DELETE FROM positions WHERE symbol = ?", vec![Value::Text(symbol.as_str().to_string())])
                .await
                .map_err(|e| PositionStoreError::Query(e.to_string()))
        })?;
        Ok(())
    }

    /// Remove every position.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<(), PositionStoreError> {
        let conn = self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.runtime.block_on(async {
            conn.execute("DELETE FROM positions", ()).await.map_err(|e| PositionStoreError::Query(e.to_string()))
        })?;
        Ok(())
    }

    /// Release every handle. Safe to call even if the store is reopened
    /// immediately afterward against the same file.
    pub fn close(self) {
        drop(self.conn);
        drop(self.db);
        drop(self.runtime);
    }
}

fn row_to_position(row: &turso::Row) -> Result<Position, PositionStoreError> {
    let get_string = |idx: usize| -> Result<String, PositionStoreError> {
        row.get::<String>(idx).map_err(|e| PositionStoreError::Query(e.to_string()))
    };
    let get_decimal = |idx: usize| -> Result<Decimal, PositionStoreError> {
        get_string(idx)?.parse().map_err(|_| PositionStoreError::InvalidDecimal(format!("column {idx}")))
    };
    let get_optional_decimal = |idx: usize| -> Result<Option<Money>, PositionStoreError> {
        match row.get::<Option<String>>(idx).map_err(|e| PositionStoreError::Query(e.to_string()))? {
            Some(s) => {
                let d: Decimal =
                    s.parse().map_err(|_| PositionStoreError::InvalidDecimal(format!("column {idx}")))?;
                Ok(Some(Money::from(d)))
            }
            None => Ok(None),
        }
    };

    Ok(Position {
        symbol: Symbol::new(get_string(0)?),
        quantity: Quantity::from(get_decimal(1)?),
        entry_price: Money::from(get_decimal(2)?),
        entry_time: Timestamp::parse(&get_string(3)?).map_err(|e| PositionStoreError::InvalidDecimal(e.to_string()))?,
        strategy: get_string(4)?,
        order_id: get_string(5)?,
        stop_loss: get_optional_decimal(6)?,
        take_profit: get_optional_decimal(7)?,
        current_price: get_optional_decimal(8)?,
        unrealized_pnl: get_optional_decimal(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(symbol: &str, qty: i64) -> Position {
        Position {
            symbol: Symbol::new(symbol),
            quantity: Quantity::from_i64(qty),
            entry_price: Money::usd(100.0),
            entry_time: Timestamp::now(),
            strategy: "momentum".to_string(),
            order_id: "ord-1".to_string(),
            stop_loss: Some(Money::usd(95.0)),
            take_profit: None,
            current_price: None,
            unrealized_pnl: None,
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = PositionStore::open_in_memory().unwrap();
        store.upsert(&position("AAPL", 10)).unwrap();
        let loaded = store.get(&Symbol::new("AAPL")).unwrap().unwrap();
        assert_eq!(loaded.quantity, Quantity::from_i64(10));
        assert_eq!(loaded.stop_loss, Some(Money::usd(95.0)));
    }

    #[test]
    fn delete_removes_position() {
        let store = PositionStore::open_in_memory().unwrap();
        store.upsert(&position("AAPL", 10)).unwrap();
        store.delete(&Symbol::new("AAPL")).unwrap();
        assert!(store.get(&Symbol::new("AAPL")).unwrap().is_none());
    }

    #[test]
    fn reopen_after_close_does_not_lock() {
        let store = PositionStore::open_in_memory().unwrap();
        store.upsert(&position("AAPL", 10)).unwrap();
        store.close();

        let reopened = PositionStore::open_in_memory().unwrap();
        assert!(reopened.get_all().unwrap().is_empty());
    }

    #[test]
    fn get_all_returns_every_symbol() {
        let store = PositionStore::open_in_memory().unwrap();
        store.upsert(&position("AAPL", 10)).unwrap();
        store.upsert(&position("MSFT", 5)).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 2);
    }
}
