//! Infrastructure Layer
//!
//! Adapters implementing the domain/application ports: the real transaction
//! log, position store, and event bus, plus the trade journal.

pub mod event_bus;
pub mod journal;
pub mod position_store;
pub mod transaction_log;

pub use event_bus::{BackpressurePolicy, EventBus};
pub use journal::{JournalEntry, TradeJournal};
pub use position_store::{Position, PositionStore, PositionStoreError};
pub use transaction_log::{RawLogRecord, TransactionLog, TransactionLogError};
