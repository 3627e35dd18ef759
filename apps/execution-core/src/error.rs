//! Top-level error aggregation for the execution core (§10.2).
//!
//! Component boundaries each own a narrow `thiserror` type (`OrderError`,
//! `BrokerError`, `PositionStoreError`, ...); this is the umbrella type the
//! runtime entry point maps those into when a failure needs to cross into
//! `anyhow`-flavored top-level error handling.

use thiserror::Error;

use crate::application::services::{ExecutionEngineError, RecoveryError};
use crate::domain::order_execution::errors::OrderError;
use crate::infrastructure::position_store::PositionStoreError;
use crate::infrastructure::transaction_log::TransactionLogError;

/// Any error that can surface from the execution core's subsystems.
#[derive(Debug, Error)]
pub enum ExecutionCoreError {
    #[error("order state error: {0}")]
    OrderState(#[from] OrderError),

    #[error("execution engine error: {0}")]
    ExecutionEngine(#[from] ExecutionEngineError),

    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("position store error: {0}")]
    PositionStore(#[from] PositionStoreError),

    #[error("transaction log error: {0}")]
    TransactionLog(#[from] TransactionLogError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}
