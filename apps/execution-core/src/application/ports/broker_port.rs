//! Broker Port (Driven Port, C7)
//!
//! The contract the execution core consumes from a brokerage. A concrete
//! real implementation lives outside this core; [`NullExecution`] satisfies
//! the same contract for dry-run and testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::order_execution::value_objects::{OrderSide, OrderType};
use crate::domain::shared::{BrokerId, Money, OrderId, Quantity, Symbol};

/// Broker-reported order status string. Kept as a plain string rather than
/// an enum: different brokers use different vocabularies, and the core only
/// ever compares it for equality against what it submitted.
pub type BrokerOrderStatus = String;

#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("broker connection error: {message}")]
    Connection { message: String },
    #[error("broker rejected the order: {reason}")]
    Rejected { reason: String },
    #[error("broker order not found: {broker_order_id}")]
    NotFound { broker_order_id: BrokerId },
    #[error("broker call timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },
    #[error("broker error: {message}")]
    Other { message: String },
}

/// Account-level figures the risk manager and reconciler need.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub portfolio_value: Money,
    pub buying_power: Money,
}

/// A position as the broker sees it — ground truth for reconciliation.
#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub avg_entry_price: Money,
}

/// An open order as the broker sees it — ground truth for reconciliation.
#[derive(Debug, Clone)]
pub struct BrokerOpenOrder {
    pub broker_order_id: BrokerId,
    pub client_order_id: Option<OrderId>,
    pub symbol: Symbol,
    pub status: BrokerOrderStatus,
}

/// `(filled_qty, fill_price)`, or `None` if nothing has filled yet.
pub type FillDetails = Option<(Quantity, Money)>;

/// The contract the execution core consumes from a brokerage (C7).
#[async_trait]
pub trait Broker: Send + Sync {
    /// Submit a new order; returns the broker-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the broker rejects or cannot reach the
    /// order.
    async fn submit_order(
        &self,
        symbol: &Symbol,
        quantity: Quantity,
        side: OrderSide,
        order_type: OrderType,
        limit_price: Option<Money>,
        stop_price: Option<Money>,
    ) -> Result<BrokerId, BrokerError>;

    /// Cancel a previously submitted order. Returns whether the cancel was
    /// accepted (an order already filled or already cancelled returns
    /// `false`, not an error).
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the broker cannot be reached.
    async fn cancel_order(&self, broker_order_id: &BrokerId) -> Result<bool, BrokerError>;

    /// Current status of a previously submitted order.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotFound`] if the broker has no record of it.
    async fn get_order_status(&self, broker_order_id: &BrokerId) -> Result<BrokerOrderStatus, BrokerError>;

    /// Fill details for an order, if any fill has happened.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the broker cannot be reached.
    async fn get_fill_details(&self, broker_order_id: &BrokerId) -> Result<FillDetails, BrokerError>;

    /// Ground-truth positions, for reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the broker cannot be reached.
    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Ground-truth open orders, for reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the broker cannot be reached.
    async fn get_open_orders(&self) -> Result<Vec<BrokerOpenOrder>, BrokerError>;

    /// Account-level figures for the risk manager.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the broker cannot be reached.
    async fn get_account_info(&self) -> Result<AccountInfo, BrokerError>;
}

/// A `Broker` that fills every order immediately at the submitted (or a
/// nominal) price, for dry-run mode and tests that don't care about broker
/// behavior beyond "it works".
pub struct NullExecution {
    next_id: AtomicU64,
    filled: Mutex<HashMap<BrokerId, (Quantity, Money)>>,
}

impl NullExecution {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            filled: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for NullExecution {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for NullExecution {
    async fn submit_order(
        &self,
        _symbol: &Symbol,
        quantity: Quantity,
        _side: OrderSide,
        _order_type: OrderType,
        limit_price: Option<Money>,
        _stop_price: Option<Money>,
    ) -> Result<BrokerId, BrokerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let broker_order_id = BrokerId::new(format!("null-{id}"));
        let fill_price = limit_price.unwrap_or(Money::usd(100.0));
        self.filled
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(broker_order_id.clone(), (quantity, fill_price));
        Ok(broker_order_id)
    }

    async fn cancel_order(&self, broker_order_id: &BrokerId) -> Result<bool, BrokerError> {
        let mut filled = self.filled.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(filled.remove(broker_order_id).is_some())
    }

    async fn get_order_status(&self, broker_order_id: &BrokerId) -> Result<BrokerOrderStatus, BrokerError> {
        let filled = self.filled.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if filled.contains_key(broker_order_id) {
            Ok("FILLED".to_string())
        } else {
            Err(BrokerError::NotFound {
                broker_order_id: broker_order_id.clone(),
            })
        }
    }

    async fn get_fill_details(&self, broker_order_id: &BrokerId) -> Result<FillDetails, BrokerError> {
        let filled = self.filled.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(filled.get(broker_order_id).copied())
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        Ok(Vec::new())
    }

    async fn get_open_orders(&self) -> Result<Vec<BrokerOpenOrder>, BrokerError> {
        Ok(Vec::new())
    }

    async fn get_account_info(&self) -> Result<AccountInfo, BrokerError> {
        Ok(AccountInfo {
            portfolio_value: Money::usd(0.0),
            buying_power: Money::usd(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_execution_fills_then_reports_status() {
        let broker = NullExecution::new();
        let symbol = Symbol::new("AAPL");
        let id = broker
            .submit_order(&symbol, Quantity::from_i64(10), OrderSide::Long, OrderType::Market, None, None)
            .await
            .unwrap();
        assert_eq!(broker.get_order_status(&id).await.unwrap(), "FILLED");
    }

    #[tokio::test]
    async fn null_execution_unknown_order_not_found() {
        let broker = NullExecution::new();
        let err = broker.get_order_status(&BrokerId::new("missing")).await.unwrap_err();
        assert!(matches!(err, BrokerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn null_execution_cancel_is_idempotent() {
        let broker = NullExecution::new();
        let symbol = Symbol::new("AAPL");
        let id = broker
            .submit_order(&symbol, Quantity::from_i64(10), OrderSide::Long, OrderType::Market, None, None)
            .await
            .unwrap();
        assert!(broker.cancel_order(&id).await.unwrap());
        assert!(!broker.cancel_order(&id).await.unwrap());
    }
}
