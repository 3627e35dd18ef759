//! Execution engine (C8): submits approved orders to the broker, enforces
//! submission idempotency, and drives the order state machine from broker
//! truth.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::application::ports::broker_port::{Broker, BrokerError};
use crate::domain::order_execution::aggregate::NewOrder;
use crate::domain::order_execution::services::{OrderStateMachine, TransitionInputs};
use crate::domain::order_execution::value_objects::{CancelReason, OrderSide, OrderState, OrderType, RejectReason};
use crate::domain::shared::{BrokerId, Clock, Money, OrderId, Quantity, Symbol, TradeId, stop_loss_child_id, take_profit_child_id};
use crate::infrastructure::TransactionLog;

#[derive(Debug, Error)]
pub enum ExecutionEngineError {
    #[error("internal_order_id {0} was already submitted in this or a prior run")]
    DuplicateOrder(OrderId),
    #[error("order {0} is not in PENDING state")]
    OrderNotPending(OrderId),
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("order state error: {0}")]
    State(#[from] crate::domain::order_execution::errors::OrderError),
    #[error("transaction log error: {0}")]
    Log(#[from] crate::infrastructure::transaction_log::TransactionLogError),
}

/// Tracks the protective child orders spawned for one entry, so a fill on
/// either side cancels its sibling (synthetic OCO, §4.8).
#[derive(Debug, Clone, Default)]
struct ProtectiveOrders {
    stop_loss_broker_id: Option<BrokerId>,
    take_profit_broker_id: Option<BrokerId>,
}

/// Submits to the broker, enforces idempotency, and drives the state
/// machine from fills (C8, §4.8).
pub struct ExecutionEngine {
    machine: Arc<OrderStateMachine>,
    broker: Arc<dyn Broker>,
    log: Arc<TransactionLog>,
    clock: Arc<dyn Clock>,
    submitted_ids: Mutex<HashSet<OrderId>>,
    protective: Mutex<HashMap<OrderId, ProtectiveOrders>>,
}

impl ExecutionEngine {
    /// Construct the engine, seeding the duplicate-submission guard from
    /// every historical `ORDER_SUBMIT` event in `log` (§4.8 point 3).
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn new(machine: Arc<OrderStateMachine>, broker: Arc<dyn Broker>, log: Arc<TransactionLog>, clock: Arc<dyn Clock>) -> Result<Self, ExecutionEngineError> {
        let mut submitted_ids = HashSet::new();
        for record in log.events_of_type("ORDER_SUBMIT")? {
            if let Some(id) = record.fields.get("internal_order_id").and_then(|v| v.as_str()) {
                submitted_ids.insert(OrderId::new(id));
            }
        }
        Ok(Self {
            machine,
            broker,
            log,
            clock,
            submitted_ids: Mutex::new(submitted_ids),
            protective: Mutex::new(HashMap::new()),
        })
    }

    /// Create and submit a new market/limit order under `internal_order_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionEngineError::DuplicateOrder`] if the id has
    /// already been submitted in this or a prior run.
    pub async fn submit_order(&self, internal_order_id: OrderId, trade_id: &TradeId, cmd: NewOrder) -> Result<BrokerId, ExecutionEngineError> {
        {
            let mut submitted = self.submitted_ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if submitted.contains(&internal_order_id) {
                return Err(ExecutionEngineError::DuplicateOrder(internal_order_id));
            }
            submitted.insert(internal_order_id.clone());
        }

        self.machine.create_order(internal_order_id.clone(), cmd.clone())?;

        let mut fields = Map::new();
        fields.insert("internal_order_id".to_string(), Value::String(internal_order_id.to_string()));
        fields.insert("trade_id".to_string(), Value::String(trade_id.to_string()));
        fields.insert("symbol".to_string(), Value::String(cmd.symbol.to_string()));
        fields.insert("quantity".to_string(), Value::String(cmd.quantity.amount().to_string()));
        fields.insert("side".to_string(), Value::String(cmd.side.to_string()));
        fields.insert("order_type".to_string(), Value::String(cmd.order_type.to_string()));
        self.log.append_raw("ORDER_SUBMIT", fields)?;

        let result = self
            .broker
            .submit_order(&cmd.symbol, cmd.quantity, cmd.side, cmd.order_type, cmd.entry_price, None)
            .await;

        match result {
            Ok(broker_order_id) => {
                self.machine.transition(
                    &internal_order_id,
                    OrderState::Pending,
                    OrderState::Submitted,
                    TransitionInputs::submitted(broker_order_id.clone()),
                )?;
                Ok(broker_order_id)
            }
            Err(err) => {
                let mut fail_fields = Map::new();
                fail_fields.insert("internal_order_id".to_string(), Value::String(internal_order_id.to_string()));
                fail_fields.insert("trade_id".to_string(), Value::String(trade_id.to_string()));
                fail_fields.insert("error".to_string(), Value::String(err.to_string()));
                self.log.append_raw("ORDER_SUBMIT_FAILED", fail_fields)?;
                self.machine.transition(
                    &internal_order_id,
                    OrderState::Pending,
                    OrderState::Rejected,
                    TransitionInputs::with_reason(RejectReason::broker_error(err.to_string()).to_string()),
                )?;
                Err(err.into())
            }
        }
    }

    /// Submit protective stop-loss / take-profit child orders for an entry
    /// that has just filled, using the deterministic `"{entry}::SL"` /
    /// `"{entry}::TP"` ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry order cannot be found or the broker
    /// call fails.
    pub async fn submit_protective_orders(&self, entry_id: &OrderId, stop_loss: Option<Money>, take_profit: Option<Money>) -> Result<(), ExecutionEngineError> {
        let entry = self.machine.get_order(entry_id).ok_or_else(|| ExecutionEngineError::OrderNotFound(entry_id.clone()))?;
        let exit_side = entry.side().opposite();
        let mut orders = ProtectiveOrders::default();

        if let Some(stop_price) = stop_loss {
            let id = self
                .broker
                .submit_order(entry.symbol(), entry.filled_qty(), exit_side, OrderType::Stop, None, Some(stop_price))
                .await?;
            orders.stop_loss_broker_id = Some(id);
        }
        if let Some(limit_price) = take_profit {
            let id = self
                .broker
                .submit_order(entry.symbol(), entry.filled_qty(), exit_side, OrderType::Limit, Some(limit_price), None)
                .await?;
            orders.take_profit_broker_id = Some(id);
        }

        self.protective.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(entry_id.clone(), orders);
        Ok(())
    }

    /// Cancel any outstanding protective orders for `entry_id`, ahead of an
    /// exit or because one sibling already filled (synthetic OCO).
    ///
    /// # Errors
    ///
    /// Returns an error if a cancel call to the broker fails.
    pub async fn cancel_protective_orders(&self, entry_id: &OrderId) -> Result<(), ExecutionEngineError> {
        let orders = self.protective.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(entry_id);
        let Some(orders) = orders else { return Ok(()) };
        if let Some(id) = orders.stop_loss_broker_id {
            let _ = self.broker.cancel_order(&id).await?;
        }
        if let Some(id) = orders.take_profit_broker_id {
            let _ = self.broker.cancel_order(&id).await?;
        }
        Ok(())
    }

    /// The deterministic stop-loss child id for `entry_id`.
    #[must_use]
    pub fn stop_loss_child_id(entry_id: &OrderId) -> OrderId {
        stop_loss_child_id(entry_id)
    }

    /// The deterministic take-profit child id for `entry_id`.
    #[must_use]
    pub fn take_profit_child_id(entry_id: &OrderId) -> OrderId {
        take_profit_child_id(entry_id)
    }

    /// Poll the broker for every in-flight order and drive the state
    /// machine forward on fills or terminal statuses (§4.8 point 5).
    ///
    /// # Errors
    ///
    /// Returns an error if a broker call or state transition fails.
    pub async fn poll_open_orders(&self) -> Result<(), ExecutionEngineError> {
        for order in self.machine.get_pending_orders() {
            if order.state() != OrderState::Submitted && order.state() != OrderState::PartiallyFilled {
                continue;
            }
            let Some(broker_order_id) = order.broker_order_id().cloned() else {
                continue;
            };
            if let Ok(Some((filled_qty, fill_price))) = self.broker.get_fill_details(&broker_order_id).await {
                let delta = filled_qty - order.filled_qty();
                if delta.is_positive() {
                    let to = if filled_qty >= order.quantity() {
                        OrderState::Filled
                    } else {
                        OrderState::PartiallyFilled
                    };
                    self.machine.transition(order.id(), order.state(), to, TransitionInputs::filled(delta, fill_price))?;
                }
            }
        }
        Ok(())
    }

    /// Cancel an outstanding order ahead of an exit (§4.8: "cancels any
    /// outstanding protective orders before submitting the exit").
    ///
    /// # Errors
    ///
    /// Returns an error if the broker cancel or the state transition fails.
    pub async fn cancel_order(&self, order_id: &OrderId, reason: CancelReason) -> Result<(), ExecutionEngineError> {
        let order = self.machine.get_order(order_id).ok_or_else(|| ExecutionEngineError::OrderNotFound(order_id.clone()))?;
        if let Some(broker_order_id) = order.broker_order_id() {
            self.broker.cancel_order(broker_order_id).await?;
        }
        self.machine.transition(order_id, order.state(), OrderState::Cancelled, TransitionInputs::with_reason(reason.to_string()))?;
        Ok(())
    }

    /// Shared clock, for callers that need to stamp their own events at the
    /// same time source the engine uses.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
