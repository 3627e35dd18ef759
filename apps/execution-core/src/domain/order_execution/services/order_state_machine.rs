//! Order State Machine — the single owner of in-memory `Order` records.
//!
//! Nothing else mutates an `Order` directly. Callers outside this module
//! hold only an `OrderId` and read through `get_order`/`get_all_orders`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::order_execution::aggregate::{NewOrder, Order};
use crate::domain::order_execution::errors::OrderError;
use crate::domain::order_execution::events::OrderStateChanged;
use crate::domain::order_execution::ports::{OrderEventBus, TransactionLogPort};
use crate::domain::order_execution::value_objects::{CancelReason, OrderState, RejectReason};
use crate::domain::shared::{BrokerId, Clock, Money, OrderId, Quantity, SystemClock, Timestamp};

/// Inputs a caller supplies for one `transition` call. Which fields are
/// required depends on the `(from, to)` pair; `transition` validates that
/// before touching the order.
#[derive(Debug, Clone, Default)]
pub struct TransitionInputs {
    /// Required for PENDING -> SUBMITTED.
    pub broker_order_id: Option<BrokerId>,
    /// Required for transitions into PARTIALLY_FILLED or FILLED.
    pub filled_qty: Option<Quantity>,
    /// Required alongside `filled_qty`.
    pub fill_price: Option<Money>,
    /// Required for transitions into CANCELLED or REJECTED.
    pub reason: Option<String>,
}

impl TransitionInputs {
    /// Inputs for a PENDING -> SUBMITTED transition.
    #[must_use]
    pub fn submitted(broker_order_id: BrokerId) -> Self {
        Self {
            broker_order_id: Some(broker_order_id),
            ..Self::default()
        }
    }

    /// Inputs for a transition into PARTIALLY_FILLED or FILLED.
    #[must_use]
    pub fn filled(filled_qty: Quantity, fill_price: Money) -> Self {
        Self {
            filled_qty: Some(filled_qty),
            fill_price: Some(fill_price),
            ..Self::default()
        }
    }

    /// Inputs for a transition into CANCELLED or REJECTED.
    #[must_use]
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Legal `(from, to)` pairs and the inputs each one requires.
///
/// `PENDING -> SUBMITTED -> {PARTIALLY_FILLED <-> FILLED} | CANCELLED | REJECTED | EXPIRED`
fn is_valid_transition(from: OrderState, to: OrderState) -> bool {
    use OrderState::{Cancelled, Expired, Filled, PartiallyFilled, Pending, Rejected, Submitted};
    matches!(
        (from, to),
        (Pending, Submitted)
            | (Pending, Rejected)
            | (Submitted, PartiallyFilled)
            | (Submitted, Filled)
            | (Submitted, Cancelled)
            | (Submitted, Rejected)
            | (Submitted, Expired)
            | (PartiallyFilled, Filled)
            | (PartiallyFilled, Cancelled)
    )
}

/// Owns every `Order` for the lifetime of the process: creation, transition,
/// and read access all go through here.
pub struct OrderStateMachine {
    orders: Mutex<HashMap<OrderId, Order>>,
    log: Arc<dyn TransactionLogPort>,
    bus: Arc<dyn OrderEventBus>,
    clock: Arc<dyn Clock>,
}

impl OrderStateMachine {
    /// Create an empty state machine wired to the given log and bus, using
    /// the real wall clock.
    #[must_use]
    pub fn new(log: Arc<dyn TransactionLogPort>, bus: Arc<dyn OrderEventBus>) -> Self {
        Self::with_clock(log, bus, Arc::new(SystemClock))
    }

    /// Create an empty state machine with an explicit clock (used in tests
    /// and backtest mode, where the clock is simulated).
    #[must_use]
    pub fn with_clock(
        log: Arc<dyn TransactionLogPort>,
        bus: Arc<dyn OrderEventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            log,
            bus,
            clock,
        }
    }

    /// Create a new order in the PENDING state.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::DuplicateOrder`] if `order_id` is already
    /// present, or a validation error from [`NewOrder::validate`].
    pub fn create_order(&self, order_id: OrderId, cmd: NewOrder) -> Result<(), OrderError> {
        let mut orders = self.orders.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if orders.contains_key(&order_id) {
            return Err(OrderError::DuplicateOrder { order_id });
        }
        let order = Order::pending(order_id.clone(), cmd, self.clock.now())?;
        orders.insert(order_id, order);
        Ok(())
    }

    /// Insert a fully reconstituted order directly into the map, bypassing
    /// [`Self::create_order`]'s "starts PENDING" rule. Used only by recovery
    /// to seed orders captured in a state snapshot before
    /// [`Self::restore_pending_orders`] replays the log on top of them.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::DuplicateOrder`] if `order_id` is already
    /// present.
    pub fn seed_order(&self, order: Order) -> Result<(), OrderError> {
        let mut orders = self.orders.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if orders.contains_key(order.id()) {
            return Err(OrderError::DuplicateOrder { order_id: order.id().clone() });
        }
        orders.insert(order.id().clone(), order);
        Ok(())
    }

    /// Attempt a state transition.
    ///
    /// Validates, in order: (1) the order exists, (2) the recorded state
    /// matches `from` (optimistic concurrency), (3) `(from, to)` is a legal
    /// pair, (4) the required inputs for that pair are present, (5) the
    /// recorded state is not terminal. On success the order is mutated, the
    /// event is appended to the transaction log, and the same event is
    /// published on the bus — all three or none.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered, in the order
    /// above.
    pub fn transition(
        &self,
        order_id: &OrderId,
        from: OrderState,
        to: OrderState,
        inputs: TransitionInputs,
    ) -> Result<(), OrderError> {
        let mut orders = self.orders.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let order = orders.get_mut(order_id).ok_or_else(|| OrderError::NotFound {
            order_id: order_id.clone(),
        })?;

        if order.state() != from {
            return Err(OrderError::StateMismatch {
                order_id: order_id.clone(),
                expected: from,
                actual: order.state(),
            });
        }

        if order.state().is_terminal() {
            return Err(OrderError::TerminalState {
                order_id: order_id.clone(),
                state: order.state(),
            });
        }

        if !is_valid_transition(from, to) {
            return Err(OrderError::InvalidTransition {
                order_id: order_id.clone(),
                from,
                to,
            });
        }

        let now = self.clock.now();
        apply_transition(order, order_id, to, &inputs, now)?;

        let event = OrderStateChanged {
            order_id: order_id.clone(),
            from,
            to,
            broker_order_id: order.broker_order_id().cloned(),
            filled_qty: inputs.filled_qty,
            fill_price: inputs.fill_price,
            reason: inputs.reason,
            occurred_at: now,
        };

        self.log
            .append(&event)
            .map_err(|e| OrderError::InvalidParameters {
                field: "transaction_log".to_string(),
                message: e.to_string(),
            })?;
        self.bus.publish(event);

        Ok(())
    }

    /// The clock this state machine was constructed with, so other
    /// components (e.g. the execution engine) can share the same time
    /// source instead of reading the wall clock independently.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Look up one order by id.
    #[must_use]
    pub fn get_order(&self, order_id: &OrderId) -> Option<Order> {
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(order_id)
            .cloned()
    }

    /// Snapshot of every order, regardless of state.
    #[must_use]
    pub fn get_all_orders(&self) -> Vec<Order> {
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of orders still open: PENDING, SUBMITTED, or PARTIALLY_FILLED.
    #[must_use]
    pub fn get_pending_orders(&self) -> Vec<Order> {
        self.orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|o| o.state().is_open())
            .cloned()
            .collect()
    }

    /// Rebuild in-memory state by replaying the transaction log from
    /// scratch. Idempotent: replaying the same log twice yields the same
    /// state, since each replayed event only ever moves an order forward
    /// through the same transition table used by `transition`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    pub fn restore_pending_orders(&self) -> Result<usize, OrderError> {
        let events = self
            .log
            .replay()
            .map_err(|e| OrderError::InvalidParameters {
                field: "transaction_log".to_string(),
                message: e.to_string(),
            })?;

        let mut orders = self.orders.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut restored = 0;
        for event in events {
            let Some(order) = orders.get_mut(&event.order_id) else {
                continue;
            };
            if order.state() != event.from {
                continue;
            }
            let inputs = TransitionInputs {
                broker_order_id: event.broker_order_id.clone(),
                filled_qty: event.filled_qty,
                fill_price: event.fill_price,
                reason: event.reason.clone(),
            };
            if apply_transition(order, &event.order_id, event.to, &inputs, event.occurred_at).is_ok() {
                restored += 1;
            }
        }
        Ok(restored)
    }
}

fn apply_transition(
    order: &mut Order,
    order_id: &OrderId,
    to: OrderState,
    inputs: &TransitionInputs,
    now: Timestamp,
) -> Result<(), OrderError> {
    match to {
        OrderState::Submitted => {
            let broker_order_id =
                inputs.broker_order_id.clone().ok_or_else(|| OrderError::BrokerConfirmationRequired {
                    order_id: order_id.clone(),
                })?;
            order.mark_submitted(broker_order_id, now);
        }
        OrderState::PartiallyFilled | OrderState::Filled => {
            let filled_qty = inputs.filled_qty.ok_or_else(|| OrderError::MissingRequiredInput {
                order_id: order_id.clone(),
                field: "filled_qty",
            })?;
            let fill_price = inputs.fill_price.ok_or_else(|| OrderError::MissingRequiredInput {
                order_id: order_id.clone(),
                field: "fill_price",
            })?;
            if order.filled_qty() + filled_qty > order.quantity() {
                return Err(OrderError::FillExceedsQuantity {
                    order_id: order_id.clone(),
                });
            }
            order.apply_fill(filled_qty, fill_price, now);
        }
        OrderState::Cancelled => {
            let reason = inputs.reason.clone().ok_or_else(|| OrderError::MissingRequiredInput {
                order_id: order_id.clone(),
                field: "reason",
            })?;
            order.mark_cancelled(CancelReason::new("CANCELLED", reason), now);
        }
        OrderState::Rejected => {
            let reason = inputs.reason.clone().ok_or_else(|| OrderError::MissingRequiredInput {
                order_id: order_id.clone(),
                field: "reason",
            })?;
            order.mark_rejected(RejectReason::new("REJECTED", reason), now);
        }
        OrderState::Expired => {
            order.mark_expired(now);
        }
        OrderState::Pending => unreachable!("no transition targets PENDING"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_execution::ports::{InMemoryTransactionLog, NullEventBus};
    use crate::domain::order_execution::value_objects::{OrderSide, OrderType, TimeInForce};
    use crate::domain::shared::Symbol;

    fn machine() -> OrderStateMachine {
        OrderStateMachine::new(Arc::new(InMemoryTransactionLog::default()), Arc::new(NullEventBus))
    }

    fn new_order_cmd() -> NewOrder {
        NewOrder {
            symbol: Symbol::new("AAPL"),
            quantity: Quantity::from_i64(100),
            side: OrderSide::Long,
            order_type: OrderType::Market,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            time_in_force: TimeInForce::Day,
            strategy: "momentum".to_string(),
        }
    }

    #[test]
    fn create_then_get_order() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();

        let order = sm.get_order(&id).unwrap();
        assert_eq!(order.state(), OrderState::Pending);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();
        let err = sm.create_order(id, new_order_cmd()).unwrap_err();
        assert!(matches!(err, OrderError::DuplicateOrder { .. }));
    }

    #[test]
    fn full_lifecycle_pending_to_filled() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();

        sm.transition(
            &id,
            OrderState::Pending,
            OrderState::Submitted,
            TransitionInputs::submitted(BrokerId::new("b-1")),
        )
        .unwrap();

        sm.transition(
            &id,
            OrderState::Submitted,
            OrderState::PartiallyFilled,
            TransitionInputs::filled(Quantity::from_i64(40), Money::usd(150.0)),
        )
        .unwrap();

        sm.transition(
            &id,
            OrderState::PartiallyFilled,
            OrderState::Filled,
            TransitionInputs::filled(Quantity::from_i64(60), Money::usd(151.0)),
        )
        .unwrap();

        let order = sm.get_order(&id).unwrap();
        assert_eq!(order.state(), OrderState::Filled);
        assert_eq!(order.filled_qty(), order.quantity());
    }

    #[test]
    fn submit_without_broker_id_fails() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();

        let err = sm
            .transition(&id, OrderState::Pending, OrderState::Submitted, TransitionInputs::default())
            .unwrap_err();
        assert!(matches!(err, OrderError::BrokerConfirmationRequired { .. }));
    }

    #[test]
    fn transition_from_terminal_state_fails() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();
        sm.transition(&id, OrderState::Pending, OrderState::Rejected, TransitionInputs::with_reason("no"))
            .unwrap();

        let err = sm
            .transition(
                &id,
                OrderState::Rejected,
                OrderState::Submitted,
                TransitionInputs::submitted(BrokerId::new("b-1")),
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::TerminalState { .. }));
    }

    #[test]
    fn stale_from_state_is_rejected_optimistic_concurrency() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();
        sm.transition(
            &id,
            OrderState::Pending,
            OrderState::Submitted,
            TransitionInputs::submitted(BrokerId::new("b-1")),
        )
        .unwrap();

        let err = sm
            .transition(&id, OrderState::Pending, OrderState::Rejected, TransitionInputs::with_reason("late"))
            .unwrap_err();
        assert!(matches!(err, OrderError::StateMismatch { .. }));
    }

    #[test]
    fn illegal_transition_pair_is_rejected() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();

        let err = sm
            .transition(&id, OrderState::Pending, OrderState::Filled, TransitionInputs::default())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn fill_exceeding_quantity_is_rejected() {
        let sm = machine();
        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();
        sm.transition(
            &id,
            OrderState::Pending,
            OrderState::Submitted,
            TransitionInputs::submitted(BrokerId::new("b-1")),
        )
        .unwrap();

        let err = sm
            .transition(
                &id,
                OrderState::Submitted,
                OrderState::Filled,
                TransitionInputs::filled(Quantity::from_i64(500), Money::usd(150.0)),
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::FillExceedsQuantity { .. }));
    }

    #[test]
    fn get_pending_orders_excludes_terminal_states() {
        let sm = machine();
        let open_id = OrderId::new("ord-open");
        let done_id = OrderId::new("ord-done");
        sm.create_order(open_id.clone(), new_order_cmd()).unwrap();
        sm.create_order(done_id.clone(), new_order_cmd()).unwrap();
        sm.transition(&done_id, OrderState::Pending, OrderState::Rejected, TransitionInputs::with_reason("x"))
            .unwrap();

        let pending = sm.get_pending_orders();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), &open_id);
    }

    #[test]
    fn restore_pending_orders_replays_log_idempotently() {
        let log = Arc::new(InMemoryTransactionLog::default());
        let bus: Arc<dyn OrderEventBus> = Arc::new(NullEventBus);
        let sm = OrderStateMachine::new(log.clone(), bus.clone());

        let id = OrderId::new("ord-1");
        sm.create_order(id.clone(), new_order_cmd()).unwrap();
        sm.transition(
            &id,
            OrderState::Pending,
            OrderState::Submitted,
            TransitionInputs::submitted(BrokerId::new("b-1")),
        )
        .unwrap();

        // Simulate a restart: fresh map seeded from the same log.
        let recovered = OrderStateMachine::new(log, bus);
        recovered.create_order(id.clone(), new_order_cmd()).unwrap();
        let first_pass = recovered.restore_pending_orders().unwrap();
        assert_eq!(first_pass, 1);
        assert_eq!(recovered.get_order(&id).unwrap().state(), OrderState::Submitted);

        // Replaying again is a no-op: the order is no longer in PENDING.
        let second_pass = recovered.restore_pending_orders().unwrap();
        assert_eq!(second_pass, 0);
    }
}
