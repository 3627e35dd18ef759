//! Order — the authoritative record of one trading intent.

use serde::{Deserialize, Serialize};

use crate::domain::order_execution::errors::OrderError;
use crate::domain::order_execution::value_objects::{
    CancelReason, OrderSide, OrderState, OrderType, RejectReason, TimeInForce,
};
use crate::domain::shared::{BrokerId, Money, OrderId, Quantity, Symbol, Timestamp};

/// Parameters needed to create a new order in the PENDING state.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Quantity to trade (exact decimal).
    pub quantity: Quantity,
    /// Trade direction.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Entry limit/stop reference price, when applicable.
    pub entry_price: Option<Money>,
    /// Protective stop-loss price, if the signal carries one.
    pub stop_loss: Option<Money>,
    /// Protective take-profit price, if the signal carries one.
    pub take_profit: Option<Money>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Name of the strategy that produced this order.
    pub strategy: String,
}

impl NewOrder {
    /// Validate the command parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if required parameters are missing or invalid.
    pub fn validate(&self) -> Result<(), OrderError> {
        self.symbol
            .validate()
            .map_err(|e| OrderError::InvalidParameters {
                field: "symbol".to_string(),
                message: e.to_string(),
            })?;
        self.quantity
            .validate_for_order()
            .map_err(|e| OrderError::InvalidParameters {
                field: "quantity".to_string(),
                message: e.to_string(),
            })?;
        if self.order_type.requires_limit_price() && self.entry_price.is_none() {
            return Err(OrderError::InvalidParameters {
                field: "entry_price".to_string(),
                message: "limit orders require an entry price".to_string(),
            });
        }
        if self.order_type.requires_stop_price() && self.entry_price.is_none() {
            return Err(OrderError::InvalidParameters {
                field: "entry_price".to_string(),
                message: "stop orders require a stop price".to_string(),
            });
        }
        Ok(())
    }
}

/// Order — the authoritative record of one trading intent.
///
/// Owned exclusively by `OrderStateMachine`; nothing else may mutate it
/// directly. Callers outside the state machine hold only an `OrderId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    symbol: Symbol,
    quantity: Quantity,
    side: OrderSide,
    order_type: OrderType,
    entry_price: Option<Money>,
    stop_loss: Option<Money>,
    take_profit: Option<Money>,
    time_in_force: TimeInForce,
    strategy: String,
    state: OrderState,
    broker_order_id: Option<BrokerId>,
    filled_qty: Quantity,
    filled_price: Option<Money>,
    commission: Money,
    created_at: Timestamp,
    submitted_at: Option<Timestamp>,
    filled_at: Option<Timestamp>,
    cancelled_at: Option<Timestamp>,
    rejection_reason: Option<String>,
}

impl Order {
    /// Create a new order in the PENDING state.
    ///
    /// # Errors
    ///
    /// Returns an error if `cmd` fails validation.
    pub fn pending(id: OrderId, cmd: NewOrder, now: Timestamp) -> Result<Self, OrderError> {
        cmd.validate()?;
        Ok(Self {
            id,
            symbol: cmd.symbol,
            quantity: cmd.quantity,
            side: cmd.side,
            order_type: cmd.order_type,
            entry_price: cmd.entry_price,
            stop_loss: cmd.stop_loss,
            take_profit: cmd.take_profit,
            time_in_force: cmd.time_in_force,
            strategy: cmd.strategy,
            state: OrderState::Pending,
            broker_order_id: None,
            filled_qty: Quantity::ZERO,
            filled_price: None,
            commission: Money::ZERO,
            created_at: now,
            submitted_at: None,
            filled_at: None,
            cancelled_at: None,
            rejection_reason: None,
        })
    }

    /// Reconstitute an order from persisted/replayed state (no validation).
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub const fn reconstitute(
        id: OrderId,
        symbol: Symbol,
        quantity: Quantity,
        side: OrderSide,
        order_type: OrderType,
        entry_price: Option<Money>,
        stop_loss: Option<Money>,
        take_profit: Option<Money>,
        time_in_force: TimeInForce,
        strategy: String,
        state: OrderState,
        broker_order_id: Option<BrokerId>,
        filled_qty: Quantity,
        filled_price: Option<Money>,
        commission: Money,
        created_at: Timestamp,
        submitted_at: Option<Timestamp>,
        filled_at: Option<Timestamp>,
        cancelled_at: Option<Timestamp>,
        rejection_reason: Option<String>,
    ) -> Self {
        Self {
            id,
            symbol,
            quantity,
            side,
            order_type,
            entry_price,
            stop_loss,
            take_profit,
            time_in_force,
            strategy,
            state,
            broker_order_id,
            filled_qty,
            filled_price,
            commission,
            created_at,
            submitted_at,
            filled_at,
            cancelled_at,
            rejection_reason,
        }
    }

    // ---- getters ----

    /// Order id.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }
    /// Symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }
    /// Requested quantity.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }
    /// Trade direction.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }
    /// Order type.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }
    /// Entry reference price.
    #[must_use]
    pub const fn entry_price(&self) -> Option<Money> {
        self.entry_price
    }
    /// Protective stop-loss price.
    #[must_use]
    pub const fn stop_loss(&self) -> Option<Money> {
        self.stop_loss
    }
    /// Protective take-profit price.
    #[must_use]
    pub const fn take_profit(&self) -> Option<Money> {
        self.take_profit
    }
    /// Time in force.
    #[must_use]
    pub const fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }
    /// Owning strategy name.
    #[must_use]
    pub fn strategy(&self) -> &str {
        &self.strategy
    }
    /// Current state.
    #[must_use]
    pub const fn state(&self) -> OrderState {
        self.state
    }
    /// Broker-assigned id, once submitted.
    #[must_use]
    pub const fn broker_order_id(&self) -> Option<&BrokerId> {
        self.broker_order_id.as_ref()
    }
    /// Cumulative filled quantity (I1: `filled_qty <= quantity`).
    #[must_use]
    pub const fn filled_qty(&self) -> Quantity {
        self.filled_qty
    }
    /// Remaining quantity (I2: `remaining_qty = quantity - filled_qty`).
    #[must_use]
    pub fn remaining_qty(&self) -> Quantity {
        self.quantity - self.filled_qty
    }
    /// Average/last fill price.
    #[must_use]
    pub const fn filled_price(&self) -> Option<Money> {
        self.filled_price
    }
    /// Cumulative commission charged.
    #[must_use]
    pub const fn commission(&self) -> Money {
        self.commission
    }
    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }
    /// Submission time (I4: set iff ever SUBMITTED or beyond).
    #[must_use]
    pub const fn submitted_at(&self) -> Option<Timestamp> {
        self.submitted_at
    }
    /// Time the order reached FILLED.
    #[must_use]
    pub const fn filled_at(&self) -> Option<Timestamp> {
        self.filled_at
    }
    /// Time the order reached CANCELLED.
    #[must_use]
    pub const fn cancelled_at(&self) -> Option<Timestamp> {
        self.cancelled_at
    }
    /// Rejection/cancellation reason text, when applicable.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    // ---- mutation, exercised only through OrderStateMachine::transition ----

    pub(crate) fn mark_submitted(&mut self, broker_order_id: BrokerId, now: Timestamp) {
        self.broker_order_id = Some(broker_order_id);
        self.state = OrderState::Submitted;
        self.submitted_at = Some(now);
    }

    pub(crate) fn apply_fill(&mut self, fill_qty: Quantity, fill_price: Money, now: Timestamp) {
        let new_cum = self.filled_qty + fill_qty;
        // Volume-weighted average across fills.
        let old_value = self.filled_price.unwrap_or(Money::ZERO).amount() * self.filled_qty.amount();
        let fill_value = fill_price.amount() * fill_qty.amount();
        if new_cum.amount() > rust_decimal::Decimal::ZERO {
            self.filled_price = Some(Money::new((old_value + fill_value) / new_cum.amount()));
        }
        self.filled_qty = new_cum;
        self.state = if self.filled_qty >= self.quantity {
            self.filled_at = Some(now);
            OrderState::Filled
        } else {
            OrderState::PartiallyFilled
        };
    }

    pub(crate) fn mark_cancelled(&mut self, reason: CancelReason, now: Timestamp) {
        self.state = OrderState::Cancelled;
        self.cancelled_at = Some(now);
        self.rejection_reason = Some(reason.to_string());
    }

    pub(crate) fn mark_rejected(&mut self, reason: RejectReason, now: Timestamp) {
        self.state = OrderState::Rejected;
        self.rejection_reason = Some(reason.to_string());
    }

    pub(crate) fn mark_expired(&mut self, now: Timestamp) {
        self.state = OrderState::Expired;
        self.cancelled_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_new_order() -> NewOrder {
        NewOrder {
            symbol: Symbol::new("AAPL"),
            quantity: Quantity::from_i64(100),
            side: OrderSide::Long,
            order_type: OrderType::Market,
            entry_price: None,
            stop_loss: Some(Money::usd(145.0)),
            take_profit: Some(Money::usd(160.0)),
            time_in_force: TimeInForce::Day,
            strategy: "momentum".to_string(),
        }
    }

    #[test]
    fn pending_order_starts_with_zero_fill() {
        let order = Order::pending(OrderId::generate(), make_new_order(), Timestamp::now()).unwrap();
        assert_eq!(order.state(), OrderState::Pending);
        assert_eq!(order.filled_qty(), Quantity::ZERO);
        assert_eq!(order.remaining_qty(), Quantity::from_i64(100));
        assert!(order.submitted_at().is_none());
    }

    #[test]
    fn limit_order_requires_entry_price() {
        let mut cmd = make_new_order();
        cmd.order_type = OrderType::Limit;
        cmd.entry_price = None;
        assert!(Order::pending(OrderId::generate(), cmd, Timestamp::now()).is_err());
    }

    #[test]
    fn mark_submitted_sets_broker_id_and_timestamp() {
        let mut order = Order::pending(OrderId::generate(), make_new_order(), Timestamp::now()).unwrap();
        order.mark_submitted(BrokerId::new("b-1"), Timestamp::now());
        assert_eq!(order.state(), OrderState::Submitted);
        assert_eq!(order.broker_order_id().unwrap().as_str(), "b-1");
        assert!(order.submitted_at().is_some());
    }

    #[test]
    fn partial_then_full_fill_preserves_invariants() {
        let mut order = Order::pending(OrderId::generate(), make_new_order(), Timestamp::now()).unwrap();
        order.mark_submitted(BrokerId::new("b-1"), Timestamp::now());

        order.apply_fill(Quantity::from_i64(40), Money::usd(150.0), Timestamp::now());
        assert_eq!(order.state(), OrderState::PartiallyFilled);
        assert_eq!(order.filled_qty(), Quantity::from_i64(40));
        assert_eq!(order.remaining_qty(), Quantity::from_i64(60));
        assert!(order.filled_qty() <= order.quantity());

        order.apply_fill(Quantity::from_i64(60), Money::usd(151.0), Timestamp::now());
        assert_eq!(order.state(), OrderState::Filled);
        assert_eq!(order.filled_qty(), order.quantity());
        assert!(order.filled_at().is_some());
    }

    #[test]
    fn vwap_is_computed_across_fills() {
        let mut order = Order::pending(OrderId::generate(), make_new_order(), Timestamp::now()).unwrap();
        order.mark_submitted(BrokerId::new("b-1"), Timestamp::now());
        order.apply_fill(Quantity::from_i64(40), Money::usd(150.0), Timestamp::now());
        order.apply_fill(Quantity::from_i64(60), Money::usd(151.0), Timestamp::now());
        // (40*150 + 60*151) / 100 = 150.6
        assert_eq!(order.filled_price(), Some(Money::usd(150.6)));
    }

    #[test]
    fn mark_cancelled_records_reason_and_timestamp() {
        let mut order = Order::pending(OrderId::generate(), make_new_order(), Timestamp::now()).unwrap();
        order.mark_cancelled(CancelReason::user_requested(), Timestamp::now());
        assert_eq!(order.state(), OrderState::Cancelled);
        assert!(order.cancelled_at().is_some());
        assert!(order.rejection_reason().unwrap().contains("USER_REQUESTED"));
    }
}
