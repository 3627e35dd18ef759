//! Domain events for order execution.
//!
//! The state machine emits one event shape for every transition rather than
//! a family of per-transition structs: the `(from, to)` pair plus whatever
//! inputs the transition carried is enough for any subscriber to reconstruct
//! what happened, and it is the same shape written to the transaction log.

use serde::{Deserialize, Serialize};

use crate::domain::shared::{BrokerId, Money, OrderId, Quantity, Timestamp};

use super::value_objects::OrderState;

/// Emitted by `OrderStateMachine::transition` after a successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStateChanged {
    /// Order affected.
    pub order_id: OrderId,
    /// State before the transition.
    pub from: OrderState,
    /// State after the transition.
    pub to: OrderState,
    /// Broker-assigned id, present from SUBMITTED onward.
    pub broker_order_id: Option<BrokerId>,
    /// Cumulative filled quantity as of this transition.
    pub filled_qty: Option<Quantity>,
    /// Fill price carried by this transition, if any.
    pub fill_price: Option<Money>,
    /// Rejection/cancellation reason text, if any.
    pub reason: Option<String>,
    /// When the transition was applied.
    pub occurred_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_state_changed_serde_roundtrip() {
        let event = OrderStateChanged {
            order_id: OrderId::new("ord-1"),
            from: OrderState::Pending,
            to: OrderState::Submitted,
            broker_order_id: Some(BrokerId::new("b-1")),
            filled_qty: None,
            fill_price: None,
            reason: None,
            occurred_at: Timestamp::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: OrderStateChanged = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn order_state_changed_carries_fill_payload() {
        let event = OrderStateChanged {
            order_id: OrderId::new("ord-1"),
            from: OrderState::Submitted,
            to: OrderState::PartiallyFilled,
            broker_order_id: Some(BrokerId::new("b-1")),
            filled_qty: Some(Quantity::from_i64(40)),
            fill_price: Some(Money::usd(150.0)),
            reason: None,
            occurred_at: Timestamp::now(),
        };

        assert_eq!(event.filled_qty, Some(Quantity::from_i64(40)));
    }
}
