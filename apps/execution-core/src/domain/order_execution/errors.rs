//! Order execution errors.

use std::fmt;

use super::value_objects::OrderState;
use crate::domain::shared::OrderId;

/// Errors raised by the `Order` aggregate and `OrderStateMachine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The requested `(from_state, to_state)` pair is not in the legal transition table.
    InvalidTransition {
        /// Order affected.
        order_id: OrderId,
        /// Current state.
        from: OrderState,
        /// Attempted state.
        to: OrderState,
    },

    /// The order is already in a terminal state; no further mutation is valid (I3).
    TerminalState {
        /// Order affected.
        order_id: OrderId,
        /// Terminal state the order is stuck in.
        state: OrderState,
    },

    /// A transition that requires a `broker_order_id` was attempted without one (I5).
    BrokerConfirmationRequired {
        /// Order affected.
        order_id: OrderId,
    },

    /// Required inputs for this transition were missing (e.g. no `reason` on a rejection).
    MissingRequiredInput {
        /// Order affected.
        order_id: OrderId,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A fill would push `filled_qty` above `quantity` (I1).
    FillExceedsQuantity {
        /// Order affected.
        order_id: OrderId,
    },

    /// `create_order` was called with an id already present in the map.
    DuplicateOrder {
        /// Duplicate id.
        order_id: OrderId,
    },

    /// Optimistic-concurrency check failed: recorded state no longer matches `from_state`.
    StateMismatch {
        /// Order affected.
        order_id: OrderId,
        /// State the caller expected.
        expected: OrderState,
        /// State actually recorded.
        actual: OrderState,
    },

    /// No order exists with the given id.
    NotFound {
        /// Missing order id.
        order_id: OrderId,
    },

    /// Invalid order parameters supplied at creation time.
    InvalidParameters {
        /// Field with the invalid value.
        field: String,
        /// Description of the problem.
        message: String,
    },
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { order_id, from, to } => {
                write!(f, "order {order_id}: invalid transition {from} -> {to}")
            }
            Self::TerminalState { order_id, state } => {
                write!(f, "order {order_id}: already terminal ({state})")
            }
            Self::BrokerConfirmationRequired { order_id } => {
                write!(f, "order {order_id}: transition requires a broker_order_id")
            }
            Self::MissingRequiredInput { order_id, field } => {
                write!(f, "order {order_id}: missing required input '{field}'")
            }
            Self::FillExceedsQuantity { order_id } => {
                write!(f, "order {order_id}: fill would exceed order quantity")
            }
            Self::DuplicateOrder { order_id } => {
                write!(f, "order {order_id}: already exists")
            }
            Self::StateMismatch {
                order_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "order {order_id}: expected state {expected}, found {actual}"
                )
            }
            Self::NotFound { order_id } => {
                write!(f, "order {order_id}: not found")
            }
            Self::InvalidParameters { field, message } => {
                write!(f, "invalid order parameter '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for OrderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let err = OrderError::InvalidTransition {
            order_id: OrderId::new("ord-1"),
            from: OrderState::Filled,
            to: OrderState::Cancelled,
        };
        let msg = format!("{err}");
        assert!(msg.contains("FILLED"));
        assert!(msg.contains("CANCELLED"));
    }

    #[test]
    fn terminal_state_display() {
        let err = OrderError::TerminalState {
            order_id: OrderId::new("ord-1"),
            state: OrderState::Rejected,
        };
        assert!(format!("{err}").contains("REJECTED"));
    }

    #[test]
    fn duplicate_order_display() {
        let err = OrderError::DuplicateOrder {
            order_id: OrderId::new("ord-1"),
        };
        assert!(format!("{err}").contains("already exists"));
    }

    #[test]
    fn is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(OrderError::NotFound {
            order_id: OrderId::new("ord-1"),
        });
        assert!(!err.to_string().is_empty());
    }
}
