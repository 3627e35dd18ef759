//! Order lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of an order as tracked by the `OrderStateMachine`.
///
/// `PENDING -> SUBMITTED -> {PARTIALLY_FILLED <-> FILLED} | CANCELLED | REJECTED | EXPIRED`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Created locally, not yet sent to the broker.
    Pending,
    /// Acknowledged by the broker; a `broker_order_id` is assigned.
    Submitted,
    /// Some but not all of the quantity has filled.
    PartiallyFilled,
    /// The full quantity has filled.
    Filled,
    /// Cancelled before or during execution.
    Cancelled,
    /// Rejected by the broker or by local validation.
    Rejected,
    /// Time-in-force elapsed without a fill.
    Expired,
}

impl OrderState {
    /// Returns true once no further mutation is valid (invariant I3).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }

    /// "Pending" in the operational sense used by `get_pending_orders`:
    /// state in {PENDING, SUBMITTED, PARTIALLY_FILLED}.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Submitted | Self::PartiallyFilled)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!OrderState::Pending.is_terminal());
        assert!(!OrderState::Submitted.is_terminal());
        assert!(!OrderState::PartiallyFilled.is_terminal());
        assert!(OrderState::Filled.is_terminal());
        assert!(OrderState::Cancelled.is_terminal());
        assert!(OrderState::Rejected.is_terminal());
        assert!(OrderState::Expired.is_terminal());
    }

    #[test]
    fn open_states() {
        assert!(OrderState::Pending.is_open());
        assert!(OrderState::Submitted.is_open());
        assert!(OrderState::PartiallyFilled.is_open());
        assert!(!OrderState::Filled.is_open());
        assert!(!OrderState::Cancelled.is_open());
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(format!("{}", OrderState::PartiallyFilled), "PARTIALLY_FILLED");
        assert_eq!(format!("{}", OrderState::Cancelled), "CANCELLED");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&OrderState::PartiallyFilled).unwrap();
        assert_eq!(json, "\"PARTIALLY_FILLED\"");
        let parsed: OrderState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, OrderState::PartiallyFilled);
    }
}
