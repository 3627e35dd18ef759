//! Reasons for order rejection and cancellation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason an order was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RejectReason {
    /// Short machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl RejectReason {
    /// Create a new reject reason.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Insufficient buying power.
    #[must_use]
    pub fn insufficient_buying_power() -> Self {
        Self::new(
            "INSUFFICIENT_BUYING_POWER",
            "Insufficient buying power for order",
        )
    }

    /// Market closed.
    #[must_use]
    pub fn market_closed() -> Self {
        Self::new("MARKET_CLOSED", "Market is closed")
    }

    /// Risk or protection check failed.
    #[must_use]
    pub fn risk_rejected(reason: impl Into<String>) -> Self {
        Self::new("RISK_REJECTED", reason)
    }

    /// Broker rejected the submission.
    #[must_use]
    pub fn broker_error(message: impl Into<String>) -> Self {
        Self::new("BROKER_ERROR", message)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Reason an order was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CancelReason {
    /// Short machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl CancelReason {
    /// Create a new cancel reason.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// User or operator requested cancellation.
    #[must_use]
    pub fn user_requested() -> Self {
        Self::new("USER_REQUESTED", "Cancelled by user request")
    }

    /// The opposite protective order filled (synthetic OCO).
    #[must_use]
    pub fn oco_filled() -> Self {
        Self::new("OCO_FILLED", "Cancelled: sibling protective order filled")
    }

    /// Position is being closed; outstanding protective orders must go first.
    #[must_use]
    pub fn position_closing() -> Self {
        Self::new("POSITION_CLOSING", "Cancelled ahead of position exit")
    }

    /// Day order cancelled at end of trading session.
    #[must_use]
    pub fn end_of_day() -> Self {
        Self::new("END_OF_DAY", "Day order cancelled at end of trading day")
    }

    /// Cancelled due to a detected broker/runtime disconnect.
    #[must_use]
    pub fn disconnect_safety() -> Self {
        Self::new("DISCONNECT_SAFETY", "Cancelled due to broker disconnect")
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
