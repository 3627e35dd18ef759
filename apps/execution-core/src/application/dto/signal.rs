//! The signal contract strategies submit into the core (§6.2).

use serde::{Deserialize, Serialize};

use crate::domain::order_execution::value_objects::OrderType;
use crate::domain::shared::{Money, Quantity, Symbol, TradeId};

/// Trade direction as strategies express it. Distinct from
/// [`OrderSide`](crate::domain::order_execution::value_objects::OrderSide):
/// a `Signal` speaks BUY/SELL, the order aggregate speaks LONG/SHORT, and
/// the mapping (plus exit handling) is the coordinator's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSide {
    Buy,
    Sell,
}

/// A trading intent submitted by a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub trade_id: TradeId,
    pub strategy: String,
    pub symbol: Symbol,
    pub side: SignalSide,
    pub quantity: Quantity,
    /// Reference price the strategy observed when generating the signal.
    pub price: Money,
    pub order_type: OrderType,
    pub limit_price: Option<Money>,
    pub stop_loss: Option<Money>,
    pub take_profit: Option<Money>,
    pub ttl_seconds: Option<u64>,
    /// True when this signal closes an existing position rather than
    /// opening or adding to one. Exits bypass the single-trade guard.
    pub is_exit: bool,
}

/// Fixed set of reasons a signal can be skipped (§4.11). Kept as a flat enum
/// rather than a string so callers can match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    NoSignal,
    QtyZero,
    SingleTradeBlock,
    Cooldown,
    ProtectionBlock,
    RiskBlock,
    PositionExists,
    NoPositionToSell,
    QtyNonpositiveAfterRisk,
    LimitMissingPrice,
    MarketDataError,
    ValidationError,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// What the runtime coordinator decided to do with a signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalDecision {
    /// Submit a market order for `quantity` (after risk adjustment).
    SubmitMarket { quantity: Quantity },
    /// Submit a limit order at `limit_price` for `quantity`.
    SubmitLimit { quantity: Quantity, limit_price: Money },
    /// Do not submit; `reason` is always journaled alongside the signal's
    /// `trade_id`.
    Skip { reason: SkipReason, detail: Option<String> },
}

impl SignalDecision {
    #[must_use]
    pub fn skip(reason: SkipReason) -> Self {
        Self::Skip { reason, detail: None }
    }

    #[must_use]
    pub fn skip_with(reason: SkipReason, detail: impl Into<String>) -> Self {
        Self::Skip {
            reason,
            detail: Some(detail.into()),
        }
    }
}
