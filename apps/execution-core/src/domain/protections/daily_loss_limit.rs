//! Reject new entries once today's realized losses reach a ceiling.

use std::sync::Mutex;

use chrono::Datelike;

use crate::domain::shared::Money;

use super::decision::{ProtectionContext, ProtectionDecision, TradeOutcome};
use super::stack::Protection;

struct DayState {
    day: (i32, u32, u32),
    realized_loss: Money,
}

/// Resets at UTC midnight. `realized_loss` only accumulates losing trades;
/// winners do not offset it, matching "intraday drawdown in USD".
pub struct DailyLossLimit {
    limit: Money,
    enabled: bool,
    state: Mutex<DayState>,
}

impl DailyLossLimit {
    #[must_use]
    pub fn new(limit: Money, enabled: bool) -> Self {
        Self {
            limit,
            enabled,
            state: Mutex::new(DayState {
                day: (0, 0, 0),
                realized_loss: Money::usd(0.0),
            }),
        }
    }

    fn day_key(ts: chrono::DateTime<chrono::Utc>) -> (i32, u32, u32) {
        (ts.year(), ts.month(), ts.day())
    }
}

impl Protection for DailyLossLimit {
    fn name(&self) -> &str {
        "daily_loss_limit"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, ctx: &ProtectionContext) -> ProtectionDecision {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let today = Self::day_key(ctx.now.as_datetime());
        if state.day != today {
            state.day = today;
            state.realized_loss = Money::usd(0.0);
        }
        if state.realized_loss >= self.limit {
            return ProtectionDecision::reject(
                self.name(),
                format!("intraday loss {} has reached the limit {}", state.realized_loss, self.limit),
            );
        }
        ProtectionDecision::allow(self.name())
    }

    fn record_trade_closed(&self, outcome: &TradeOutcome) {
        if outcome.realized_pnl.is_negative() {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let today = Self::day_key(outcome.closed_at.as_datetime());
            if state.day != today {
                state.day = today;
                state.realized_loss = Money::usd(0.0);
            }
            state.realized_loss = state.realized_loss + outcome.realized_pnl.abs();
        }
    }
}
