//! Global pause after any single trade loses more than a threshold.
//!
//! Distinct from the per-(strategy, symbol, side) cooldown checked ahead of
//! the protection stack (§4.10 step 2): this one fires off the *size* of a
//! loss and pauses every symbol, not just the one that lost.

use std::sync::Mutex;

use chrono::Duration;

use crate::domain::shared::{Money, Timestamp};

use super::decision::{ProtectionContext, ProtectionDecision, TradeOutcome};
use super::stack::Protection;

pub struct CooldownPeriod {
    loss_threshold: Money,
    cooldown: Duration,
    enabled: bool,
    paused_until: Mutex<Option<Timestamp>>,
}

impl CooldownPeriod {
    #[must_use]
    pub fn new(loss_threshold: Money, cooldown: Duration, enabled: bool) -> Self {
        Self {
            loss_threshold,
            cooldown,
            enabled,
            paused_until: Mutex::new(None),
        }
    }
}

impl Protection for CooldownPeriod {
    fn name(&self) -> &str {
        "cooldown_period"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, ctx: &ProtectionContext) -> ProtectionDecision {
        let paused_until = self.paused_until.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(until) = *paused_until {
            if ctx.now.as_datetime() < until.as_datetime() {
                return ProtectionDecision::reject(self.name(), "global loss cooldown in effect");
            }
        }
        ProtectionDecision::allow(self.name())
    }

    fn record_trade_closed(&self, outcome: &TradeOutcome) {
        if outcome.realized_pnl.is_negative() && outcome.realized_pnl.abs() > self.loss_threshold {
            let mut paused_until = self.paused_until.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *paused_until = Some(Timestamp::new(outcome.closed_at.as_datetime() + self.cooldown));
        }
    }
}
