//! Reject new entries into a symbol after a losing streak, within a lookback
//! window. A win resets the streak.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Duration;

use crate::domain::shared::{Symbol, Timestamp};

use super::decision::{ProtectionContext, ProtectionDecision, TradeOutcome};
use super::stack::Protection;

struct SymbolHistory {
    /// (closed_at, was_loss) for trades within the lookback, oldest first.
    trades: Vec<(Timestamp, bool)>,
}

pub struct StoplossGuard {
    max_losses: usize,
    lookback: Duration,
    enabled: bool,
    by_symbol: Mutex<HashMap<Symbol, SymbolHistory>>,
}

impl StoplossGuard {
    #[must_use]
    pub fn new(max_losses: usize, lookback: Duration, enabled: bool) -> Self {
        Self {
            max_losses,
            lookback,
            enabled,
            by_symbol: Mutex::new(HashMap::new()),
        }
    }

    fn current_streak(&self, history: &mut SymbolHistory, now: Timestamp) -> usize {
        let cutoff = now.as_datetime() - self.lookback;
        history.trades.retain(|(ts, _)| ts.as_datetime() >= cutoff);
        history
            .trades
            .iter()
            .rev()
            .take_while(|(_, was_loss)| *was_loss)
            .count()
    }
}

impl Protection for StoplossGuard {
    fn name(&self) -> &str {
        "stoploss_guard"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, ctx: &ProtectionContext) -> ProtectionDecision {
        let mut by_symbol = self.by_symbol.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let history = by_symbol.entry(ctx.symbol.clone()).or_insert_with(|| SymbolHistory { trades: Vec::new() });
        let streak = self.current_streak(history, ctx.now);
        if streak >= self.max_losses {
            return ProtectionDecision::reject(
                self.name(),
                format!("{} of the last trades on {} were losers", streak, ctx.symbol),
            );
        }
        ProtectionDecision::allow(self.name())
    }

    fn record_trade_closed(&self, outcome: &TradeOutcome) {
        let mut by_symbol = self.by_symbol.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let history = by_symbol
            .entry(outcome.symbol.clone())
            .or_insert_with(|| SymbolHistory { trades: Vec::new() });
        history.trades.push((outcome.closed_at, outcome.realized_pnl.is_negative()));
    }
}
