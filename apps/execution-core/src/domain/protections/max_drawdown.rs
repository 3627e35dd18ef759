//! Reject entries while cumulative P&L has drawn down too far from its
//! recent peak, with a cooldown after the trigger fires.

use std::sync::Mutex;

use chrono::Duration;

use crate::domain::shared::{Money, Timestamp};

use super::decision::{ProtectionContext, ProtectionDecision, TradeOutcome};
use super::stack::Protection;

struct State {
    /// (timestamp, cumulative realized pnl at that point) for the lookback
    /// window; pruned as it ages out.
    history: Vec<(Timestamp, Money)>,
    cumulative_pnl: Money,
    peak: Money,
    triggered_until: Option<Timestamp>,
}

pub struct MaxDrawdownProtection {
    lookback: Duration,
    threshold_pct: f64,
    cooldown: Duration,
    enabled: bool,
    state: Mutex<State>,
}

impl MaxDrawdownProtection {
    #[must_use]
    pub fn new(lookback: Duration, threshold_pct: f64, cooldown: Duration, enabled: bool) -> Self {
        Self {
            lookback,
            threshold_pct,
            cooldown,
            enabled,
            state: Mutex::new(State {
                history: Vec::new(),
                cumulative_pnl: Money::usd(0.0),
                peak: Money::usd(0.0),
                triggered_until: None,
            }),
        }
    }

    fn prune(&self, state: &mut State, now: Timestamp) {
        let cutoff = now.as_datetime() - self.lookback;
        state.history.retain(|(ts, _)| ts.as_datetime() >= cutoff);
    }
}

impl Protection for MaxDrawdownProtection {
    fn name(&self) -> &str {
        "max_drawdown"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn check(&self, ctx: &ProtectionContext) -> ProtectionDecision {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.prune(&mut state, ctx.now);

        if let Some(until) = state.triggered_until {
            if ctx.now.as_datetime() < until.as_datetime() {
                return ProtectionDecision::reject(self.name(), "max drawdown cooldown in effect");
            }
        }

        let peak = state
            .history
            .iter()
            .map(|(_, pnl)| *pnl)
            .fold(state.peak, |acc, pnl| if pnl > acc { pnl } else { acc });
        if peak.is_positive() {
            let drawdown = peak - state.cumulative_pnl;
            let peak_decimal: rust_decimal::Decimal = peak.into();
            if !peak_decimal.is_zero() {
                let drawdown_decimal: rust_decimal::Decimal = drawdown.into();
                let pct = (drawdown_decimal / peak_decimal).to_string().parse::<f64>().unwrap_or(0.0);
                if pct >= self.threshold_pct {
                    state.triggered_until = Some(Timestamp::new(ctx.now.as_datetime() + self.cooldown));
                    return ProtectionDecision::reject(
                        self.name(),
                        format!("drawdown {:.1}% exceeds threshold {:.1}%", pct * 100.0, self.threshold_pct * 100.0),
                    );
                }
            }
        }
        ProtectionDecision::allow(self.name())
    }

    fn record_trade_closed(&self, outcome: &TradeOutcome) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.cumulative_pnl = state.cumulative_pnl + outcome.realized_pnl;
        if state.cumulative_pnl > state.peak {
            state.peak = state.cumulative_pnl;
        }
        let cumulative_pnl = state.cumulative_pnl;
        state.history.push((outcome.closed_at, cumulative_pnl));
    }
}
