//! Runtime coordinator (C11): a pure per-signal decision function.
//!
//! Every input is an immutable snapshot; nothing here touches I/O or a
//! clock directly (the caller stamps `now`). Each helper guard is
//! independently testable so the transition table in `evaluate_signal` stays
//! a thin composition of already-proven pieces.

use crate::application::dto::{Signal, SignalDecision, SignalSide, SkipReason};
use crate::domain::order_execution::value_objects::OrderType;
use crate::domain::protections::ProtectionDecision;
use crate::domain::shared::{Money, Quantity, Timestamp};

/// Whether (and how) the single-trade guard already resolved this signal.
/// Computed by the caller (the guard itself is not pure); exits pass
/// `NotApplicable` since they bypass the guard entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleTradeState {
    NotApplicable,
    Reserved,
    Blocked,
}

/// Snapshot of whether a position exists for the signal's symbol, and how
/// much of it is held — enough for sell-side sizing without a live query.
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot {
    pub has_position: bool,
    pub held_quantity: Quantity,
}

/// How long ago this `(strategy, symbol, side)` last acted, if ever.
#[derive(Debug, Clone, Copy)]
pub struct CooldownState {
    pub last_action_at: Option<Timestamp>,
}

/// `true` if the cooldown has *not* elapsed (i.e. the signal should be
/// blocked). `cooldown_s = 0` means cooldown is disabled.
#[must_use]
pub fn check_cooldown(state: CooldownState, now: Timestamp, cooldown_s: i64) -> bool {
    if cooldown_s <= 0 {
        return false;
    }
    match state.last_action_at {
        Some(last) => now.duration_since(last).num_seconds() < cooldown_s,
        None => false,
    }
}

/// `true` if the single-trade state should block this (non-exit) signal.
#[must_use]
pub const fn check_single_trade(state: SingleTradeState) -> bool {
    matches!(state, SingleTradeState::Blocked)
}

/// `true` if a SELL signal has nothing to sell against.
#[must_use]
pub const fn check_position_for_sell(is_exit: bool, snapshot: &MarketSnapshot) -> bool {
    is_exit && !snapshot.has_position
}

/// Cap a sell quantity to what is actually held; never sell more than the
/// position.
#[must_use]
pub fn cap_sell_qty(requested: Quantity, snapshot: &MarketSnapshot) -> Quantity {
    if requested > snapshot.held_quantity {
        snapshot.held_quantity
    } else {
        requested
    }
}

/// Fold the risk manager's (possibly-capped) approved quantity into the
/// requested one. Returns `None` when risk reduced the order to zero or
/// below.
#[must_use]
pub fn apply_risk_qty(requested: Quantity, risk_decision: &ProtectionDecision, approved_qty: Option<Quantity>) -> Option<Quantity> {
    if !risk_decision.allowed {
        return None;
    }
    let qty = approved_qty.unwrap_or(requested);
    if qty.is_zero() || qty.is_negative() {
        None
    } else {
        Some(qty)
    }
}

/// Compose every pre-trade guard into a single decision for one signal.
///
/// Evaluation order mirrors §4.10: single-trade guard, cooldown, protection
/// stack, then risk sizing — the first failure short-circuits the rest.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn evaluate_signal(
    signal: &Signal,
    market: &MarketSnapshot,
    single_trade: SingleTradeState,
    cooldown: CooldownState,
    cooldown_s: i64,
    protection: &ProtectionDecision,
    risk: &ProtectionDecision,
    risk_approved_qty: Option<Quantity>,
    now: Timestamp,
) -> SignalDecision {
    if signal.quantity.is_zero() || signal.quantity.is_negative() {
        return SignalDecision::skip(SkipReason::QtyZero);
    }

    if signal.order_type == OrderType::Limit && signal.limit_price.is_none() {
        return SignalDecision::skip(SkipReason::LimitMissingPrice);
    }

    if signal.side == SignalSide::Sell {
        if check_position_for_sell(signal.is_exit, market) {
            return SignalDecision::skip(SkipReason::NoPositionToSell);
        }
    } else if !signal.is_exit && market.has_position {
        return SignalDecision::skip(SkipReason::PositionExists);
    }

    if !signal.is_exit && check_single_trade(single_trade) {
        return SignalDecision::skip(SkipReason::SingleTradeBlock);
    }

    if check_cooldown(cooldown, now, cooldown_s) {
        return SignalDecision::skip(SkipReason::Cooldown);
    }

    if !protection.allowed {
        let detail = protection.reason.clone().unwrap_or_default();
        return SignalDecision::skip_with(SkipReason::ProtectionBlock, detail);
    }

    let Some(final_qty) = apply_risk_qty(signal.quantity, risk, risk_approved_qty) else {
        if risk.allowed {
            return SignalDecision::skip(SkipReason::QtyNonpositiveAfterRisk);
        }
        let detail = risk.reason.clone().unwrap_or_default();
        return SignalDecision::skip_with(SkipReason::RiskBlock, detail);
    };

    let final_qty = if signal.side == SignalSide::Sell {
        cap_sell_qty(final_qty, market)
    } else {
        final_qty
    };

    match signal.order_type {
        OrderType::Market | OrderType::Stop => SignalDecision::SubmitMarket { quantity: final_qty },
        OrderType::Limit => SignalDecision::SubmitLimit {
            quantity: final_qty,
            limit_price: signal.limit_price.unwrap_or(Money::ZERO),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{Symbol, TradeId};

    fn base_signal() -> Signal {
        Signal {
            trade_id: TradeId::new("t-1"),
            strategy: "momentum".to_string(),
            symbol: Symbol::new("SPY"),
            side: SignalSide::Buy,
            quantity: Quantity::from_i64(10),
            price: Money::usd(500.0),
            order_type: OrderType::Market,
            limit_price: None,
            stop_loss: None,
            take_profit: None,
            ttl_seconds: None,
            is_exit: false,
        }
    }

    fn flat_market() -> MarketSnapshot {
        MarketSnapshot {
            has_position: false,
            held_quantity: Quantity::ZERO,
        }
    }

    fn no_cooldown() -> CooldownState {
        CooldownState { last_action_at: None }
    }

    #[test]
    fn zero_quantity_skips() {
        let mut signal = base_signal();
        signal.quantity = Quantity::ZERO;
        let decision = evaluate_signal(
            &signal,
            &flat_market(),
            SingleTradeState::Reserved,
            no_cooldown(),
            0,
            &ProtectionDecision::allow("stack"),
            &ProtectionDecision::allow("risk"),
            None,
            Timestamp::now(),
        );
        assert_eq!(decision, SignalDecision::skip(SkipReason::QtyZero));
    }

    #[test]
    fn limit_without_price_skips() {
        let mut signal = base_signal();
        signal.order_type = OrderType::Limit;
        let decision = evaluate_signal(
            &signal,
            &flat_market(),
            SingleTradeState::Reserved,
            no_cooldown(),
            0,
            &ProtectionDecision::allow("stack"),
            &ProtectionDecision::allow("risk"),
            None,
            Timestamp::now(),
        );
        assert_eq!(decision, SignalDecision::skip(SkipReason::LimitMissingPrice));
    }

    #[test]
    fn single_trade_block_skips_entry() {
        let signal = base_signal();
        let decision = evaluate_signal(
            &signal,
            &flat_market(),
            SingleTradeState::Blocked,
            no_cooldown(),
            0,
            &ProtectionDecision::allow("stack"),
            &ProtectionDecision::allow("risk"),
            None,
            Timestamp::now(),
        );
        assert_eq!(decision, SignalDecision::skip(SkipReason::SingleTradeBlock));
    }

    #[test]
    fn sell_without_position_skips() {
        let mut signal = base_signal();
        signal.side = SignalSide::Sell;
        signal.is_exit = true;
        let decision = evaluate_signal(
            &signal,
            &flat_market(),
            SingleTradeState::NotApplicable,
            no_cooldown(),
            0,
            &ProtectionDecision::allow("stack"),
            &ProtectionDecision::allow("risk"),
            None,
            Timestamp::now(),
        );
        assert_eq!(decision, SignalDecision::skip(SkipReason::NoPositionToSell));
    }

    #[test]
    fn sell_exit_caps_quantity_to_held() {
        let mut signal = base_signal();
        signal.side = SignalSide::Sell;
        signal.is_exit = true;
        signal.quantity = Quantity::from_i64(100);
        let market = MarketSnapshot {
            has_position: true,
            held_quantity: Quantity::from_i64(10),
        };
        let decision = evaluate_signal(
            &signal,
            &market,
            SingleTradeState::NotApplicable,
            no_cooldown(),
            0,
            &ProtectionDecision::allow("stack"),
            &ProtectionDecision::allow("risk"),
            None,
            Timestamp::now(),
        );
        assert_eq!(
            decision,
            SignalDecision::SubmitMarket {
                quantity: Quantity::from_i64(10)
            }
        );
    }

    #[test]
    fn protection_veto_skips_with_detail() {
        let signal = base_signal();
        let decision = evaluate_signal(
            &signal,
            &flat_market(),
            SingleTradeState::Reserved,
            no_cooldown(),
            0,
            &ProtectionDecision::reject("daily_loss_limit", "limit reached"),
            &ProtectionDecision::allow("risk"),
            None,
            Timestamp::now(),
        );
        assert_eq!(
            decision,
            SignalDecision::skip_with(SkipReason::ProtectionBlock, "limit reached")
        );
    }

    #[test]
    fn cooldown_blocks_within_window() {
        let now = Timestamp::now();
        let state = CooldownState { last_action_at: Some(now) };
        assert!(check_cooldown(state, now, 60));
    }

    #[test]
    fn happy_path_submits_market_order() {
        let signal = base_signal();
        let decision = evaluate_signal(
            &signal,
            &flat_market(),
            SingleTradeState::Reserved,
            no_cooldown(),
            0,
            &ProtectionDecision::allow("stack"),
            &ProtectionDecision::allow("risk"),
            None,
            Timestamp::now(),
        );
        assert_eq!(
            decision,
            SignalDecision::SubmitMarket {
                quantity: Quantity::from_i64(10)
            }
        );
    }
}
