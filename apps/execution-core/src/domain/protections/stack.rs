//! `Protection` trait and the `ProtectionStack` that runs a closed set of
//! them in order.

use std::panic::{AssertUnwindSafe, catch_unwind};

use super::decision::{ProtectionContext, ProtectionDecision, TradeOutcome};

/// A single pre-trade veto check. Implementations hold whatever history they
/// need internally (behind their own interior mutability) and are fed trade
/// outcomes via `record_trade_closed`.
pub trait Protection: Send + Sync {
    /// Stable name used in journaled decisions and logs.
    fn name(&self) -> &str;

    /// A disabled protection is skipped without being evaluated.
    fn enabled(&self) -> bool;

    /// Evaluate the protection against the given context.
    fn check(&self, ctx: &ProtectionContext) -> ProtectionDecision;

    /// Update internal history after a trade closes. No-op for protections
    /// that don't track trade outcomes.
    fn record_trade_closed(&self, _outcome: &TradeOutcome) {}
}

/// Runs every enabled protection in registration order, stopping at the
/// first veto. A protection whose `check` panics is treated as fail-open:
/// the panic is caught, logged, and surfaced as a `protection_error`
/// decision rather than unwinding into the caller.
pub struct ProtectionStack {
    protections: Vec<Box<dyn Protection>>,
}

impl ProtectionStack {
    #[must_use]
    pub fn new(protections: Vec<Box<dyn Protection>>) -> Self {
        Self { protections }
    }

    /// Evaluate every enabled protection in order; return the first veto, or
    /// an overall `allow` if none fired.
    #[must_use]
    pub fn evaluate(&self, ctx: &ProtectionContext) -> ProtectionDecision {
        for protection in &self.protections {
            if !protection.enabled() {
                continue;
            }
            let name = protection.name().to_string();
            let decision = catch_unwind(AssertUnwindSafe(|| protection.check(ctx))).unwrap_or_else(|_| {
                tracing::error!(protection = %name, "protection check panicked, failing open");
                ProtectionDecision::fail_open(name.clone(), "protection check panicked")
            });
            if !decision.allowed {
                return decision;
            }
        }
        ProtectionDecision::allow("protection_stack")
    }

    /// Fan a closed trade's outcome out to every protection that tracks
    /// history.
    pub fn record_trade_closed(&self, outcome: &TradeOutcome) {
        for protection in &self.protections {
            protection.record_trade_closed(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::{Symbol, Timestamp};

    struct AlwaysBlock;
    impl Protection for AlwaysBlock {
        fn name(&self) -> &str {
            "always_block"
        }
        fn enabled(&self) -> bool {
            true
        }
        fn check(&self, _ctx: &ProtectionContext) -> ProtectionDecision {
            ProtectionDecision::reject("always_block", "no")
        }
    }

    struct Panics;
    impl Protection for Panics {
        fn name(&self) -> &str {
            "panics"
        }
        fn enabled(&self) -> bool {
            true
        }
        fn check(&self, _ctx: &ProtectionContext) -> ProtectionDecision {
            panic!("boom");
        }
    }

    fn ctx() -> ProtectionContext {
        ProtectionContext {
            symbol: Symbol::new("AAPL"),
            strategy: "momentum".to_string(),
            now: Timestamp::now(),
        }
    }

    #[test]
    fn first_veto_stops_evaluation() {
        let stack = ProtectionStack::new(vec![Box::new(AlwaysBlock)]);
        let decision = stack.evaluate(&ctx());
        assert!(!decision.allowed);
        assert_eq!(decision.protection, "always_block");
    }

    #[test]
    fn panicking_protection_fails_open() {
        let stack = ProtectionStack::new(vec![Box::new(Panics)]);
        let decision = stack.evaluate(&ctx());
        assert!(decision.allowed);
        assert!(decision.protection_error);
    }

    #[test]
    fn empty_stack_allows() {
        let stack = ProtectionStack::new(vec![]);
        assert!(stack.evaluate(&ctx()).allowed);
    }
}
