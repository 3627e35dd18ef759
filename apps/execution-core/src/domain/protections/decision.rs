//! Shared types passed between the protection stack and its members.

use crate::domain::shared::{Money, Symbol, Timestamp};

/// What a single `Protection` (or the `RiskManager`) decided about a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionDecision {
    /// Whether the signal may proceed.
    pub allowed: bool,
    /// Name of the protection that produced this decision, for journaling.
    pub protection: String,
    /// Human-readable reason, present whenever `allowed` is false.
    pub reason: Option<String>,
    /// Set when the protection itself failed (panicked or errored) rather
    /// than legitimately vetoing. A fail-open decision is always `allowed`.
    pub protection_error: bool,
}

impl ProtectionDecision {
    /// A protection that let the signal through cleanly.
    #[must_use]
    pub fn allow(protection: impl Into<String>) -> Self {
        Self {
            allowed: true,
            protection: protection.into(),
            reason: None,
            protection_error: false,
        }
    }

    /// A protection that vetoed the signal.
    #[must_use]
    pub fn reject(protection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            protection: protection.into(),
            reason: Some(reason.into()),
            protection_error: false,
        }
    }

    /// A protection whose internal check could not run; fails open per the
    /// narrowly-scoped fail-open policy, but is journaled identically to a
    /// triggered veto so it shows up in an audit.
    #[must_use]
    pub fn fail_open(protection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            protection: protection.into(),
            reason: Some(reason.into()),
            protection_error: true,
        }
    }
}

/// Immutable snapshot a `Protection` evaluates against. Built fresh for each
/// signal; protections never reach out to external state themselves.
#[derive(Debug, Clone)]
pub struct ProtectionContext {
    pub symbol: Symbol,
    pub strategy: String,
    pub now: Timestamp,
}

/// Record of a closed trade's result, fed to protections that track history
/// (`DailyLossLimit`, `MaxDrawdownProtection`, `StoplossGuard`,
/// `CooldownPeriod`).
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub symbol: Symbol,
    pub realized_pnl: Money,
    pub closed_at: Timestamp,
}
