//! Protection stack and risk manager — the pre-trade veto chain (C10).
//!
//! Evaluated, in order, ahead of order submission: the single-trade guard
//! and cooldown gate live in [`crate::application::services`] since they
//! need process-wide state beyond what a pure domain type should own; this
//! module holds the six `Protection` implementations plus the final
//! position-sizing gate.

pub mod cooldown_period;
pub mod daily_loss_limit;
pub mod decision;
pub mod max_drawdown;
pub mod risk_manager;
pub mod stack;
pub mod stoploss_guard;
pub mod time_window;
pub mod volatility_halt;

pub use cooldown_period::CooldownPeriod;
pub use daily_loss_limit::DailyLossLimit;
pub use decision::{ProtectionContext, ProtectionDecision, TradeOutcome};
pub use max_drawdown::MaxDrawdownProtection;
pub use risk_manager::{AccountState, RiskLimits, RiskManager};
pub use stack::{Protection, ProtectionStack};
pub use stoploss_guard::StoplossGuard;
pub use time_window::TimeWindowProtection;
pub use volatility_halt::VolatilityHalt;
