//! Application services: the order-execution pipeline, reconciliation,
//! recovery, and the runtime's per-signal decision function.

pub mod execution_engine;
pub mod reconciler;
pub mod recovery;
pub mod runtime_coordinator;
pub mod single_trade_guard;

pub use execution_engine::{ExecutionEngine, ExecutionEngineError};
pub use reconciler::{CheckResult, Discrepancy, DiscrepancyType, PeriodicReconciler, ReconciliationPolicy, StartupReconciler};
pub use recovery::{RecoveryCoordinator, RecoveryError, RecoveryOutcome, StatePersistence, StateSnapshot, SubsystemHealthMonitor};
pub use runtime_coordinator::{evaluate_signal, CooldownState, MarketSnapshot, SingleTradeState};
pub use single_trade_guard::{GuardAction, GuardHistoryEntry, ReservationOutcome, SingleTradeGuard};
