// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Execution Core - Rust Core Library
//!
//! Deterministic order-execution core for an automated trading system:
//! a single-threaded order state machine, a durable transaction log and
//! position store, startup/periodic reconciliation against the broker,
//! a protection/risk stack, and the recovery coordinator that ties them
//! back together after a restart.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! The core follows Clean Architecture principles with Domain-Driven Design:
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic (aggregates, value objects, domain events)
//!   - `order_execution`: Order aggregate, state machine, transaction log/event bus ports
//!   - `protections`: Loss limits, drawdown, cooldown protections and risk sizing
//!   - `shared`: Value objects (`Money`, `Quantity`, identifiers), the injectable clock
//!
//! - **Application**: Services and port definitions
//!   - `ports`: Interfaces for external systems (`Broker`, `EventPublisherPort`)
//!   - `services`: `ExecutionEngine`, `StartupReconciler`/`PeriodicReconciler`,
//!     `RecoveryCoordinator`, `SingleTradeGuard`, the runtime's per-signal
//!     decision function
//!   - `dto`: Data transfer objects for the signal boundary
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `transaction_log`: append-only, checksummed, crash-safe event log
//!   - `position_store`: embedded ACID key-value store keyed by symbol
//!   - `event_bus`: bounded in-process publish/subscribe for domain events
//!   - `journal`: daily-rotated human-readable trade journal

#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, deny(unsafe_code))]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Configuration loading and validation.
pub mod config;

/// Top-level error aggregation.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::order_execution::{
    aggregate::{NewOrder, Order},
    value_objects::{CancelReason, OrderSide, OrderState, OrderType, RejectReason, TimeInForce},
};
pub use domain::order_execution::services::OrderStateMachine;
pub use domain::protections::{Protection, ProtectionContext, ProtectionDecision, ProtectionStack, RiskManager};
pub use domain::shared::{BrokerId, Clock, Money, OrderId, Quantity, Symbol, SystemClock, Timestamp, TradeId};

// Application re-exports
pub use application::dto::{Signal, SignalDecision, SignalSide, SkipReason};
pub use application::ports::{Broker, BrokerError, EventPublisherPort, NoOpEventPublisher, NullExecution};
pub use application::services::{ExecutionEngine, PeriodicReconciler, RecoveryCoordinator, SingleTradeGuard, StartupReconciler};

// Infrastructure re-exports
pub use infrastructure::{EventBus, Position, PositionStore, TradeJournal, TransactionLog};

// Top-level re-exports
pub use config::{Config, ConfigError, load_config};
pub use error::ExecutionCoreError;
