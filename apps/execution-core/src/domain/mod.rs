//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Aggregates**: Consistency boundaries with invariants
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Domain Events**: Records of state transitions
//! - **Domain Services**: Stateless business logic
//! - **Repository Traits**: Persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`order_execution`]: Order lifecycle state machine and its supporting types
//! - [`protections`]: Trading protections (loss limits, drawdown, cooldowns) and risk sizing
//! - [`shared`]: Value objects, errors, and the injectable clock shared across contexts

pub mod order_execution;
pub mod protections;
pub mod shared;
