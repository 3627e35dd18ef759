//! Application Layer
//!
//! The application layer orchestrates domain logic through application
//! services. It defines:
//!
//! - **Ports**: Interfaces for interacting with external systems
//! - **Services**: Application-specific business rules (order execution,
//!   reconciliation, recovery, the runtime's per-signal decision function)
//! - **DTOs**: Data transfer objects for API boundaries

pub mod dto;
pub mod ports;
pub mod services;

pub use dto::*;
pub use ports::*;
