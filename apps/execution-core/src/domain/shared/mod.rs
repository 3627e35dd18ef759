//! Shared Domain Types
//!
//! Value objects and errors shared across bounded contexts.

pub mod clock;
pub mod errors;
pub mod value_objects;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use errors::DomainError;
pub use value_objects::{
    BrokerId, Money, OrderId, Quantity, RunId, Symbol, Timestamp, TradeId, stop_loss_child_id,
    take_profit_child_id,
};
