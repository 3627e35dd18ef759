//! Order Execution Value Objects
//!
//! Immutable types for order management.

mod fill_report;
mod order_side;
mod order_state;
mod order_type;
mod reasons;
mod time_in_force;

pub use fill_report::FillReport;
pub use order_side::OrderSide;
pub use order_state::OrderState;
pub use order_type::OrderType;
pub use reasons::{CancelReason, RejectReason};
pub use time_in_force::TimeInForce;
