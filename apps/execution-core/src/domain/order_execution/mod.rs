//! Order Execution Bounded Context
//!
//! Manages the complete order lifecycle from submission to completion.
//!
//! # Key Concepts
//!
//! - **Order Aggregate**: the authoritative record of one trading intent
//! - **`OrderStateMachine`**: the sole owner of in-memory `Order` records;
//!   every transition is validated, logged, and published atomically
//! - **Domain Events**: a single `OrderStateChanged` shape for every
//!   transition, durable in the transaction log and broadcast on the bus

pub mod aggregate;
pub mod errors;
pub mod events;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use aggregate::{NewOrder, Order};
pub use errors::OrderError;
pub use events::OrderStateChanged;
pub use ports::{InMemoryTransactionLog, NullEventBus, OrderEventBus, TransactionLogPort};
pub use services::{OrderStateMachine, TransitionInputs};
pub use value_objects::{
    CancelReason, FillReport, OrderSide, OrderState, OrderType, RejectReason, TimeInForce,
};
