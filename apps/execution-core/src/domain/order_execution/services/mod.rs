//! Order Execution Domain Services

mod order_state_machine;

pub use order_state_machine::{OrderStateMachine, TransitionInputs};
