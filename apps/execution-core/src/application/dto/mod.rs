//! Data transfer objects crossing the application boundary.

pub mod signal;

pub use signal::{Signal, SignalDecision, SignalSide, SkipReason};
