//! Ports the `OrderStateMachine` depends on but does not implement.
//!
//! Keeping these as traits lets the state machine stay synchronous and
//! unit-testable while the real transaction log and event bus (file-backed,
//! checksummed, broadcast-based) live in infrastructure.

use super::events::OrderStateChanged;

/// Append-only, checksummed record of every `OrderStateChanged` event.
///
/// Implementations must make `append` durable before returning `Ok`, and
/// `replay` must yield events in the order they were appended so that
/// `OrderStateMachine::restore_pending_orders` can rebuild state
/// deterministically.
pub trait TransactionLogPort: Send + Sync {
    /// Durably append one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be written or the checksum
    /// cannot be computed/persisted.
    fn append(&self, event: &OrderStateChanged) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Replay all previously appended events in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or a record fails its
    /// checksum.
    fn replay(&self) -> Result<Vec<OrderStateChanged>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Publishes `OrderStateChanged` events to in-process subscribers.
pub trait OrderEventBus: Send + Sync {
    /// Deliver an event to all current subscribers. Never fails: a bus with
    /// no subscribers, or a lagging subscriber, is not the publisher's
    /// problem.
    fn publish(&self, event: OrderStateChanged);
}

/// Event bus that drops every event. Useful in tests and for callers that
/// only care about the transaction log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventBus;

impl OrderEventBus for NullEventBus {
    fn publish(&self, _event: OrderStateChanged) {}
}

/// Transaction log that keeps events in memory only. Useful in tests; never
/// durable across restarts.
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    events: std::sync::Mutex<Vec<OrderStateChanged>>,
}

impl TransactionLogPort for InMemoryTransactionLog {
    fn append(&self, event: &OrderStateChanged) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn replay(&self) -> Result<Vec<OrderStateChanged>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }
}
