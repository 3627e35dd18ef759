//! Event Publisher Port (Driven Port)
//!
//! Interface for publishing domain events to external systems, e.g. a
//! metrics sink or an operator-facing notification channel. Distinct from
//! the in-process `OrderEventBus`: this port is async and allowed to fail.

use async_trait::async_trait;

use crate::domain::order_execution::events::OrderStateChanged;

/// Event publishing error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventPublishError {
    /// Connection error.
    #[error("Event publish connection error: {message}")]
    ConnectionError { message: String },

    /// Serialization error.
    #[error("Event serialization error: {message}")]
    SerializationError { message: String },

    /// Publishing failed.
    #[error("Event publish failed: {message}")]
    PublishFailed { message: String },
}

/// Port for publishing domain events to an external sink.
#[async_trait]
pub trait EventPublisherPort: Send + Sync {
    /// Publish order state-change events.
    async fn publish_order_events(
        &self,
        events: Vec<OrderStateChanged>,
    ) -> Result<(), EventPublishError>;

    /// Publish a single order state-change event.
    async fn publish_order_event(&self, event: OrderStateChanged) -> Result<(), EventPublishError> {
        self.publish_order_events(vec![event]).await
    }
}

/// No-op event publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisherPort for NoOpEventPublisher {
    async fn publish_order_events(
        &self,
        _events: Vec<OrderStateChanged>,
    ) -> Result<(), EventPublishError> {
        Ok(())
    }
}
