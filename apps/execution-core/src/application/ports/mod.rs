//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driver Ports** (Primary/Inbound): How the world uses our application
//! - **Driven Ports** (Secondary/Outbound): How our application uses external systems

pub mod broker_port;
mod event_publisher_port;

pub use broker_port::{AccountInfo, Broker, BrokerError, BrokerOpenOrder, BrokerOrderStatus, BrokerPosition, FillDetails, NullExecution};
pub use event_publisher_port::{EventPublishError, EventPublisherPort, NoOpEventPublisher};
