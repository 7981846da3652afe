//! Broker connectivity and event publishing.
//!
//! This module contains:
//! - `ChannelProvider` trait: shared-connection lifecycle, fresh channel per call
//! - `EventPublisher` trait: durable-queue publish of domain events
//! - Implementations: AMQP (RabbitMQ), Mock

use async_trait::async_trait;
use lapin::Channel;

use crate::events::UserEvent;

pub mod channel;
pub mod mock;
pub mod publisher;

pub use channel::AmqpChannelProvider;
pub use mock::MockEventPublisher;
pub use publisher::AmqpEventPublisher;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),
}

/// Issues broker channels on demand over one shared connection.
///
/// Constructed once at process start and passed by reference to publishers
/// and consumers. Channel creation is per-call; the underlying connection is
/// shared and re-established lazily when it has died. Connection failures
/// are not retried here - retry policy belongs to the caller.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Create a fresh logical channel, reconnecting the shared connection
    /// first if it is missing or dead.
    async fn create_channel(&self) -> Result<Channel>;

    /// Close and drop the shared connection. Idempotent; safe to call
    /// concurrently or more than once.
    async fn close(&self);
}

/// Publishes domain events to their destination queues.
///
/// Implementations:
/// - `AmqpEventPublisher`: RabbitMQ default exchange, queue name as routing key
/// - `MockEventPublisher`: In-memory recorder for testing
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event` to `queue`. The queue is declared durable before the
    /// publish; a failure anywhere aborts with the original error.
    async fn publish(&self, event: &UserEvent, queue: &str) -> Result<()>;
}
