//! AMQP event publisher.
//!
//! Publishes to the default exchange with the queue name as routing key.
//! The destination queue is declared durable on every publish (declaring an
//! existing queue is a no-op). The channel is released on every exit path.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::protocol::constants::REPLY_SUCCESS;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use tracing::{debug, error, warn};

use super::{BusError, ChannelProvider, EventPublisher, Result};
use crate::events::UserEvent;

/// Persistent delivery mode per AMQP 0.9.1.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// RabbitMQ publisher backed by an injected channel provider.
pub struct AmqpEventPublisher {
    provider: Arc<dyn ChannelProvider>,
}

impl AmqpEventPublisher {
    pub fn new(provider: Arc<dyn ChannelProvider>) -> Self {
        Self { provider }
    }

    async fn publish_on(channel: &Channel, queue: &str, payload: Vec<u8>) -> Result<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Publish(format!("Failed to declare queue: {}", e)))?;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await
            .map_err(|e| BusError::Publish(format!("Failed to publish: {}", e)))?;

        confirm
            .await
            .map_err(|e| BusError::Publish(format!("Publish confirmation failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish(&self, event: &UserEvent, queue: &str) -> Result<()> {
        // Fail fast before any network call.
        if queue.is_empty() {
            return Err(BusError::Publish("Queue name must not be empty".to_string()));
        }

        let payload = event
            .to_payload()
            .map_err(|e| BusError::Publish(format!("Failed to serialize event: {}", e)))?;

        let channel = self.provider.create_channel().await?;

        let result = Self::publish_on(&channel, queue, payload).await;

        // Release the channel deterministically whether the publish
        // succeeded or not.
        if let Err(e) = channel.close(REPLY_SUCCESS, "publish done").await {
            warn!(queue = %queue, error = %e, "Failed to release channel");
        }

        match &result {
            Ok(()) => debug!(queue = %queue, "Published event"),
            Err(e) => error!(queue = %queue, error = %e, "Failed to publish event"),
        }

        result
    }
}


/// Integration tests requiring a running RabbitMQ instance.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::bus::AmqpChannelProvider;
    use crate::config::BrokerConfig;
    use crate::events::UserDeleted;
    use uuid::Uuid;

    #[tokio::test]
    #[ignore = "Requires RabbitMQ"]
    async fn test_publish_declares_queue_and_delivers() {
        let provider = Arc::new(AmqpChannelProvider::new(BrokerConfig {
            host: std::env::var("AMQP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            ..BrokerConfig::default()
        }));
        let publisher = AmqpEventPublisher::new(Arc::clone(&provider) as Arc<dyn ChannelProvider>);

        let queue = format!("test-publish-{}", Uuid::new_v4());
        let event = UserEvent::Deleted(UserDeleted {
            user_id: Uuid::new_v4(),
        });

        publisher.publish(&event, &queue).await.expect("publish");

        // Declaring again is a no-op; publishing twice must also work.
        publisher.publish(&event, &queue).await.expect("republish");

        provider.close().await;
    }
}
