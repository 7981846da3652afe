//! AMQP channel provider over a single shared connection.
//!
//! The connection is created lazily on first use and guarded by a lock so
//! concurrent callers never race on connection establishment. Channels are
//! per-call and never shared.

use async_trait::async_trait;
use lapin::protocol::constants::REPLY_SUCCESS;
use lapin::{Channel, Connection, ConnectionProperties};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{BusError, ChannelProvider, Result};
use crate::config::BrokerConfig;

/// Lazily connected, lock-guarded AMQP connection issuing fresh channels.
pub struct AmqpChannelProvider {
    config: BrokerConfig,
    connection: RwLock<Option<Connection>>,
}

impl AmqpChannelProvider {
    /// Create a provider; no connection is opened until the first channel
    /// is requested.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
        }
    }

    async fn open_connection(&self) -> Result<Connection> {
        let url = self.config.url();
        let conn = Connection::connect(&url, ConnectionProperties::default())
            .await
            .map_err(|e| {
                BusError::Connection(format!(
                    "Failed to connect to broker at {}: {}",
                    self.config.host, e
                ))
            })?;

        info!(host = %self.config.host, port = self.config.port, "Connected to AMQP broker");
        Ok(conn)
    }
}

#[async_trait]
impl ChannelProvider for AmqpChannelProvider {
    async fn create_channel(&self) -> Result<Channel> {
        // Fast path: connection exists and is live.
        {
            let guard = self.connection.read().await;
            if let Some(conn) = guard.as_ref() {
                if conn.status().connected() {
                    return conn
                        .create_channel()
                        .await
                        .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)));
                }
            }
        }

        // Slow path: take the write lock and re-check, so only one caller
        // pays the connection-establishment cost.
        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            if conn.status().connected() {
                return conn
                    .create_channel()
                    .await
                    .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)));
            }
        }

        if let Some(stale) = guard.take() {
            debug!("Dropping stale AMQP connection");
            if let Err(e) = stale.close(REPLY_SUCCESS, "reconnecting").await {
                warn!(error = %e, "Failed to close stale connection");
            }
        }

        let conn = self.open_connection().await?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))?;
        *guard = Some(conn);

        Ok(channel)
    }

    async fn close(&self) {
        let mut guard = self.connection.write().await;
        // Take exactly once; later calls find the slot empty.
        if let Some(conn) = guard.take() {
            if let Err(e) = conn.close(REPLY_SUCCESS, "shutdown").await {
                warn!(error = %e, "Failed to close AMQP connection cleanly");
            } else {
                info!("AMQP connection closed");
            }
        }
    }
}


/// Integration tests requiring a running RabbitMQ instance.
#[cfg(test)]
mod integration_tests {
    use super::*;

    fn amqp_config() -> BrokerConfig {
        BrokerConfig {
            host: std::env::var("AMQP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            ..BrokerConfig::default()
        }
    }

    #[tokio::test]
    #[ignore = "Requires RabbitMQ"]
    async fn test_channels_share_one_connection() {
        let provider = AmqpChannelProvider::new(amqp_config());

        let a = provider.create_channel().await.expect("first channel");
        let b = provider.create_channel().await.expect("second channel");
        assert_ne!(a.id(), b.id());

        provider.close().await;
    }

    #[tokio::test]
    #[ignore = "Requires RabbitMQ"]
    async fn test_reconnects_after_close() {
        let provider = AmqpChannelProvider::new(amqp_config());

        provider.create_channel().await.expect("channel");
        provider.close().await;

        // A new connection is established lazily.
        provider.create_channel().await.expect("channel after close");
        provider.close().await;
    }
}
