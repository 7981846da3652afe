//! Service entry point.
//!
//! Wires configuration, the write store, the shared broker connection, and
//! the Mongo read model together, then runs the projection consumers until
//! the process is interrupted. Command sagas are exposed through the library
//! surface and share the same wiring.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use auction_users::bus::{AmqpChannelProvider, ChannelProvider};
use auction_users::config::{Config, LOG_ENV_VAR};
use auction_users::projection::start_consumers;
use auction_users::readmodel::{MongoReadModel, ReadModel};
use auction_users::storage::PostgresUserStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    let pool = sqlx::PgPool::connect(&config.database.url).await?;
    let store = PostgresUserStore::new(pool);
    store.init().await?;
    info!("Write store ready");

    let provider: Arc<dyn ChannelProvider> =
        Arc::new(AmqpChannelProvider::new(config.broker.clone()));

    let mongo = mongodb::Client::with_uri_str(&config.read_model.uri).await?;
    let read_model: Arc<dyn ReadModel> =
        Arc::new(MongoReadModel::new(&mongo, &config.read_model.database));

    let consumers = start_consumers(Arc::clone(&provider), Arc::clone(&read_model));
    info!(consumers = consumers.len(), "Projection consumers running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for handle in &consumers {
        handle.abort();
    }
    provider.close().await;
    Ok(())
}
