//! Infrastructure Layer
//!
//! Production implementations of the domain service traits, plus the
//! archiver task and process metrics.

pub mod archive;
pub mod cold_store;
pub mod hot_store;
pub mod membership;
pub mod metrics;
pub mod offline;
pub mod presence;
pub mod transport;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}
