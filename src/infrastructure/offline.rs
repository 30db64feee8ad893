//! Offline Message Queue
//!
//! Per-user FIFO of serialized messages accepted while the user had no live
//! session anywhere in the fleet, drained oldest-first on reconnect.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::domain::{DrainOutcome, OfflineQueue};
use crate::shared::error::AppError;

/// Key prefix for offline queues (`offline:messages:<userID>`).
pub const OFFLINE_PREFIX: &str = "offline:messages:";

/// Redis implementation of the offline queue.
#[derive(Clone)]
pub struct RedisOfflineQueue {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisOfflineQueue {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    fn key(user_id: &str) -> String {
        format!("{}{}", OFFLINE_PREFIX, user_id)
    }
}

#[async_trait]
impl OfflineQueue for RedisOfflineQueue {
    async fn enqueue(&self, user_id: &str, payload: &[u8]) -> Result<(), AppError> {
        let key = Self::key(user_id);
        let mut conn = self.conn.clone();

        conn.rpush::<_, _, ()>(&key, payload)
            .await
            .map_err(AppError::HotStoreUnavailable)?;
        let _: bool = conn
            .expire(&key, self.ttl_secs as i64)
            .await
            .map_err(AppError::HotStoreUnavailable)?;

        debug!(user_id = %user_id, "Message saved to offline queue");
        Ok(())
    }

    async fn drain(
        &self,
        user_id: &str,
        deliver: &(dyn for<'a> Fn(&'a [u8]) -> bool + Send + Sync),
    ) -> Result<DrainOutcome, AppError> {
        let key = Self::key(user_id);
        let mut conn = self.conn.clone();

        let entries: Vec<Vec<u8>> = conn
            .lrange(&key, 0, -1)
            .await
            .map_err(AppError::HotStoreUnavailable)?;
        if entries.is_empty() {
            return Ok(DrainOutcome {
                delivered: 0,
                remaining: 0,
            });
        }

        // Oldest first; stop at the first full queue so the remainder keeps
        // its order for the next reconnect.
        let mut delivered = 0usize;
        for entry in &entries {
            if !deliver(entry) {
                warn!(user_id = %user_id, delivered, "Send queue full during offline drain");
                break;
            }
            delivered += 1;
        }

        if delivered == entries.len() {
            let _: i64 = conn
                .del(&key)
                .await
                .map_err(AppError::HotStoreUnavailable)?;
        } else if delivered > 0 {
            conn.ltrim::<_, ()>(&key, delivered as isize, -1)
                .await
                .map_err(AppError::HotStoreUnavailable)?;
        }

        debug!(
            user_id = %user_id,
            delivered,
            remaining = entries.len() - delivered,
            "Offline queue drained"
        );

        Ok(DrainOutcome {
            delivered,
            remaining: entries.len() - delivered,
        })
    }
}
