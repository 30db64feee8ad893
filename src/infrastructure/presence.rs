//! Presence Directory
//!
//! Redis-backed "user -> gateway" mapping with TTL expiry. Expiry is the
//! crash detector: a dead gateway's users drop off the directory within one
//! TTL without any explicit cleanup.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::domain::PresenceDirectory;
use crate::shared::error::AppError;

/// Key prefix for presence entries (`user_conn:<userID>`).
pub const USER_CONN_PREFIX: &str = "user_conn:";

/// Redis implementation of the presence directory.
#[derive(Clone)]
pub struct RedisPresenceDirectory {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPresenceDirectory {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    fn key(user_id: &str) -> String {
        format!("{}{}", USER_CONN_PREFIX, user_id)
    }
}

#[async_trait]
impl PresenceDirectory for RedisPresenceDirectory {
    async fn register(&self, user_id: &str, gateway_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(user_id), gateway_id, self.ttl_secs)
            .await
            .map_err(AppError::DirectoryUnavailable)?;

        info!(user_id = %user_id, gateway = %gateway_id, ttl = self.ttl_secs, "User registered");
        Ok(())
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let gateway: Option<String> = conn
            .get(Self::key(user_id))
            .await
            .map_err(AppError::DirectoryUnavailable)?;
        Ok(gateway)
    }

    async fn refresh(&self, user_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: bool = conn
            .expire(Self::key(user_id), self.ttl_secs as i64)
            .await
            .map_err(AppError::DirectoryUnavailable)?;

        debug!(user_id = %user_id, "Presence TTL refreshed");
        Ok(())
    }

    async fn unregister(&self, user_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(Self::key(user_id))
            .await
            .map_err(AppError::DirectoryUnavailable)?;

        info!(user_id = %user_id, "User unregistered");
        Ok(())
    }
}
