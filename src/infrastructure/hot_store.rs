//! Hot Message Store
//!
//! Redis-backed recent-message tier. Every accepted message lands here in
//! one pipelined transaction: a per-conversation sorted set scored by
//! nanosecond timestamp plus a per-message hash holding the serialized
//! record, both TTL-bounded. Client idempotency tokens suppress duplicate
//! persistence of the same submission.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::domain::{MessageStore, StoredMessage};
use crate::shared::error::AppError;

use super::metrics;

/// Key prefix for per-conversation sorted sets (`conv:msg:<convID>`).
pub const CONV_INDEX_PREFIX: &str = "conv:msg:";

/// Key prefix for per-message hashes (`msg:<messageID>`).
pub const MSG_PREFIX: &str = "msg:";

/// Key prefix for idempotency markers (`msgid:<convID>:<token>`).
pub const IDEMPOTENCY_PREFIX: &str = "msgid:";

/// Redis implementation of the hot message store.
#[derive(Clone)]
pub struct RedisHotStore {
    conn: ConnectionManager,
    hot_ttl_secs: u64,
    idempotency_ttl_secs: u64,
}

impl RedisHotStore {
    pub fn new(conn: ConnectionManager, hot_ttl_secs: u64, idempotency_ttl_secs: u64) -> Self {
        Self {
            conn,
            hot_ttl_secs,
            idempotency_ttl_secs,
        }
    }

    fn conversation_key(conversation_id: &str) -> String {
        format!("{}{}", CONV_INDEX_PREFIX, conversation_id)
    }

    fn message_key(message_id: &str) -> String {
        format!("{}{}", MSG_PREFIX, message_id)
    }

    fn idempotency_key(conversation_id: &str, token: &str) -> String {
        format!("{}{}:{}", IDEMPOTENCY_PREFIX, conversation_id, token)
    }

    /// Deserialize a hash payload, skipping (and counting) garbage entries.
    fn parse_entry(data: &str) -> Option<StoredMessage> {
        match serde_json::from_str(data) {
            Ok(msg) => Some(msg),
            Err(e) => {
                metrics::UNPARSEABLE_MESSAGES_TOTAL.inc();
                warn!("Skipping unparseable hot-store entry: {}", e);
                None
            }
        }
    }

    /// One SCAN step over conversation index keys; returns the next cursor
    /// (zero when the iteration completed) and a batch of full keys.
    pub async fn scan_conversation_keys(
        &self,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), AppError> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{}*", CONV_INDEX_PREFIX))
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(AppError::HotStoreUnavailable)?;
        Ok((next, keys))
    }

    /// Message ids in a conversation index with score at or below the cutoff.
    pub async fn expired_member_ids(
        &self,
        conversation_key: &str,
        cutoff_ns: i64,
    ) -> Result<Vec<String>, AppError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .zrangebyscore(conversation_key, 0i64, cutoff_ns)
            .await
            .map_err(AppError::HotStoreUnavailable)?;
        Ok(ids)
    }

    /// Bulk fetch of message records; unparseable and missing entries are
    /// skipped, so callers must delete by the ids of the records actually
    /// returned.
    pub async fn fetch_messages(
        &self,
        message_ids: &[String],
    ) -> Result<Vec<StoredMessage>, AppError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for id in message_ids {
            pipe.hget(Self::message_key(id), "data");
        }
        let values: Vec<Option<String>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(AppError::HotStoreUnavailable)?;

        Ok(values
            .iter()
            .flatten()
            .filter_map(|data| Self::parse_entry(data))
            .collect())
    }

    /// Remove archived members from the conversation index and delete their
    /// message hashes.
    pub async fn remove_archived(
        &self,
        conversation_key: &str,
        message_ids: &[String],
    ) -> Result<(), AppError> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.zrem(conversation_key, message_ids).ignore();
        for id in message_ids {
            pipe.del(Self::message_key(id)).ignore();
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(AppError::HotStoreUnavailable)?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for RedisHotStore {
    async fn save(&self, msg: &StoredMessage) -> Result<(), AppError> {
        if msg.id.is_empty() || msg.conversation_id.is_empty() || msg.timestamp_ns() == 0 {
            return Err(AppError::Validation(
                "message requires id, conversation id, and timestamp".into(),
            ));
        }

        let mut conn = self.conn.clone();

        // Idempotency: a repeated client token is acknowledged without
        // writing a second record.
        if let Some(token) = msg.client_msg_id.as_deref().filter(|t| !t.is_empty()) {
            let marker = Self::idempotency_key(&msg.conversation_id, token);
            let exists: bool = conn
                .exists(&marker)
                .await
                .map_err(AppError::HotStoreUnavailable)?;
            if exists {
                return Ok(());
            }
            conn.set_ex::<_, _, ()>(&marker, 1, self.idempotency_ttl_secs)
                .await
                .map_err(AppError::HotStoreUnavailable)?;
        }

        let data = serde_json::to_string(msg)
            .map_err(|e| AppError::Internal(format!("message serialization failed: {}", e)))?;

        let conversation_key = Self::conversation_key(&msg.conversation_id);
        let message_key = Self::message_key(&msg.id);

        let _: () = redis::pipe()
            .atomic()
            .zadd(&conversation_key, &msg.id, msg.timestamp_ns())
            .ignore()
            .hset(&message_key, "data", data)
            .ignore()
            .expire(&conversation_key, self.hot_ttl_secs as i64)
            .ignore()
            .expire(&message_key, self.hot_ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(AppError::HotStoreUnavailable)?;

        Ok(())
    }

    async fn list(
        &self,
        conversation_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
        reverse: bool,
    ) -> Result<Vec<StoredMessage>, AppError> {
        let key = Self::conversation_key(conversation_id);
        let min = start.timestamp_nanos_opt().unwrap_or(0);
        let max = end.timestamp_nanos_opt().unwrap_or(i64::MAX);

        let mut conn = self.conn.clone();
        let ids: Vec<String> = if reverse {
            conn.zrevrangebyscore_limit(&key, max, min, 0, limit as isize)
                .await
                .map_err(AppError::HotStoreUnavailable)?
        } else {
            conn.zrangebyscore_limit(&key, min, max, 0, limit as isize)
                .await
                .map_err(AppError::HotStoreUnavailable)?
        };

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hget(Self::message_key(id), "data");
        }
        let values: Vec<Option<String>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(AppError::HotStoreUnavailable)?;

        Ok(values
            .iter()
            .flatten()
            .filter_map(|data| Self::parse_entry(data))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(
            RedisHotStore::conversation_key("user:alice:bob"),
            "conv:msg:user:alice:bob"
        );
        assert_eq!(RedisHotStore::message_key("1-0001"), "msg:1-0001");
        assert_eq!(
            RedisHotStore::idempotency_key("group:42", "tok"),
            "msgid:group:42:tok"
        );
    }

    #[test]
    fn test_parse_entry_skips_garbage() {
        assert!(RedisHotStore::parse_entry("{not json").is_none());
    }
}
