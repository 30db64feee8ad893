//! Cross-Gateway Transport
//!
//! Partitioned message transport over Redis Streams. The topic is sharded
//! into one stream per partition (`<topic>:<partition>`); producers select
//! the partition explicitly and records carry no semantic key, so every
//! message for a given gateway arrives at exactly one consumer. Consumers
//! track their position in a per-partition offset key, committed on a fixed
//! cadence; uncommitted entries are re-read after a restart (at-least-once).

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::debug;

use crate::domain::MessageTransport;
use crate::shared::error::AppError;

/// Approximate per-partition stream bound; old entries are trimmed on write.
const STREAM_MAX_LEN: usize = 100_000;

/// A record consumed from a partition.
#[derive(Debug, Clone)]
pub struct TransportRecord {
    /// Stream entry id; committing it advances the consumer past this record.
    pub offset: String,
    /// Individual recipient, carried beside the payload so the consumer can
    /// re-check presence even when the frame addresses a group.
    pub recipient: String,
    pub payload: Vec<u8>,
}

/// Redis Streams implementation of the partitioned transport.
#[derive(Clone)]
pub struct RedisStreamTransport {
    conn: ConnectionManager,
    topic: String,
}

impl RedisStreamTransport {
    pub fn new(conn: ConnectionManager, topic: impl Into<String>) -> Self {
        Self {
            conn,
            topic: topic.into(),
        }
    }

    fn partition_key(&self, partition: i64) -> String {
        format!("{}:{}", self.topic, partition)
    }

    fn offset_key(&self, partition: i64) -> String {
        format!("{}:offset:{}", self.topic, partition)
    }

    /// Last committed offset for a partition; `0` (the beginning of the
    /// stream) when nothing was ever committed.
    pub async fn load_offset(&self, partition: i64) -> Result<String, AppError> {
        let mut conn = self.conn.clone();
        let offset: Option<String> = conn
            .get(self.offset_key(partition))
            .await
            .map_err(|e| AppError::TransportUnavailable(e.to_string()))?;
        Ok(offset.unwrap_or_else(|| "0".to_string()))
    }

    /// Persist the consumer position for a partition.
    pub async fn commit_offset(&self, partition: i64, offset: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.offset_key(partition), offset)
            .await
            .map_err(|e| AppError::TransportUnavailable(e.to_string()))?;
        debug!(partition, offset = %offset, "Committed consumer offset");
        Ok(())
    }

    /// Blocking read of records after `offset` on one partition. Returns an
    /// empty batch when the block timeout elapses with nothing to read.
    pub async fn read_batch(
        &self,
        partition: i64,
        offset: &str,
        block_ms: usize,
        count: usize,
    ) -> Result<Vec<TransportRecord>, AppError> {
        let key = self.partition_key(partition);
        let opts = StreamReadOptions::default().count(count).block(block_ms);

        let mut conn = self.conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(&[&key], &[offset], &opts)
            .await
            .map_err(|e| AppError::TransportUnavailable(e.to_string()))?;

        let mut records = Vec::new();
        for stream in reply.keys {
            for entry in stream.ids {
                let (Some(recipient), Some(payload)) =
                    (entry.map.get("recipient"), entry.map.get("payload"))
                else {
                    continue;
                };
                let recipient: String = redis::from_redis_value(recipient)
                    .map_err(|e| AppError::TransportUnavailable(e.to_string()))?;
                let payload: Vec<u8> = redis::from_redis_value(payload)
                    .map_err(|e| AppError::TransportUnavailable(e.to_string()))?;
                records.push(TransportRecord {
                    offset: entry.id.clone(),
                    recipient,
                    payload,
                });
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl MessageTransport for RedisStreamTransport {
    async fn produce(
        &self,
        partition: i64,
        recipient: &str,
        payload: &[u8],
    ) -> Result<(), AppError> {
        let key = self.partition_key(partition);
        let mut conn = self.conn.clone();

        let _: String = redis::cmd("XADD")
            .arg(&key)
            .arg("MAXLEN")
            .arg("~")
            .arg(STREAM_MAX_LEN)
            .arg("*")
            .arg("recipient")
            .arg(recipient)
            .arg("payload")
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::TransportUnavailable(e.to_string()))?;

        debug!(partition, recipient = %recipient, bytes = payload.len(), "Record published");
        Ok(())
    }
}

