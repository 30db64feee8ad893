//! Cold Message Store
//!
//! PostgreSQL long-term message tier, fed by the archiver. Inserts are
//! idempotent on the message id so that a crash between cold-insert and
//! hot-delete is repaired by replaying the same rows on the next cycle.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseSettings;
use crate::domain::StoredMessage;
use crate::shared::error::AppError;

/// Create the PostgreSQL connection pool for the cold store.
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Internal row type for cold store queries.
#[derive(Debug, sqlx::FromRow)]
struct ColdMessageRow {
    id: String,
    conversation_id: String,
    sender_id: String,
    content: Vec<u8>,
    msg_type: String,
    timestamp: DateTime<Utc>,
}

impl ColdMessageRow {
    fn into_stored(self) -> StoredMessage {
        StoredMessage {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            msg_type: self.msg_type,
            timestamp: self.timestamp,
            client_msg_id: None,
        }
    }
}

/// PostgreSQL cold store implementation.
#[derive(Clone)]
pub struct PgColdStore {
    pool: PgPool,
    chunk_size: usize,
}

impl PgColdStore {
    pub fn new(pool: PgPool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Batched idempotent insert; repeated message ids are no-ops.
    ///
    /// Returns the number of rows actually written.
    pub async fn insert_batch(&self, messages: &[StoredMessage]) -> Result<u64, AppError> {
        let mut inserted = 0u64;

        for chunk in messages.chunks(self.chunk_size) {
            let mut ids = Vec::with_capacity(chunk.len());
            let mut conversations = Vec::with_capacity(chunk.len());
            let mut senders = Vec::with_capacity(chunk.len());
            let mut contents: Vec<Vec<u8>> = Vec::with_capacity(chunk.len());
            let mut msg_types = Vec::with_capacity(chunk.len());
            let mut timestamps = Vec::with_capacity(chunk.len());

            for msg in chunk {
                ids.push(msg.id.as_str());
                conversations.push(msg.conversation_id.as_str());
                senders.push(msg.sender_id.as_str());
                contents.push(msg.content.clone());
                msg_types.push(msg.msg_type.as_str());
                timestamps.push(msg.timestamp);
            }

            let result = sqlx::query(
                r#"
                INSERT INTO messages_cold (id, conversation_id, sender_id, content, msg_type, timestamp)
                SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::bytea[], $5::text[], $6::timestamptz[])
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&ids)
            .bind(&conversations)
            .bind(&senders)
            .bind(&contents)
            .bind(&msg_types)
            .bind(&timestamps)
            .execute(&self.pool)
            .await?;

            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    /// Time-range query over one conversation (newest first).
    pub async fn list(
        &self,
        conversation_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, AppError> {
        let rows = sqlx::query_as::<_, ColdMessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, content, msg_type, timestamp
            FROM messages_cold
            WHERE conversation_id = $1 AND timestamp > $2 AND timestamp <= $3
            ORDER BY timestamp DESC
            LIMIT $4
            "#,
        )
        .bind(conversation_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_stored()).collect())
    }
}
