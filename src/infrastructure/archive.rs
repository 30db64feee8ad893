//! Hot-to-Cold Archiver
//!
//! Periodic task migrating aged hot-store entries into the cold store. The
//! cold insert and the hot delete are not one transaction; a crash between
//! them re-archives the same rows next cycle, which the cold store's
//! idempotent insert absorbs.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StorageSettings;
use crate::shared::error::AppError;

use super::cold_store::PgColdStore;
use super::hot_store::RedisHotStore;
use super::metrics;

/// Periodic hot-to-cold migration job.
pub struct Archiver {
    hot: Arc<RedisHotStore>,
    cold: PgColdStore,
    cycle_interval: Duration,
    cutoff_age_secs: i64,
    batch_size: usize,
}

impl Archiver {
    pub fn new(hot: Arc<RedisHotStore>, cold: PgColdStore, settings: &StorageSettings) -> Self {
        Self {
            hot,
            cold,
            cycle_interval: Duration::from_secs(settings.archive_interval_secs),
            cutoff_age_secs: settings.archive_age_secs as i64,
            batch_size: settings.archive_batch_size,
        }
    }

    /// Run archive cycles until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.cycle_interval);
        ticker.tick().await; // skip the immediate first tick

        info!(
            interval_secs = self.cycle_interval.as_secs(),
            "Archiver started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Archiver shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        warn!("Archive cycle failed: {}", e);
                    }
                }
            }
        }
    }

    /// One full pass over the hot store's conversation keys.
    pub async fn run_cycle(&self) -> Result<usize, AppError> {
        let cutoff = Utc::now() - ChronoDuration::seconds(self.cutoff_age_secs);
        let cutoff_ns = cutoff.timestamp_nanos_opt().unwrap_or(0);

        let mut archived = 0usize;
        let mut cursor = 0u64;
        loop {
            let (next, keys) = self.hot.scan_conversation_keys(cursor, self.batch_size).await?;

            for key in &keys {
                match self.archive_conversation(key, cutoff_ns).await {
                    Ok(count) => archived += count,
                    // Abort just this conversation; the next cycle retries it.
                    Err(e) => warn!(conversation = %key, "Archiving aborted: {}", e),
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        if archived > 0 {
            info!(archived, "Archive cycle complete");
        }
        Ok(archived)
    }

    /// Migrate one conversation's aged entries.
    async fn archive_conversation(
        &self,
        conversation_key: &str,
        cutoff_ns: i64,
    ) -> Result<usize, AppError> {
        let ids = self.hot.expired_member_ids(conversation_key, cutoff_ns).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let messages = self.hot.fetch_messages(&ids).await?;
        if messages.is_empty() {
            return Ok(0);
        }

        let inserted = self.cold.insert_batch(&messages).await?;

        // Delete only what was fetched and inserted; entries whose hashes
        // were unreadable stay behind for the index TTL to reap.
        let archived_ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        self.hot
            .remove_archived(conversation_key, &archived_ids)
            .await?;

        metrics::ARCHIVED_MESSAGES_TOTAL.inc_by(archived_ids.len() as u64);
        debug!(
            conversation = %conversation_key,
            fetched = archived_ids.len(),
            inserted,
            "Conversation archived"
        );

        Ok(archived_ids.len())
    }
}
