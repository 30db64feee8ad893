//! Partition Consumer
//!
//! Each gateway runs one consumer bound to its own transport partition,
//! starting from the last committed offset. Delivery above the transport is
//! at-most-once per session: a record whose recipient is no longer on this
//! gateway is dropped, and the producer side re-routes the next message.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::{ChatMessage, PresenceDirectory};
use crate::infrastructure::metrics;
use crate::infrastructure::transport::RedisStreamTransport;

use super::manager::{ConnectionManager, LocalSend};

/// Block timeout for one transport read.
const READ_BLOCK_MS: usize = 1_000;

/// Maximum records pulled per read.
const READ_BATCH: usize = 100;

/// Pause after a transport read error before retrying.
const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Consumer loop for one gateway's partition.
pub struct PartitionConsumer {
    gateway_id: String,
    partition: i64,
    transport: RedisStreamTransport,
    presence: Arc<dyn PresenceDirectory>,
    manager: Arc<ConnectionManager>,
    commit_interval: Duration,
}

impl PartitionConsumer {
    pub fn new(
        gateway_id: impl Into<String>,
        partition: i64,
        transport: RedisStreamTransport,
        presence: Arc<dyn PresenceDirectory>,
        manager: Arc<ConnectionManager>,
        commit_interval: Duration,
    ) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            partition,
            transport,
            presence,
            manager,
            commit_interval,
        }
    }

    /// Consume until cancelled, committing the offset on a fixed cadence.
    pub async fn run(self, cancel: CancellationToken) {
        let mut offset = match self.transport.load_offset(self.partition).await {
            Ok(offset) => offset,
            Err(e) => {
                warn!(partition = self.partition, "Offset load failed, starting from 0: {}", e);
                "0".to_string()
            }
        };
        let mut committed = offset.clone();

        let mut commit_tick = interval(self.commit_interval);
        commit_tick.tick().await; // skip the immediate first tick

        info!(
            gateway = %self.gateway_id,
            partition = self.partition,
            offset = %offset,
            "Consumer started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if offset != committed {
                        if let Err(e) = self.transport.commit_offset(self.partition, &offset).await {
                            warn!(partition = self.partition, "Final offset commit failed: {}", e);
                        }
                    }
                    info!(gateway = %self.gateway_id, "Consumer shutting down");
                    return;
                }
                _ = commit_tick.tick() => {
                    if offset != committed {
                        match self.transport.commit_offset(self.partition, &offset).await {
                            Ok(()) => committed = offset.clone(),
                            Err(e) => warn!(partition = self.partition, "Offset commit failed: {}", e),
                        }
                    }
                }
                batch = self.transport.read_batch(self.partition, &offset, READ_BLOCK_MS, READ_BATCH) => {
                    match batch {
                        Ok(records) => {
                            for record in records {
                                offset = record.offset.clone();
                                self.deliver(&record.recipient, &record.payload).await;
                            }
                        }
                        Err(e) => {
                            error!(partition = self.partition, "Transport read failed: {}", e);
                            sleep(READ_RETRY_DELAY).await;
                        }
                    }
                }
            }
        }
    }

    /// Deliver one consumed record to its recipient, re-checking presence.
    async fn deliver(&self, recipient: &str, payload: &[u8]) {
        if let Err(e) = serde_json::from_slice::<ChatMessage>(payload) {
            warn!(user_id = %recipient, "Skipping malformed transport record: {}", e);
            return;
        }

        match self.presence.lookup(recipient).await {
            Ok(Some(gateway)) if gateway == self.gateway_id => {}
            Ok(other) => {
                // Moved or went offline since the producer routed; the
                // producer re-routes on the next message.
                metrics::record_route_outcome("dropped_stale");
                warn!(
                    user_id = %recipient,
                    expected = %self.gateway_id,
                    actual = ?other,
                    "Record arrived for a user no longer on this gateway"
                );
                return;
            }
            Err(e) => {
                metrics::record_route_outcome("dropped_stale");
                warn!(user_id = %recipient, "Presence re-check failed, dropping record: {}", e);
                return;
            }
        }

        match self.manager.try_send_local(recipient, payload) {
            LocalSend::Delivered => metrics::record_route_outcome("local"),
            LocalSend::QueueFull => {
                metrics::record_route_outcome("dropped_full");
                warn!(user_id = %recipient, "Send queue full, dropping consumed record");
            }
            LocalSend::NotConnected => {
                metrics::record_route_outcome("dropped_stale");
                warn!(
                    user_id = %recipient,
                    gateway = %self.gateway_id,
                    "User marked online here but no local session found"
                );
            }
        }
    }
}
