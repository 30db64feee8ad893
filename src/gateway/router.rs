//! Message Router (producer side)
//!
//! Decides, per recipient, between the offline queue, the local send queue,
//! and the cross-gateway transport. Partition assignment is a static
//! configured table: every message for a given recipient gateway lands on
//! exactly one partition, consumed only by that gateway.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{MessageTransport, OfflineQueue, PresenceDirectory};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

use super::manager::{ConnectionManager, LocalSend};

/// Static `gatewayID -> partition` table; the source of truth for routing.
///
/// `partition_for` is a pure function of the table. A gateway id without a
/// mapping is a configuration bug surfaced as `RouteUnknown`.
#[derive(Debug, Clone)]
pub struct PartitionMap {
    table: HashMap<String, i64>,
}

impl PartitionMap {
    pub fn new(table: HashMap<String, i64>) -> Self {
        Self { table }
    }

    pub fn partition_for(&self, gateway_id: &str) -> Result<i64, AppError> {
        self.table
            .get(gateway_id)
            .copied()
            .ok_or_else(|| AppError::RouteUnknown(gateway_id.to_string()))
    }

    /// Exact inverse of `partition_for` over the configured table.
    pub fn gateway_for(&self, partition: i64) -> Option<&str> {
        self.table
            .iter()
            .find(|(_, p)| **p == partition)
            .map(|(gw, _)| gw.as_str())
    }
}

/// What to do with a recipient who has no presence entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineFallback {
    /// Direct messages: queue for delivery on reconnect.
    Queue,
    /// Group fan-out: skip the member.
    Drop,
}

/// Producer-side router for one gateway.
pub struct MessageRouter {
    gateway_id: String,
    partitions: PartitionMap,
    presence: Arc<dyn PresenceDirectory>,
    transport: Arc<dyn MessageTransport>,
    offline: Arc<dyn OfflineQueue>,
    manager: Arc<ConnectionManager>,
}

impl MessageRouter {
    pub fn new(
        gateway_id: impl Into<String>,
        partitions: PartitionMap,
        presence: Arc<dyn PresenceDirectory>,
        transport: Arc<dyn MessageTransport>,
        offline: Arc<dyn OfflineQueue>,
        manager: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            partitions,
            presence,
            transport,
            offline,
            manager,
        }
    }

    /// Route one serialized message to one recipient.
    ///
    /// Dropped-recipient conditions (full queue, stale presence, unmapped
    /// gateway) are logged and absorbed here; only infrastructure faults
    /// (directory, offline queue, transport) surface to the caller.
    pub async fn route(
        &self,
        to: &str,
        payload: &[u8],
        fallback: OfflineFallback,
    ) -> Result<(), AppError> {
        let target = self.presence.lookup(to).await?;

        let Some(target_gateway) = target else {
            match fallback {
                OfflineFallback::Queue => {
                    self.offline.enqueue(to, payload).await?;
                    metrics::record_route_outcome("offline");
                    debug!(user_id = %to, "Recipient offline; message queued");
                }
                OfflineFallback::Drop => {
                    debug!(user_id = %to, "Offline group member skipped");
                }
            }
            return Ok(());
        };

        if target_gateway == self.gateway_id {
            match self.manager.try_send_local(to, payload) {
                LocalSend::Delivered => {
                    metrics::record_route_outcome("local");
                    debug!(user_id = %to, "Delivered locally");
                }
                LocalSend::QueueFull => {
                    metrics::record_route_outcome("dropped_full");
                    warn!(user_id = %to, "Send queue full, dropping message");
                }
                LocalSend::NotConnected => {
                    // Directory says here, map says no: a migration window.
                    // The entry expires or the reverse path corrects it.
                    metrics::record_route_outcome("dropped_stale");
                    warn!(
                        user_id = %to,
                        gateway = %self.gateway_id,
                        "User marked online here but no local session found"
                    );
                }
            }
            return Ok(());
        }

        let partition = match self.partitions.partition_for(&target_gateway) {
            Ok(p) => p,
            Err(e) => {
                metrics::record_route_outcome("dropped_unroutable");
                warn!(
                    user_id = %to,
                    gateway = %target_gateway,
                    "No partition mapping for target gateway; dropping: {}", e
                );
                return Ok(());
            }
        };

        self.transport.produce(partition, to, payload).await?;
        metrics::record_route_outcome("remote");
        debug!(user_id = %to, gateway = %target_gateway, partition, "Routed via transport");
        Ok(())
    }
}
