//! Service Traits
//!
//! The seams between the gateway layer and the infrastructure layer. Each
//! trait has a production implementation under `infrastructure` and an
//! in-memory implementation in the integration test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::shared::error::AppError;

use super::message::StoredMessage;

/// Fleet-wide "user -> gateway" directory with TTL expiry.
///
/// The directory is authoritative only in the soft sense: a missing entry
/// means "treat as offline", and a stale entry is corrected by the
/// consumer-side re-check on the receiving gateway.
#[async_trait]
pub trait PresenceDirectory: Send + Sync {
    /// Bind a user to a gateway, with the directory TTL.
    async fn register(&self, user_id: &str, gateway_id: &str) -> Result<(), AppError>;

    /// Resolve the gateway currently holding a user's socket.
    ///
    /// Returns `None` for a missing entry; that is an answer, not an error.
    async fn lookup(&self, user_id: &str) -> Result<Option<String>, AppError>;

    /// Reset the entry TTL; called on every received pong and on the
    /// periodic heartbeat.
    async fn refresh(&self, user_id: &str) -> Result<(), AppError>;

    /// Delete the entry; idempotent, called on clean disconnect.
    async fn unregister(&self, user_id: &str) -> Result<(), AppError>;
}

/// Hot-tier message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message. Duplicate idempotency tokens make this a no-op.
    async fn save(&self, msg: &StoredMessage) -> Result<(), AppError>;

    /// Time-range scan of one conversation, at most `limit` messages.
    async fn list(
        &self,
        conversation_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
        reverse: bool,
    ) -> Result<Vec<StoredMessage>, AppError>;
}

/// Cross-gateway transport, partitioned per recipient gateway.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Publish a serialized message onto an explicitly chosen partition.
    ///
    /// `recipient` rides as record metadata (not a partition key): group
    /// frames carry the group id in `To`, so the consuming gateway needs
    /// the individual recipient spelled out to re-check presence.
    async fn produce(
        &self,
        partition: i64,
        recipient: &str,
        payload: &[u8],
    ) -> Result<(), AppError>;
}

/// Result of draining an offline queue into a session's send queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub delivered: usize,
    pub remaining: usize,
}

/// Per-user FIFO of messages accepted while the user was offline.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    /// Append one serialized message and refresh the queue TTL.
    async fn enqueue(&self, user_id: &str, payload: &[u8]) -> Result<(), AppError>;

    /// Deliver queued entries oldest-first through `deliver` (a non-blocking
    /// enqueue returning false when the target queue is full). Stops at the
    /// first failure, leaving the failed entry and everything after it
    /// queued in order for the next reconnect.
    async fn drain(
        &self,
        user_id: &str,
        deliver: &(dyn for<'a> Fn(&'a [u8]) -> bool + Send + Sync),
    ) -> Result<DrainOutcome, AppError>;
}

/// External user/group service; the only group operation this core needs.
#[async_trait]
pub trait GroupMembership: Send + Sync {
    /// Full member list of a group (sender included, when a member).
    async fn find_group_members(&self, group_id: &str) -> Result<Vec<String>, AppError>;
}
