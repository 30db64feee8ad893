//! Common Test Utilities
//!
//! In-memory implementations of the service traits, letting routing and
//! orchestration scenarios run without Redis or Postgres.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chat_gateway::domain::{
    DrainOutcome, GroupMembership, MessageStore, MessageTransport, OfflineQueue,
    PresenceDirectory, StoredMessage,
};
use chat_gateway::gateway::{
    ConnectionManager, MessageOrchestrator, MessageRouter, PartitionMap,
};
use chat_gateway::shared::{AppError, MessageIdGenerator};

/// In-memory presence directory (no TTL expiry; tests unregister explicitly).
#[derive(Default)]
pub struct InMemoryPresence {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceDirectory for InMemoryPresence {
    async fn register(&self, user_id: &str, gateway_id: &str) -> Result<(), AppError> {
        self.entries
            .lock()
            .unwrap()
            .insert(user_id.to_string(), gateway_id.to_string());
        Ok(())
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().unwrap().get(user_id).cloned())
    }

    async fn refresh(&self, _user_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn unregister(&self, user_id: &str) -> Result<(), AppError> {
        self.entries.lock().unwrap().remove(user_id);
        Ok(())
    }
}

/// In-memory message store with the hot store's idempotency contract.
#[derive(Default)]
pub struct InMemoryStore {
    messages: Mutex<Vec<StoredMessage>>,
    markers: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<StoredMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn save(&self, msg: &StoredMessage) -> Result<(), AppError> {
        if msg.id.is_empty() || msg.conversation_id.is_empty() || msg.timestamp_ns() == 0 {
            return Err(AppError::Validation(
                "message requires id, conversation id, and timestamp".into(),
            ));
        }

        if let Some(token) = msg.client_msg_id.as_deref().filter(|t| !t.is_empty()) {
            let marker = format!("{}:{}", msg.conversation_id, token);
            if !self.markers.lock().unwrap().insert(marker) {
                return Ok(());
            }
        }

        self.messages.lock().unwrap().push(msg.clone());
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
        let mut matches: Vec<StoredMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id && m.timestamp >= start && m.timestamp <= end
            })
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.timestamp_ns());
        if reverse {
            matches.reverse();
        }
        matches.truncate(limit);
        Ok(matches)
    }
}

/// In-memory transport capturing produced records per partition.
#[derive(Default)]
pub struct InMemoryTransport {
    produced: Mutex<HashMap<i64, Vec<(String, Vec<u8>)>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, partition: i64) -> Vec<(String, Vec<u8>)> {
        self.produced
            .lock()
            .unwrap()
            .get(&partition)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_produced(&self) -> usize {
        self.produced.lock().unwrap().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn produce(
        &self,
        partition: i64,
        recipient: &str,
        payload: &[u8],
    ) -> Result<(), AppError> {
        self.produced
            .lock()
            .unwrap()
            .entry(partition)
            .or_default()
            .push((recipient.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// In-memory offline queue with the ordered stop-on-full drain contract.
#[derive(Default)]
pub struct InMemoryOfflineQueue {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
}

impl InMemoryOfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self, user_id: &str) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .unwrap()
            .get(user_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OfflineQueue for InMemoryOfflineQueue {
    async fn enqueue(&self, user_id: &str, payload: &[u8]) -> Result<(), AppError> {
        self.queues
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .push_back(payload.to_vec());
        Ok(())
    }

    async fn drain(
        &self,
        user_id: &str,
        deliver: &(dyn for<'a> Fn(&'a [u8]) -> bool + Send + Sync),
    ) -> Result<DrainOutcome, AppError> {
        let entries: Vec<Vec<u8>> = self.queued(user_id);
        if entries.is_empty() {
            return Ok(DrainOutcome {
                delivered: 0,
                remaining: 0,
            });
        }

        let mut delivered = 0usize;
        for entry in &entries {
            if !deliver(entry) {
                break;
            }
            delivered += 1;
        }

        let mut queues = self.queues.lock().unwrap();
        if delivered == entries.len() {
            queues.remove(user_id);
        } else if let Some(queue) = queues.get_mut(user_id) {
            queue.drain(..delivered);
        }

        Ok(DrainOutcome {
            delivered,
            remaining: entries.len() - delivered,
        })
    }
}

/// Fixed group membership table.
#[derive(Default)]
pub struct StaticMembership {
    groups: HashMap<String, Vec<String>>,
}

impl StaticMembership {
    pub fn new(groups: &[(&str, &[&str])]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|(id, members)| {
                    (
                        id.to_string(),
                        members.iter().map(|m| m.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl GroupMembership for StaticMembership {
    async fn find_group_members(&self, group_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self.groups.get(group_id).cloned().unwrap_or_default())
    }
}

/// One in-process gateway wired to shared in-memory services.
pub struct TestGateway {
    pub manager: Arc<ConnectionManager>,
    pub router: Arc<MessageRouter>,
    pub orchestrator: Arc<MessageOrchestrator>,
}

/// Shared fixtures for a routing scenario.
pub struct TestFleet {
    pub presence: Arc<InMemoryPresence>,
    pub store: Arc<InMemoryStore>,
    pub transport: Arc<InMemoryTransport>,
    pub offline: Arc<InMemoryOfflineQueue>,
}

impl TestFleet {
    pub fn new() -> Self {
        Self {
            presence: Arc::new(InMemoryPresence::new()),
            store: Arc::new(InMemoryStore::new()),
            transport: Arc::new(InMemoryTransport::new()),
            offline: Arc::new(InMemoryOfflineQueue::new()),
        }
    }

    /// Default three-gateway partition table.
    pub fn partition_map() -> PartitionMap {
        PartitionMap::new(HashMap::from([
            ("gw-1".to_string(), 0),
            ("gw-2".to_string(), 1),
            ("gw-3".to_string(), 2),
        ]))
    }

    /// Build a gateway on this fleet's shared services.
    pub fn gateway(&self, gateway_id: &str, membership: Arc<dyn GroupMembership>) -> TestGateway {
        let manager = Arc::new(ConnectionManager::new(gateway_id));
        let router = Arc::new(MessageRouter::new(
            gateway_id,
            Self::partition_map(),
            self.presence.clone(),
            self.transport.clone(),
            self.offline.clone(),
            manager.clone(),
        ));
        let orchestrator = Arc::new(MessageOrchestrator::new(
            Arc::new(MessageIdGenerator::new()),
            self.store.clone(),
            router.clone(),
            membership,
        ));
        TestGateway {
            manager,
            router,
            orchestrator,
        }
    }
}

/// Membership table with no groups, for direct-message scenarios.
pub fn no_groups() -> Arc<dyn GroupMembership> {
    Arc::new(StaticMembership::default())
}
