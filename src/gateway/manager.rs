//! Local Connection Manager
//!
//! Per-gateway registry of live sessions. Lookups happen on every routing
//! decision; insertions and removals only on connect and disconnect, so the
//! map is a concurrent read-mostly structure.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::infrastructure::metrics;

use super::client::ClientSession;

/// Outcome of a non-blocking local delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSend {
    Delivered,
    /// Presence claimed this gateway but no session is here (stale entry or
    /// a just-closed socket).
    NotConnected,
    QueueFull,
}

/// Per-gateway map of `userID -> session`.
pub struct ConnectionManager {
    gateway_id: String,
    sessions: DashMap<String, Arc<ClientSession>>,
}

impl ConnectionManager {
    pub fn new(gateway_id: impl Into<String>) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            sessions: DashMap::new(),
        }
    }

    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    /// Register a session. A newer session from the same user supersedes
    /// the older one: the old session is cancelled and returned.
    pub fn add(&self, session: Arc<ClientSession>) -> Option<Arc<ClientSession>> {
        let superseded = self
            .sessions
            .insert(session.user_id().to_string(), session.clone());

        if let Some(old) = &superseded {
            old.cancel();
            info!(
                user_id = %session.user_id(),
                gateway = %self.gateway_id,
                "Session superseded by a newer connection"
            );
        } else {
            info!(user_id = %session.user_id(), gateway = %self.gateway_id, "User connected");
        }

        metrics::ACTIVE_SESSIONS.set(self.sessions.len() as i64);
        superseded
    }

    /// Remove a user's session only if it is still the given one, so a
    /// superseded session's deferred cleanup cannot evict its successor.
    /// Idempotent; returns whether a removal happened.
    pub fn remove_if(&self, user_id: &str, session_id: &str) -> bool {
        let removed = self
            .sessions
            .remove_if(user_id, |_, current| current.session_id() == session_id)
            .is_some();

        if removed {
            info!(user_id = %user_id, gateway = %self.gateway_id, "User disconnected");
            metrics::ACTIVE_SESSIONS.set(self.sessions.len() as i64);
        }
        removed
    }

    /// Fetch the live session for a user, if any.
    pub fn get(&self, user_id: &str) -> Option<Arc<ClientSession>> {
        self.sessions.get(user_id).map(|entry| entry.value().clone())
    }

    /// Non-blocking delivery to a local session.
    pub fn try_send_local(&self, user_id: &str, payload: &[u8]) -> LocalSend {
        match self.get(user_id) {
            None => LocalSend::NotConnected,
            Some(session) => {
                if session.try_send(payload) {
                    LocalSend::Delivered
                } else {
                    LocalSend::QueueFull
                }
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
