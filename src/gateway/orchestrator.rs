//! Message Orchestrator
//!
//! Turns an accepted client frame into a persisted, fanned-out message.
//! Persistence is best-effort: a hot-store fault is logged and delivery
//! proceeds. Only `Validation` and `NotAuthorized` surface to the caller.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{
    conversation_id, group_conversation_id, ChatMessage, ChatType, GroupMembership, MessageStore,
};
use crate::shared::error::AppError;
use crate::shared::msgid::MessageIdGenerator;

use super::router::{MessageRouter, OfflineFallback};

/// Orchestrates validation, persistence, and fan-out for one gateway.
pub struct MessageOrchestrator {
    ids: Arc<MessageIdGenerator>,
    store: Arc<dyn MessageStore>,
    router: Arc<MessageRouter>,
    membership: Arc<dyn GroupMembership>,
}

impl MessageOrchestrator {
    pub fn new(
        ids: Arc<MessageIdGenerator>,
        store: Arc<dyn MessageStore>,
        router: Arc<MessageRouter>,
        membership: Arc<dyn GroupMembership>,
    ) -> Self {
        Self {
            ids,
            store,
            router,
            membership,
        }
    }

    /// Send a 1:1 message. The sender gets no echo; their client renders
    /// the message locally.
    pub async fn send_direct(
        &self,
        from: &str,
        to: &str,
        content: &str,
        client_msg_id: &str,
    ) -> Result<(), AppError> {
        if to.is_empty() {
            return Err(AppError::Validation("recipient must not be empty".into()));
        }

        let msg = ChatMessage {
            msg_id: self.ids.generate(),
            chat_type: ChatType::Private,
            from: from.to_string(),
            to: to.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        let payload = serde_json::to_vec(&msg)
            .map_err(|e| AppError::Internal(format!("message serialization failed: {}", e)))?;

        let stored = msg.to_stored(conversation_id(from, to), client_msg_id);
        if let Err(e) = self.store.save(&stored).await {
            // Delivery continues; the record can be backfilled later.
            warn!(msg_id = %msg.msg_id, "Failed to persist message: {}", e);
        }

        if let Err(e) = self.router.route(to, &payload, OfflineFallback::Queue).await {
            warn!(msg_id = %msg.msg_id, to = %to, "Failed to route message: {}", e);
        }
        Ok(())
    }

    /// Send to every member of a group except the sender. Membership is
    /// checked before anything is persisted; per-recipient routing failures
    /// are independent.
    pub async fn send_group(
        &self,
        from: &str,
        group_id: &str,
        content: &str,
        client_msg_id: &str,
    ) -> Result<(), AppError> {
        if group_id.is_empty() {
            return Err(AppError::Validation("group id must not be empty".into()));
        }

        let members = self.membership.find_group_members(group_id).await?;
        if !members.iter().any(|m| m == from) {
            return Err(AppError::NotAuthorized(format!(
                "user {} is not a member of group {}",
                from, group_id
            )));
        }

        let msg = ChatMessage {
            msg_id: self.ids.generate(),
            chat_type: ChatType::Group,
            from: from.to_string(),
            to: group_id.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        let payload = serde_json::to_vec(&msg)
            .map_err(|e| AppError::Internal(format!("message serialization failed: {}", e)))?;

        // Persisted once for the whole group, keyed by the group conversation.
        let stored = msg.to_stored(group_conversation_id(group_id), client_msg_id);
        if let Err(e) = self.store.save(&stored).await {
            warn!(msg_id = %msg.msg_id, group = %group_id, "Failed to persist message: {}", e);
        }

        let mut routed = 0usize;
        for member in members.iter().filter(|m| *m != from) {
            match self.router.route(member, &payload, OfflineFallback::Drop).await {
                Ok(()) => routed += 1,
                Err(e) => {
                    warn!(msg_id = %msg.msg_id, member = %member, "Fan-out to member failed: {}", e);
                }
            }
        }

        info!(
            msg_id = %msg.msg_id,
            group = %group_id,
            members = members.len(),
            routed,
            "Group message fanned out"
        );
        Ok(())
    }
}
