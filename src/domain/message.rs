//! Message Records and Conversation Identity
//!
//! The wire-level frame exchanged with clients and routed between gateways,
//! the persistence record shared by the hot and cold stores, and the
//! canonical conversation keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat kind carried on every routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Private => "private",
            ChatType::Group => "group",
        }
    }
}

/// Client -> server frame (text, JSON).
///
/// An empty or missing `chat_type` means private.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub to: String,
    #[serde(default)]
    pub chat_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub client_msg_id: String,
}

impl ClientFrame {
    /// Resolve the frame's chat type; `None` for unsupported values.
    pub fn chat_type(&self) -> Option<ChatType> {
        match self.chat_type.as_str() {
            "" | "private" => Some(ChatType::Private),
            "group" => Some(ChatType::Group),
            _ => None,
        }
    }
}

/// Server -> client frame and transport record value (text, JSON).
///
/// For group messages `to` carries the group id, not a member id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "MsgID")]
    pub msg_id: String,
    #[serde(rename = "ChatType")]
    pub chat_type: ChatType,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// The persistence record for this message.
    pub fn to_stored(&self, conversation_id: String, client_msg_id: &str) -> StoredMessage {
        StoredMessage {
            id: self.msg_id.clone(),
            conversation_id,
            sender_id: self.from.clone(),
            content: self.content.as_bytes().to_vec(),
            msg_type: "text".to_string(),
            timestamp: self.timestamp,
            client_msg_id: if client_msg_id.is_empty() {
                None
            } else {
                Some(client_msg_id.to_string())
            },
        }
    }
}

/// Persistence record shared by the hot and cold stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: Vec<u8>,
    pub msg_type: String,
    pub timestamp: DateTime<Utc>,
    /// Client-supplied idempotency token; never persisted in the cold store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
}

impl StoredMessage {
    /// Score used for hot-store range queries.
    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or(0)
    }
}

/// Canonical 1:1 conversation key: `user:<min>:<max>`.
pub fn conversation_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("user:{}:{}", a, b)
    } else {
        format!("user:{}:{}", b, a)
    }
}

/// Group conversation key: `group:<groupID>`.
pub fn group_conversation_id(group_id: &str) -> String {
    format!("group:{}", group_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_is_canonical() {
        assert_eq!(conversation_id("alice", "bob"), conversation_id("bob", "alice"));
        assert_eq!(conversation_id("alice", "bob"), "user:alice:bob");
        assert_eq!(conversation_id("a", "a"), "user:a:a");
    }

    #[test]
    fn group_conversation_id_shape() {
        assert_eq!(group_conversation_id("42"), "group:42");
    }

    #[test]
    fn client_frame_chat_type_defaults_to_private() {
        let frame: ClientFrame = serde_json::from_str(r#"{"to": "bob"}"#).unwrap();
        assert_eq!(frame.chat_type(), Some(ChatType::Private));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"to": "42", "chat_type": "group"}"#).unwrap();
        assert_eq!(frame.chat_type(), Some(ChatType::Group));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"to": "bob", "chat_type": "broadcast"}"#).unwrap();
        assert_eq!(frame.chat_type(), None);
    }

    #[test]
    fn chat_message_wire_keys() {
        let msg = ChatMessage {
            msg_id: "1-0001".into(),
            chat_type: ChatType::Private,
            from: "alice".into(),
            to: "bob".into(),
            content: "hi".into(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["MsgID"], "1-0001");
        assert_eq!(value["ChatType"], "private");
        assert_eq!(value["From"], "alice");
        assert_eq!(value["To"], "bob");
        assert_eq!(value["Content"], "hi");
        assert!(value.get("Timestamp").is_some());
    }

    #[test]
    fn stored_message_round_trips_content_bytes() {
        let msg = ChatMessage {
            msg_id: "1-0001".into(),
            chat_type: ChatType::Private,
            from: "alice".into(),
            to: "bob".into(),
            content: "hi".into(),
            timestamp: Utc::now(),
        };
        let stored = msg.to_stored(conversation_id("alice", "bob"), "tok-1");
        assert_eq!(stored.conversation_id, "user:alice:bob");
        assert_eq!(stored.content, b"hi");
        assert_eq!(stored.client_msg_id.as_deref(), Some("tok-1"));
        assert!(stored.timestamp_ns() > 0);

        let stored = msg.to_stored(conversation_id("alice", "bob"), "");
        assert!(stored.client_msg_id.is_none());
    }
}
