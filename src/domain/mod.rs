//! Domain Layer
//!
//! Wire records, conversation identity, and the service traits implemented
//! by the infrastructure layer.

mod message;
mod services;

pub use message::{
    conversation_id, group_conversation_id, ChatMessage, ChatType, ClientFrame, StoredMessage,
};
pub use services::{
    DrainOutcome, GroupMembership, MessageStore, MessageTransport, OfflineQueue,
    PresenceDirectory,
};
