//! Message Store: persists and restores conversation history
//!
//! Both operations fail soft. A missing or corrupt record loads as an empty
//! history and a failed write is logged and dropped, so storage trouble never
//! interrupts a conversation.

use crate::Message;
use crate::db::{DbPool, KvStore};

/// Storage key for the serialized message sequence
pub const MESSAGES_KEY: &str = "chat_messages";

/// Durable conversation history
#[derive(Clone)]
pub struct MessageStore {
    kv: KvStore,
}

impl MessageStore {
    /// Create a message store backed by the given pool
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            kv: KvStore::new(pool),
        }
    }

    /// Load the stored history, or an empty one if absent or unreadable
    #[must_use]
    pub fn load_messages(&self) -> Vec<Message> {
        let raw = match self.kv.get(MESSAGES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read chat history");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                tracing::debug!(count = messages.len(), "restored chat history");
                messages
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored chat history is corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Overwrite the stored history with `messages`
    pub fn save_messages(&self, messages: &[Message]) {
        let json = match serde_json::to_string(messages) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize chat history");
                return;
            }
        };

        if let Err(e) = self.kv.set(MESSAGES_KEY, &json) {
            tracing::error!(error = %e, count = messages.len(), "failed to save chat history");
        }
    }
}
