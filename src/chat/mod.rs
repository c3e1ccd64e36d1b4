//! Chat endpoint clients
//!
//! Each client implements the `ChatClient` trait: one request in, one reply
//! text out. Transport failures and malformed bodies both surface as errors
//! so the session can roll back the user's turn.

mod canned;
mod http;

use async_trait::async_trait;

pub use canned::{CANNED_REPLIES, CannedChatClient};
pub use http::HttpChatClient;

use crate::Result;

/// One outgoing chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// User message text
    pub text: String,

    /// Wallet address, or empty for anonymous users
    pub user_id: String,

    /// Whether the reply will be spoken
    pub voice_mode: bool,
}

impl ChatRequest {
    /// Build a request for `text` on behalf of `user_id`
    #[must_use]
    pub fn new(text: impl Into<String>, user_id: impl Into<String>, voice_mode: bool) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            voice_mode,
        }
    }
}

/// Remote inference endpoint
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one turn and return the assistant reply text
    async fn send(&self, request: &ChatRequest) -> Result<String>;
}
