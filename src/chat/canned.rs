//! Offline chat client cycling through canned replies

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{ChatClient, ChatRequest};
use crate::Result;

/// Replies served when running without a chat endpoint
pub const CANNED_REPLIES: [&str; 4] = [
    "Hello! I'm doing great, thank you for asking. I'm here to help you explore the fascinating world of AI and technology. What would you like to know?",
    "I'm a multi-talented AI assistant with expertise in cybersecurity, blockchain, and decentralized systems. I can help with technical questions, provide guidance on various topics, and even engage in natural conversations with voice responses.",
    "That's a great question! I specialize in natural language processing, voice synthesis, and understanding complex technical concepts. I can help explain difficult topics in simple terms.",
    "I'd be happy to help you with that. My knowledge spans across various domains including AI, machine learning, cybersecurity, and blockchain technology.",
];

/// Chat client that never touches the network
#[derive(Debug, Default)]
pub struct CannedChatClient {
    next: AtomicUsize,
}

impl CannedChatClient {
    /// Create a canned client starting at the first reply
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatClient for CannedChatClient {
    async fn send(&self, request: &ChatRequest) -> Result<String> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % CANNED_REPLIES.len();
        tracing::debug!(index = i, text = %request.text, "serving canned reply");
        Ok(CANNED_REPLIES[i].to_string())
    }
}
