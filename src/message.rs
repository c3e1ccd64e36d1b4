//! Conversation message model

use serde::{Deserialize, Serialize};

/// One turn of visible conversation history
///
/// Serialized in camelCase so stored histories keep the `isUser` / `text` /
/// `audio` shape used by the web client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// True for messages typed or spoken by the user
    pub is_user: bool,

    /// Message text
    pub text: String,

    /// Playable audio location for assistant replies with synthesized speech
    #[serde(default)]
    pub audio: Option<String>,
}

impl Message {
    /// Create a user message
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            is_user: true,
            text: text.into(),
            audio: None,
        }
    }

    /// Create an assistant message, optionally carrying synthesized audio
    #[must_use]
    pub fn assistant(text: impl Into<String>, audio: Option<String>) -> Self {
        Self {
            is_user: false,
            text: text.into(),
            audio,
        }
    }

    /// Whether the message has audio that can be played back
    #[must_use]
    pub const fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}
