//! Session state and its observable view

use serde::Serialize;

use crate::message::Message;

/// Submission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPhase {
    /// No request in flight
    #[default]
    Idle,
    /// One chat request in flight; `user_index` is the optimistic user message
    Submitting { user_index: usize },
}

impl SubmitPhase {
    /// Whether a request is in flight
    #[must_use]
    pub const fn is_submitting(self) -> bool {
        matches!(self, Self::Submitting { .. })
    }
}

/// Result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank text; nothing happened
    Empty,
    /// Another submission was in flight; nothing happened
    Busy,
    /// The chat request failed and the user message was rolled back
    Failed,
    /// The assistant reply was appended at `index`
    Replied { index: usize, audio: Option<String> },
}

/// Mutable session aggregate, only touched through the controller
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub messages: Vec<Message>,
    pub input_value: String,
    pub phase: SubmitPhase,
    pub voice_mode: bool,
    pub recording: bool,
    pub transcription: String,
    pub playing: Option<usize>,
    pub identity: String,
}

impl SessionState {
    pub fn view(&self) -> SessionView {
        SessionView {
            messages: self.messages.clone(),
            input_value: self.input_value.clone(),
            is_loading: self.phase.is_submitting(),
            is_voice_mode: self.voice_mode,
            is_recording: self.recording,
            transcription: self.transcription.clone(),
            playing_index: self.playing,
            identity: self.identity.clone(),
        }
    }
}

/// Read-only snapshot handed to the front-end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub messages: Vec<Message>,
    pub input_value: String,
    pub is_loading: bool,
    pub is_voice_mode: bool,
    pub is_recording: bool,
    pub transcription: String,
    pub playing_index: Option<usize>,
    pub identity: String,
}

impl SessionView {
    /// Whether message `index` is the one currently audible
    #[must_use]
    pub fn is_playing(&self, index: usize) -> bool {
        self.playing_index == Some(index)
    }
}
