//! Session Controller
//!
//! Orchestrates one conversation: typed or spoken input is appended
//! optimistically, sent to the chat endpoint, optionally voiced, and the
//! reply appended. History is written through to the [`MessageStore`] on
//! every mutation.
//!
//! The controller is a cheap [`Clone`] handle. Session state sits behind a
//! short-lived lock that is never held across an await, so a second
//! submission issued while one is in flight sees the loading flag and is
//! rejected instead of queueing.

mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};

use crate::audio::PlaybackController;
use crate::chat::{ChatClient, ChatRequest};
use crate::config::DEFAULT_VOICE;
use crate::message::Message;
use crate::store::MessageStore;
use crate::voice::{
    AudioOutput, CaptureEnd, CaptureSession, DisabledSynthesizer, NullOutput, SpeechRecognizer,
    SpeechSynthesizer, UnavailableRecognizer, VoiceInput,
};

use state::SessionState;
pub use state::{SessionView, SubmitOutcome, SubmitPhase};

struct Inner {
    state: Mutex<SessionState>,
    chat: Arc<dyn ChatClient>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice_id: String,
    store: MessageStore,
    player: tokio::sync::Mutex<PlaybackController>,
    voice_input: Mutex<VoiceInput>,
    view_tx: watch::Sender<SessionView>,
}

/// Handle to a conversational session
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

/// Assembles a [`SessionController`] from its collaborators
///
/// Voice collaborators default to inert implementations, so a text-only
/// session only needs a chat client and a store.
pub struct SessionBuilder {
    chat: Arc<dyn ChatClient>,
    store: MessageStore,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output: Box<dyn AudioOutput>,
    recognizer: Box<dyn SpeechRecognizer>,
    voice_id: String,
    identity: String,
}

impl SessionBuilder {
    /// Speech synthesis for voice-mode replies
    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// The audio output owned by the playback controller
    #[must_use]
    pub fn output(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.output = output;
        self
    }

    /// Speech capture
    #[must_use]
    pub fn recognizer(mut self, recognizer: Box<dyn SpeechRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// Voice used for synthesis
    #[must_use]
    pub fn voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Initial identity (wallet address, or empty for anonymous)
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Restore history from the store and build the controller
    #[must_use]
    pub fn build(self) -> SessionController {
        let state = SessionState {
            messages: self.store.load_messages(),
            identity: self.identity,
            ..SessionState::default()
        };
        tracing::info!(messages = state.messages.len(), "session restored");

        let (view_tx, _) = watch::channel(state.view());

        SessionController {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                chat: self.chat,
                synthesizer: self.synthesizer,
                voice_id: self.voice_id,
                store: self.store,
                player: tokio::sync::Mutex::new(PlaybackController::new(self.output)),
                voice_input: Mutex::new(VoiceInput::new(self.recognizer)),
                view_tx,
            }),
        }
    }
}

/// Returns the session to `Idle` when a submission ends, however it ends
struct IdleOnDrop<'a> {
    controller: &'a SessionController,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.state();
        state.phase = SubmitPhase::Idle;
        self.controller.publish(&state);
    }
}

impl SessionController {
    /// Start assembling a session around `chat` and `store`
    #[must_use]
    pub fn builder(chat: Arc<dyn ChatClient>, store: MessageStore) -> SessionBuilder {
        SessionBuilder {
            chat,
            store,
            synthesizer: Arc::new(DisabledSynthesizer),
            output: Box::new(NullOutput::default()),
            recognizer: Box::new(UnavailableRecognizer),
            voice_id: DEFAULT_VOICE.to_string(),
            identity: String::new(),
        }
    }

    /// Submit typed text
    pub async fn handle_submit(&self, text: &str) -> SubmitOutcome {
        self.submit_with(text, false).await
    }

    /// Submit text, forcing a spoken reply when `force_voice` is set
    ///
    /// Blank text and submissions made while another is in flight are
    /// ignored. A failed chat request removes exactly the user message this
    /// call appended.
    pub async fn submit_with(&self, text: &str, force_voice: bool) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Empty;
        }

        let request = {
            let mut state = self.state();
            if state.phase.is_submitting() {
                tracing::debug!("submission already in flight, ignoring");
                return SubmitOutcome::Busy;
            }

            let user_index = state.messages.len();
            state.messages.push(Message::user(text));
            state.input_value.clear();
            state.transcription.clear();
            state.phase = SubmitPhase::Submitting { user_index };
            self.persist(&state);

            let voice_mode = force_voice || state.voice_mode;
            tracing::info!(user_index, voice_mode, "sending message");
            ChatRequest::new(text, state.identity.clone(), voice_mode)
        };
        let _idle = IdleOnDrop { controller: self };

        let reply = match self.inner.chat.send(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                self.roll_back();
                return SubmitOutcome::Failed;
            }
        };

        let audio = if request.voice_mode {
            let audio = self
                .inner
                .synthesizer
                .generate_voice(&reply, &self.inner.voice_id)
                .await;
            if audio.is_none() {
                tracing::warn!("no audio for reply, showing text only");
            }
            audio
        } else {
            None
        };

        let index = {
            let mut state = self.state();
            state.messages.push(Message::assistant(reply, audio.clone()));
            self.persist(&state);
            state.messages.len() - 1
        };

        if let Some(url) = &audio {
            let mut player = self.inner.player.lock().await;
            player.play_message(index, url).await;
            self.set_playing(player.playing_index());
        }

        SubmitOutcome::Replied { index, audio }
    }

    /// Start or stop recording
    pub fn handle_voice_input(&self) {
        let recording = self.state().recording;
        if recording {
            self.stop_capture();
        } else {
            self.start_capture();
        }
    }

    /// Enter voice mode (clearing the input and starting capture) or leave it
    pub fn toggle_voice_mode(&self) {
        let voice_mode = self.state().voice_mode;
        if voice_mode {
            self.exit_voice_mode();
            return;
        }

        {
            let mut state = self.state();
            state.voice_mode = true;
            state.input_value.clear();
            self.publish(&state);
        }
        self.start_capture();
    }

    /// Leave voice mode and stop any capture
    ///
    /// History and an in-flight submission are left alone.
    pub fn exit_voice_mode(&self) {
        self.voice_input().stop_listening();

        let mut state = self.state();
        state.voice_mode = false;
        state.recording = false;
        self.publish(&state);
    }

    /// Toggle playback of message `index`
    ///
    /// Returns whether the message is playing afterwards; messages without
    /// audio are ignored.
    pub async fn toggle_audio(&self, index: usize) -> bool {
        let url = {
            let state = self.state();
            state.messages.get(index).and_then(|m| m.audio.clone())
        };
        let Some(url) = url else {
            tracing::debug!(index, "message has no audio");
            return false;
        };

        let mut player = self.inner.player.lock().await;
        let playing = player.toggle(index, &url).await;
        self.set_playing(player.playing_index());
        playing
    }

    /// Replace the pending input text
    pub fn set_input(&self, text: impl Into<String>) {
        let mut state = self.state();
        state.input_value = text.into();
        self.publish(&state);
    }

    /// Set the identity sent with each request; empty means anonymous
    pub fn set_identity(&self, address: impl Into<String>) {
        let mut state = self.state();
        state.identity = address.into();
        tracing::debug!(anonymous = state.identity.is_empty(), "identity changed");
        self.publish(&state);
    }

    /// Current view of the session
    #[must_use]
    pub fn snapshot(&self) -> SessionView {
        self.state().view()
    }

    /// Watch the session view change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view_tx.subscribe()
    }

    /// Stop capture and playback
    pub async fn shutdown(&self) {
        self.voice_input().stop_listening();
        self.inner.player.lock().await.stop();

        let mut state = self.state();
        state.recording = false;
        state.playing = None;
        self.publish(&state);
        tracing::debug!("session shut down");
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn voice_input(&self) -> MutexGuard<'_, VoiceInput> {
        self.inner
            .voice_input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.inner.view_tx.send_replace(state.view());
    }

    fn persist(&self, state: &SessionState) {
        self.inner.store.save_messages(&state.messages);
        self.publish(state);
    }

    fn set_playing(&self, playing: Option<usize>) {
        let mut state = self.state();
        state.playing = playing;
        self.publish(&state);
    }

    /// Remove the optimistic user message recorded in the submitting phase
    fn roll_back(&self) {
        let mut state = self.state();
        let SubmitPhase::Submitting { user_index } = state.phase else {
            tracing::warn!("no submission in flight, nothing to roll back");
            return;
        };
        if state.messages.get(user_index).is_some_and(|m| m.is_user) {
            state.messages.remove(user_index);
            self.persist(&state);
        } else {
            tracing::warn!(user_index, "optimistic message missing, nothing to roll back");
        }
    }

    /// Open a capture session and spawn its pump
    fn start_capture(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("speech capture needs an async runtime");
            return false;
        };

        let started = self.voice_input().start_listening();
        let session = match started {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "failed to start speech capture");
                let mut state = self.state();
                state.recording = false;
                self.publish(&state);
                return false;
            }
        };

        {
            let mut state = self.state();
            state.recording = true;
            self.publish(&state);
        }

        runtime.spawn(self.clone().pump(session));
        true
    }

    fn stop_capture(&self) {
        self.voice_input().stop_listening();

        let mut state = self.state();
        state.recording = false;
        self.publish(&state);
    }

    /// Feed one capture session's utterances into the submit path
    ///
    /// Utterances are submitted one at a time, in order. The end signal is
    /// still watched while a turn is in flight.
    async fn pump(self, mut session: CaptureSession) {
        let generation = session.generation;

        let end = loop {
            tokio::select! {
                biased;
                utterance = session.utterances.recv() => match utterance {
                    Some(text) => {
                        let ended = self.take_turn(generation, &text, &mut session.ended).await;
                        if let Some(end) = ended {
                            break end;
                        }
                    }
                    None => break (&mut session.ended).await.unwrap_or(CaptureEnd::Stopped),
                },
                end = &mut session.ended => break end.unwrap_or(CaptureEnd::Stopped),
            }
        };

        while let Ok(text) = session.utterances.try_recv() {
            self.on_utterance(generation, &text).await;
        }

        self.on_capture_end(generation, &end);
    }

    /// Submit one utterance, returning the end reason if capture ends meanwhile
    async fn take_turn(
        &self,
        generation: u64,
        text: &str,
        ended: &mut oneshot::Receiver<CaptureEnd>,
    ) -> Option<CaptureEnd> {
        let turn = self.on_utterance(generation, text);
        tokio::pin!(turn);

        let end = tokio::select! {
            () = &mut turn => return None,
            end = ended => end.unwrap_or(CaptureEnd::Stopped),
        };

        self.clear_recording(generation);
        turn.await;
        Some(end)
    }

    async fn on_utterance(&self, generation: u64, text: &str) {
        let current = {
            let input = self.voice_input();
            input.is_listening() && input.generation() == generation
        };
        if !current {
            tracing::debug!(generation, "dropping utterance from stale capture");
            return;
        }

        tracing::info!(transcript = %text, "utterance recognized");
        {
            let mut state = self.state();
            state.transcription = text.to_string();
            self.publish(&state);
        }

        if self.submit_with(text, true).await == SubmitOutcome::Busy {
            tracing::warn!("submission in flight, utterance dropped");
        }
    }

    fn on_capture_end(&self, generation: u64, end: &CaptureEnd) {
        self.voice_input().mark_ended(generation);

        match end {
            CaptureEnd::Failed(reason) => tracing::warn!(generation, %reason, "capture failed"),
            other => tracing::debug!(generation, reason = ?other, "capture ended"),
        }

        self.clear_recording(generation);
    }

    /// Drop the recording flag if `generation` is still the live capture
    fn clear_recording(&self, generation: u64) {
        if self.voice_input().generation() != generation {
            return;
        }
        let mut state = self.state();
        state.recording = false;
        self.publish(&state);
    }
}
