//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lumina_chat::voice::{AudioOutput, CaptureEnd, CaptureStreams, SpeechRecognizer, SpeechSynthesizer};
use lumina_chat::{ChatClient, ChatRequest, DbPool, Error, MessageStore, Result, SessionView, db};
use tokio::sync::{Notify, mpsc, oneshot, watch};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Chat endpoint answering from a script, recording every request
#[derive(Clone, Default)]
pub struct ScriptedChat {
    replies: Arc<Mutex<VecDeque<Result<String>>>>,
    pub requests: Arc<Mutex<Vec<ChatRequest>>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedChat {
    /// Answer each request with the next reply, then "ok"
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    /// Hold every request until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().expect("no requests")
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn send(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}

/// Error the chat client reports for an HTTP 500
pub fn server_error() -> Error {
    Error::Chat("failed to send message: 500 Internal Server Error".to_string())
}

/// Synthesizer returning a fixed result
#[derive(Clone, Default)]
pub struct FixedSynthesizer {
    url: Option<String>,
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FixedSynthesizer {
    pub fn returning(url: Option<&str>) -> Self {
        Self {
            url: url.map(ToString::to_string),
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FixedSynthesizer {
    async fn generate_voice(&self, text: &str, voice_id: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        self.url.clone()
    }
}

/// Audio output recording every command it receives
///
/// A started clip keeps sounding until paused or [`RecordingOutput::finish`].
/// With a gate set, the first `play` signals `entered` and then waits for the
/// gate before returning.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    pub log: Arc<Mutex<Vec<String>>>,
    sounding: Arc<AtomicBool>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
    gated_once: Arc<AtomicBool>,
}

impl RecordingOutput {
    /// Hold the first `play` until `gate` is notified, signalling `entered`
    pub fn gated(mut self, entered: Arc<Notify>, gate: Arc<Notify>) -> Self {
        self.gate = Some((entered, gate));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// The most recently loaded source
    pub fn last_source(&self) -> Option<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| c.strip_prefix("load ").map(ToString::to_string))
    }

    /// Let the current clip run to its end
    pub fn finish(&self) {
        self.sounding.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    fn load(&mut self, source: &str) {
        self.log.lock().unwrap().push(format!("load {source}"));
    }

    async fn play(&mut self) -> Result<()> {
        if let Some((entered, gate)) = &self.gate {
            if !self.gated_once.swap(true, Ordering::SeqCst) {
                entered.notify_one();
                gate.notified().await;
            }
        }
        self.log.lock().unwrap().push("play".to_string());
        self.sounding.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().push("pause".to_string());
        self.sounding.store(false, Ordering::SeqCst);
    }

    fn rewind(&mut self) {
        self.log.lock().unwrap().push("rewind".to_string());
    }

    fn is_playing(&self) -> bool {
        self.sounding.load(Ordering::SeqCst)
    }
}

/// Sending ends of one capture session driven by a test
pub struct ManualCapture {
    pub utterances: mpsc::UnboundedSender<String>,
    ended: Option<oneshot::Sender<CaptureEnd>>,
}

impl ManualCapture {
    /// Fire the end signal, if it has not fired yet
    pub fn end(&mut self, reason: CaptureEnd) {
        if let Some(tx) = self.ended.take() {
            let _ = tx.send(reason);
        }
    }
}

/// Recognizer whose sessions are driven by the test
#[derive(Clone, Default)]
pub struct ManualRecognizer {
    pub captures: Arc<Mutex<Vec<ManualCapture>>>,
}

impl ManualRecognizer {
    /// Emit an utterance on the newest session
    pub fn say(&self, text: &str) {
        let captures = self.captures.lock().unwrap();
        let capture = captures.last().expect("no capture session");
        let _ = capture.utterances.send(text.to_string());
    }

    /// End the newest session
    pub fn end(&self, reason: CaptureEnd) {
        let mut captures = self.captures.lock().unwrap();
        captures.last_mut().expect("no capture session").end(reason);
    }

    pub fn sessions(&self) -> usize {
        self.captures.lock().unwrap().len()
    }
}

impl SpeechRecognizer for ManualRecognizer {
    fn start(&mut self) -> Result<CaptureStreams> {
        let (utterance_tx, utterances) = mpsc::unbounded_channel();
        let (ended_tx, ended) = oneshot::channel();
        self.captures.lock().unwrap().push(ManualCapture {
            utterances: utterance_tx,
            ended: Some(ended_tx),
        });
        Ok(CaptureStreams { utterances, ended })
    }

    fn stop(&mut self) {
        if let Some(capture) = self.captures.lock().unwrap().last_mut() {
            capture.end(CaptureEnd::Stopped);
        }
    }
}

/// Wait until the published view satisfies `pred`
pub async fn wait_for_view(
    rx: &mut watch::Receiver<SessionView>,
    pred: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for session state")
        .expect("session dropped")
        .clone()
}

/// Build a message store over `pool`
pub fn store(pool: &DbPool) -> MessageStore {
    MessageStore::new(pool.clone())
}
