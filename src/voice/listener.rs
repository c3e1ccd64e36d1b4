//! Continuous speech capture
//!
//! A capture session is exposed as two independent channels: finalized
//! utterance texts, and a one-shot end signal carrying why capture stopped.
//! [`VoiceInput`] guarantees that at most one session is live at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::capture::{SAMPLE_RATE, SampleSource, samples_to_wav};
use super::segmenter::UtteranceSegmenter;
use super::stt::Transcriber;
use crate::{Error, Result};

/// Interval between microphone polls
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why a capture session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEnd {
    /// `stop_listening` was called
    Stopped,
    /// The input device went away or ran dry
    DeviceClosed,
    /// Capture could not be started or failed mid-stream
    Failed(String),
}

/// Receiving ends of one capture session, as produced by a recognizer
#[derive(Debug)]
pub struct CaptureStreams {
    /// One item per finalized utterance
    pub utterances: mpsc::UnboundedReceiver<String>,

    /// Fires once when capture terminates
    pub ended: oneshot::Receiver<CaptureEnd>,
}

/// A live capture session handed out by [`VoiceInput`]
#[derive(Debug)]
pub struct CaptureSession {
    /// Monotonic session number; stale sessions have a lower generation
    pub generation: u64,

    /// One item per finalized utterance
    pub utterances: mpsc::UnboundedReceiver<String>,

    /// Fires once when capture terminates
    pub ended: oneshot::Receiver<CaptureEnd>,
}

/// Platform speech-recognition capability
pub trait SpeechRecognizer: Send {
    /// Begin continuous capture
    ///
    /// # Errors
    ///
    /// Returns error if capture cannot be started
    fn start(&mut self) -> Result<CaptureStreams>;

    /// Stop the current capture, if any; idempotent
    fn stop(&mut self);
}

/// Recognizer for hosts without a usable microphone
#[derive(Debug, Default)]
pub struct UnavailableRecognizer;

impl SpeechRecognizer for UnavailableRecognizer {
    fn start(&mut self) -> Result<CaptureStreams> {
        Err(Error::Audio("speech capture unavailable".to_string()))
    }

    fn stop(&mut self) {}
}

/// Single-session guard around a [`SpeechRecognizer`]
pub struct VoiceInput {
    recognizer: Box<dyn SpeechRecognizer>,
    generation: u64,
    active: bool,
}

impl VoiceInput {
    /// Wrap a recognizer
    #[must_use]
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            generation: 0,
            active: false,
        }
    }

    /// Start a capture session, cleanly replacing any session already running
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer cannot start
    pub fn start_listening(&mut self) -> Result<CaptureSession> {
        if self.active {
            tracing::debug!(generation = self.generation, "restarting capture session");
            self.recognizer.stop();
            self.active = false;
        }

        let streams = self.recognizer.start()?;
        self.generation += 1;
        self.active = true;
        tracing::info!(generation = self.generation, "listening");

        Ok(CaptureSession {
            generation: self.generation,
            utterances: streams.utterances,
            ended: streams.ended,
        })
    }

    /// Stop the current capture session; idempotent
    pub fn stop_listening(&mut self) {
        if self.active {
            self.recognizer.stop();
            self.active = false;
            tracing::info!(generation = self.generation, "stopped listening");
        }
    }

    /// Record that session `generation` ended on its own
    ///
    /// Ignored when a newer session has already replaced it.
    pub fn mark_ended(&mut self, generation: u64) {
        if generation == self.generation {
            self.active = false;
        }
    }

    /// Whether a capture session is live
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.active
    }

    /// Generation of the newest session
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// Builds a sample source on the capture worker thread
pub type SourceFactory = Arc<dyn Fn() -> Result<Box<dyn SampleSource>> + Send + Sync>;

/// Work items passed from the capture thread to the transcription task
enum Segment {
    Utterance(Vec<f32>),
    End(CaptureEnd),
}

/// Handle to a running capture worker
struct Worker {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Microphone recognizer: capture → segmentation → remote transcription
///
/// Capture and segmentation run on a dedicated thread that owns the device;
/// transcription runs as an async task so utterances are transcribed in order.
pub struct MicrophoneRecognizer {
    factory: SourceFactory,
    transcriber: Arc<dyn Transcriber>,
    poll_interval: Duration,
    worker: Option<Worker>,
}

impl MicrophoneRecognizer {
    /// Create a recognizer using `factory` for audio and `transcriber` for text
    #[must_use]
    pub fn new(factory: SourceFactory, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            factory,
            transcriber,
            poll_interval: POLL_INTERVAL,
            worker: None,
        }
    }

    /// Override the microphone poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl SpeechRecognizer for MicrophoneRecognizer {
    fn start(&mut self) -> Result<CaptureStreams> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Audio(format!("capture needs an async runtime: {e}")))?;

        // The previous worker is joined by the new one before it opens the device
        let previous = self.worker.take().map(|w| {
            w.stop.store(true, Ordering::SeqCst);
            w.thread
        });

        let (segment_tx, mut segment_rx) = mpsc::unbounded_channel::<Segment>();
        let (utterance_tx, utterance_rx) = mpsc::unbounded_channel::<String>();
        let (ended_tx, ended_rx) = oneshot::channel::<CaptureEnd>();
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let stop = Arc::clone(&stop);
            let factory = Arc::clone(&self.factory);
            let poll = self.poll_interval;
            std::thread::Builder::new()
                .name("lumina-capture".to_string())
                .spawn(move || {
                    if let Some(handle) = previous {
                        let _ = handle.join();
                    }
                    let end = run_capture(&factory, &stop, &segment_tx, poll);
                    let _ = segment_tx.send(Segment::End(end));
                })?
        };

        let transcriber = Arc::clone(&self.transcriber);
        let stopped = Arc::clone(&stop);
        runtime.spawn(async move {
            let mut end = CaptureEnd::Stopped;
            while let Some(segment) = segment_rx.recv().await {
                match segment {
                    Segment::Utterance(samples) => {
                        if stopped.load(Ordering::SeqCst) {
                            continue;
                        }
                        if let Some(text) = transcribe(transcriber.as_ref(), &samples).await {
                            let _ = utterance_tx.send(text);
                        }
                    }
                    Segment::End(reason) => {
                        end = reason;
                        break;
                    }
                }
            }
            tracing::debug!(reason = ?end, "capture ended");
            let _ = ended_tx.send(end);
        });

        self.worker = Some(Worker { stop, thread });

        Ok(CaptureStreams {
            utterances: utterance_rx,
            ended: ended_rx,
        })
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::SeqCst);
            drop(worker.thread);
        }
    }
}

impl Drop for MicrophoneRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture loop; returns why it ended
fn run_capture(
    factory: &SourceFactory,
    stop: &AtomicBool,
    segments: &mpsc::UnboundedSender<Segment>,
    poll: Duration,
) -> CaptureEnd {
    let mut source = match factory() {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "failed to open microphone");
            return CaptureEnd::Failed(e.to_string());
        }
    };

    if let Err(e) = source.start() {
        tracing::error!(error = %e, "failed to start microphone");
        return CaptureEnd::Failed(e.to_string());
    }

    let mut segmenter = UtteranceSegmenter::new();
    let end = loop {
        if stop.load(Ordering::SeqCst) {
            break CaptureEnd::Stopped;
        }

        let samples = source.take_samples();
        if let Some(utterance) = segmenter.push(&samples) {
            if segments.send(Segment::Utterance(utterance)).is_err() {
                break CaptureEnd::Stopped;
            }
        }

        if source.is_closed() {
            break CaptureEnd::DeviceClosed;
        }

        std::thread::sleep(poll);
    };

    source.stop();
    end
}

/// Transcribe one utterance, logging and dropping failures
async fn transcribe(transcriber: &dyn Transcriber, samples: &[f32]) -> Option<String> {
    let wav = match samples_to_wav(samples, SAMPLE_RATE) {
        Ok(wav) => wav,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode utterance");
            return None;
        }
    };

    match transcriber.transcribe(&wav).await {
        Ok(text) if text.trim().is_empty() => {
            tracing::debug!("empty transcript dropped");
            None
        }
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(error = %e, "STT failed");
            None
        }
    }
}
