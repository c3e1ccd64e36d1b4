//! Voice I/O
//!
//! Speech synthesis and speech capture are two independent capabilities:
//! synthesis is a single request/response call, capture is a cancellable
//! session producing finalized utterances. Audio output lives here too.

mod capture;
mod listener;
mod playback;
mod segmenter;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, SampleSource, samples_to_wav};
pub use listener::{
    CaptureEnd, CaptureSession, CaptureStreams, MicrophoneRecognizer, SourceFactory,
    SpeechRecognizer, UnavailableRecognizer, VoiceInput,
};
pub use playback::{AudioOutput, NullOutput, SpeakerOutput};
pub use segmenter::{SegmenterState, UtteranceSegmenter, calculate_energy};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{DisabledSynthesizer, HttpSynthesizer, SpeechSynthesizer};
