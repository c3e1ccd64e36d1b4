//! Audio output devices
//!
//! An [`AudioOutput`] behaves like a single reusable audio element: one bound
//! source, a play head, and play/pause/rewind controls.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cpal::SampleRate;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::oneshot;

use crate::{Error, Result};

/// A single reusable audio element
#[async_trait]
pub trait AudioOutput: Send {
    /// Bind `source`, replacing whatever was bound
    fn load(&mut self, source: &str);

    /// Start playing the bound source from the current position
    ///
    /// # Errors
    ///
    /// Returns error if nothing is bound or playback cannot start
    async fn play(&mut self) -> Result<()>;

    /// Pause playback, keeping the position
    fn pause(&mut self);

    /// Move the play head back to the start
    fn rewind(&mut self);

    /// Whether the bound source is still sounding
    ///
    /// Turns false on pause and when playback runs off the end of the clip.
    fn is_playing(&self) -> bool;
}

/// Output that accepts every command and makes no sound
///
/// Its clips never end on their own; only a pause stops them.
#[derive(Debug, Default)]
pub struct NullOutput {
    source: Option<String>,
    playing: bool,
}

#[async_trait]
impl AudioOutput for NullOutput {
    fn load(&mut self, source: &str) {
        self.source = Some(source.to_string());
    }

    async fn play(&mut self) -> Result<()> {
        tracing::debug!(source = ?self.source, "voice output disabled, not playing");
        self.playing = self.source.is_some();
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn rewind(&mut self) {}

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Decoded mono clip
struct Clip {
    source: String,
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
}

/// Handle to the playback thread of the current clip
struct Voice {
    halt: Arc<AtomicBool>,
}

/// Plays MP3 clips on the default output device
pub struct SpeakerOutput {
    source: Option<String>,
    clip: Option<Clip>,
    position: Arc<AtomicUsize>,
    voice: Option<Voice>,
}

impl SpeakerOutput {
    /// Create a speaker output
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio output initialized"
        );

        Ok(Self {
            source: None,
            clip: None,
            position: Arc::new(AtomicUsize::new(0)),
            voice: None,
        })
    }

    /// Stop the playback thread, if one is running
    fn halt(&mut self) {
        if let Some(voice) = self.voice.take() {
            voice.halt.store(true, Ordering::SeqCst);
        }
    }

    /// Decode the bound source unless it is already decoded
    async fn ensure_decoded(&mut self, source: &str) -> Result<()> {
        if self.clip.as_ref().is_some_and(|c| c.source == source) {
            return Ok(());
        }

        let path = source.strip_prefix("file://").unwrap_or(source).to_string();
        let bytes = tokio::fs::read(&path).await?;
        let (samples, sample_rate) = tokio::task::spawn_blocking(move || decode_mp3(&bytes))
            .await
            .map_err(|e| Error::Audio(format!("decode task failed: {e}")))??;

        self.clip = Some(Clip {
            source: source.to_string(),
            samples: Arc::new(samples),
            sample_rate,
        });
        Ok(())
    }

    /// Play raw mono samples, replacing the bound source
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened
    pub async fn play_samples(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        const RAW_SOURCE: &str = "raw:samples";

        self.load(RAW_SOURCE);
        self.clip = Some(Clip {
            source: RAW_SOURCE.to_string(),
            samples: Arc::new(samples),
            sample_rate,
        });
        self.start_clip().await
    }

    /// Spawn the playback thread for the decoded clip
    async fn start_clip(&mut self) -> Result<()> {
        let Some(clip) = self.clip.as_ref() else {
            return Err(Error::Audio("clip unavailable".to_string()));
        };

        let halt = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = oneshot::channel();
        {
            let halt = Arc::clone(&halt);
            let position = Arc::clone(&self.position);
            let samples = Arc::clone(&clip.samples);
            let sample_rate = clip.sample_rate;
            std::thread::Builder::new()
                .name("lumina-playback".to_string())
                .spawn(move || play_clip(&samples, sample_rate, &position, &halt, started_tx))?;
        }

        started_rx
            .await
            .map_err(|_| Error::Audio("playback thread exited".to_string()))??;

        self.voice = Some(Voice { halt });
        Ok(())
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.halt();
    }
}

#[async_trait]
impl AudioOutput for SpeakerOutput {
    fn load(&mut self, source: &str) {
        self.halt();
        self.source = Some(source.to_string());
        self.position.store(0, Ordering::SeqCst);
    }

    async fn play(&mut self) -> Result<()> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| Error::Audio("no source loaded".to_string()))?;

        self.halt();
        self.ensure_decoded(&source).await?;
        self.start_clip().await?;
        tracing::debug!(source = %source, "playback started");
        Ok(())
    }

    fn pause(&mut self) {
        self.halt();
    }

    fn rewind(&mut self) {
        self.position.store(0, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        let Some(voice) = &self.voice else {
            return false;
        };
        !voice.halt.load(Ordering::SeqCst)
            && self
                .clip
                .as_ref()
                .is_some_and(|c| self.position.load(Ordering::SeqCst) < c.samples.len())
    }
}

/// Playback thread body: owns the (non-`Send`) output stream
fn play_clip(
    samples: &Arc<Vec<f32>>,
    sample_rate: u32,
    position: &Arc<AtomicUsize>,
    halt: &Arc<AtomicBool>,
    started: oneshot::Sender<Result<()>>,
) {
    let stream = match open_stream(samples, sample_rate, position) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = started.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = started.send(Err(Error::Audio(e.to_string())));
        return;
    }
    let _ = started.send(Ok(()));

    while !halt.load(Ordering::SeqCst) && position.load(Ordering::SeqCst) < samples.len() {
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    tracing::trace!(position = position.load(Ordering::SeqCst), "playback thread done");
}

fn open_stream(
    samples: &Arc<Vec<f32>>,
    sample_rate: u32,
    position: &Arc<AtomicUsize>,
) -> Result<cpal::Stream> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .min_by_key(cpal::SupportedStreamConfigRange::channels)
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = usize::from(config.channels);

    let samples = Arc::clone(samples);
    let position = Arc::clone(position);

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position.load(Ordering::SeqCst);
                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(pos).copied().unwrap_or(0.0);
                    frame.fill(sample);
                    if pos < samples.len() {
                        pos += 1;
                    }
                }
                position.store(pos, Ordering::SeqCst);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    #[allow(clippy::cast_precision_loss)]
                    let mean = sum / chunk.len() as f32;
                    mean
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(Error::Audio("clip contains no audio frames".to_string()));
    }

    Ok((samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_mp3(b"definitely not an mp3").is_err());
        assert!(decode_mp3(&[]).is_err());
    }

    #[tokio::test]
    async fn null_output_accepts_everything() {
        let mut out = NullOutput::default();
        out.load("/tmp/clip.mp3");
        out.play().await.unwrap();
        assert!(out.is_playing());
        out.pause();
        out.rewind();
        assert!(!out.is_playing());
        assert_eq!(out.source.as_deref(), Some("/tmp/clip.mp3"));
    }
}
