//! Text-to-speech (TTS) synthesis
//!
//! `generate_voice` never fails outright: any problem is logged and reported
//! as `None` so callers can fall back to a text-only reply.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{Error, Result};

/// Turns reply text into a playable audio location
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice_id`, returning an audio URL or `None` on failure
    async fn generate_voice(&self, text: &str, voice_id: &str) -> Option<String>;
}

/// Synthesizer used when voice output is turned off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    async fn generate_voice(&self, _text: &str, _voice_id: &str) -> Option<String> {
        tracing::debug!("voice synthesis disabled");
        None
    }
}

/// Synthesizes speech through an OpenAI-compatible `/audio/speech` endpoint
///
/// Returned audio is written under the clip directory and its path serves
/// as the audio URL, so replies stay replayable after a restart.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    audio_dir: PathBuf,
}

impl HttpSynthesizer {
    /// Create a synthesizer posting to `url` and storing clips in `audio_dir`
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is empty
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        audio_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::Config("TTS endpoint URL required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            model: model.into(),
            audio_dir: audio_dir.into(),
        })
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the endpoint answers non-2xx, or
    /// the body is empty
    pub async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: voice_id,
            response_format: "mp3",
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(Error::Tts("empty audio response".to_string()));
        }

        Ok(audio.to_vec())
    }

    /// Write a clip to the clip directory and return its path
    async fn store_clip(&self, audio: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let path = self
            .audio_dir
            .join(format!("{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, audio).await?;
        Ok(path.to_string_lossy().into_owned())
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn generate_voice(&self, text: &str, voice_id: &str) -> Option<String> {
        if text.trim().is_empty() {
            tracing::debug!("nothing to synthesize");
            return None;
        }

        tracing::debug!(voice = voice_id, chars = text.len(), "generating voice");

        let audio = match self.synthesize(text, voice_id).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::error!(error = %e, "voice generation failed");
                return None;
            }
        };

        match self.store_clip(&audio).await {
            Ok(url) => {
                tracing::debug!(url = %url, bytes = audio.len(), "voice generated");
                Some(url)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to store synthesized audio");
                None
            }
        }
    }
}
