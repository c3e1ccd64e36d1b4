//! Configuration management for the Lumina chat client

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use file::LuminaConfigFile;

/// Default chat endpoint
pub const DEFAULT_CHAT_URL: &str = "http://localhost:3000/api/chatCyrene";

/// Default speech synthesis endpoint (OpenAI-compatible, as served by Kokoro)
pub const DEFAULT_TTS_URL: &str = "http://localhost:8880/v1/audio/speech";

/// Default transcription endpoint
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default synthesis voice
pub const DEFAULT_VOICE: &str = "af_bella";

/// Lumina client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat endpoint configuration
    pub chat: ChatConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Path to data directory (database, synthesized audio)
    pub data_dir: PathBuf,
}

/// Chat endpoint configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Endpoint receiving `text` / `userId` / `voice_mode` form posts
    pub url: String,

    /// Agent the endpoint speaks as
    pub agent: String,

    /// Request timeout
    pub timeout: Duration,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input and output
    pub enabled: bool,

    /// Speech synthesis endpoint
    pub tts_url: String,

    /// Speech synthesis API key
    pub tts_api_key: Option<String>,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub voice_id: String,

    /// Transcription endpoint
    pub stt_url: String,

    /// Transcription API key
    pub stt_api_key: Option<String>,

    /// STT model
    pub stt_model: String,
}

impl Config {
    /// Load configuration (env > toml > default)
    #[must_use]
    pub fn load() -> Self {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit voice disable option
    #[must_use]
    pub fn load_with_options(disable_voice: bool) -> Self {
        let mut config = Self::load();
        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
            config.voice.enabled = false;
        }
        config
    }

    /// Resolve configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn from_sources(fc: LuminaConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let chat = ChatConfig {
            url: env("LUMINA_CHAT_URL")
                .or(fc.chat.url)
                .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            agent: env("LUMINA_AGENT")
                .or(fc.chat.agent)
                .unwrap_or_else(|| "cyrene".to_string()),
            timeout: Duration::from_secs(
                env("LUMINA_CHAT_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .or(fc.chat.timeout_secs)
                    .unwrap_or(60),
            ),
        };

        let disabled_by_env = env("LUMINA_DISABLE_VOICE")
            .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes"));

        let voice = VoiceConfig {
            enabled: !disabled_by_env && fc.voice.enabled.unwrap_or(true),
            tts_url: env("LUMINA_TTS_URL")
                .or(fc.voice.tts_url)
                .unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
            tts_api_key: env("LUMINA_TTS_API_KEY").or(fc.voice.tts_api_key),
            tts_model: env("LUMINA_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "kokoro".to_string()),
            voice_id: env("LUMINA_VOICE")
                .or(fc.voice.voice_id)
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            stt_url: env("LUMINA_STT_URL")
                .or(fc.voice.stt_url)
                .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
            stt_api_key: env("LUMINA_STT_API_KEY")
                .or(fc.voice.stt_api_key)
                .or_else(|| env("OPENAI_API_KEY")),
            stt_model: env("LUMINA_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
        };

        // Data directory (~/.local/share/lumina on Linux)
        let data_dir = env("LUMINA_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        Self {
            chat,
            voice,
            data_dir,
        }
    }

    /// Path of the `SQLite` database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("lumina.db")
    }

    /// Directory holding synthesized audio clips
    #[must_use]
    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from(".lumina"), |d| d.data_dir().join("lumina"))
}
