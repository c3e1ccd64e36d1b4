//! TOML configuration file loading
//!
//! Supports `~/.config/lumina/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct LuminaConfigFile {
    /// Chat endpoint configuration
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Data directory override
    #[serde(default)]
    pub data_dir: Option<String>,
}

/// Chat endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// Chat endpoint URL (e.g. "https://ai.luminacasa.ai/api/chatCyrene")
    pub url: Option<String>,

    /// Agent name
    pub agent: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// Speech synthesis endpoint
    pub tts_url: Option<String>,

    /// Speech synthesis API key
    pub tts_api_key: Option<String>,

    /// TTS model (e.g. "kokoro")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "af_bella")
    pub voice_id: Option<String>,

    /// Transcription endpoint
    pub stt_url: Option<String>,

    /// Transcription API key
    pub stt_api_key: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `LuminaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> LuminaConfigFile {
    config_file_path().map_or_else(LuminaConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Returns `LuminaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_from(path: &Path) -> LuminaConfigFile {
    if !path.exists() {
        return LuminaConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                LuminaConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            LuminaConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/lumina/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lumina").join("config.toml"))
}
