//! Error types for the Lumina chat client

use thiserror::Error;

/// Result type alias for Lumina operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Lumina chat client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat endpoint error (non-2xx status or malformed body)
    #[error("chat error: {0}")]
    Chat(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        assert_eq!(
            Error::Chat("status 500".to_string()).to_string(),
            "chat error: status 500"
        );
        assert_eq!(
            Error::Tts("empty body".to_string()).to_string(),
            "TTS error: empty body"
        );
    }

    #[test]
    fn serde_errors_convert() {
        let err: Error = serde_json::from_str::<Vec<String>>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
