//! Lumina Chat - conversational voice client for AI agents
//!
//! This library provides the core of the Lumina chat client:
//! - Conversation sessions with optimistic, rollback-safe submission
//! - Persistent message history
//! - Voice I/O (continuous speech capture, STT, TTS)
//! - Single-output audio playback across messages
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Front-end (REPL)                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Session Controller                   │
//! │   Submit  │  Voice mode  │  Capture pump  │  View   │
//! └───┬──────────────┬───────────────┬──────────────────┘
//!     │              │               │
//! ┌───▼────┐  ┌──────▼──────┐  ┌─────▼──────────────────┐
//! │  Chat  │  │  Voice I/O  │  │ Playback  │  Message   │
//! │ client │  │  STT / TTS  │  │ controller│  store     │
//! └────────┘  └─────────────┘  └────────────────────────┘
//! ```

pub mod audio;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod message;
pub mod session;
pub mod store;
pub mod voice;
pub mod wallet;

pub use audio::PlaybackController;
pub use chat::{CannedChatClient, ChatClient, ChatRequest, HttpChatClient};
pub use config::Config;
pub use db::DbPool;
pub use error::{Error, Result};
pub use message::Message;
pub use session::{SessionBuilder, SessionController, SessionView, SubmitOutcome, SubmitPhase};
pub use store::MessageStore;
pub use wallet::WalletLink;
