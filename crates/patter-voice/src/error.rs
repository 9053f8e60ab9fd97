//! Error types for the patter voice core.

use thiserror::Error;

/// Result type alias for voice-core operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while driving the call turn loop.
///
/// Collaborator failures (`Reply`, `Tts`) are recovered inside the
/// `TurnController` with scripted fallbacks; they never reach the telephony
/// platform. Only `Document` faults bubble up to the gateway, which still
/// answers them with a minimal apology document.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reply backend error: {0}")]
    Reply(String),

    #[error("TTS backend error: {0}")]
    Tts(String),

    #[error("Document construction error: {0}")]
    Document(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
