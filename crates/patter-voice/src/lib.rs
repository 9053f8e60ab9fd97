//! # patter-voice — the call-session turn-taking core
//!
//! Answers one question per HTTP round trip: given a call id and maybe the
//! caller's transcribed speech, what should the telephony platform do next?
//!
//! ```text
//! platform ── POST /voice ──► TurnController
//!                               ├─ SessionStore   (bounded per-call history)
//!                               ├─ ReplyBackend   (chat completions)
//!                               ├─ TtsBackend     (speech synthesis)
//!                               └─ AudioCache     (latest audio per call)
//!                             ◄── TwiML: [Record] Play|Say Gather ──┘
//! platform plays the audio, listens, and re-POSTs the next utterance.
//! ```
//!
//! The expiry sweeper reclaims idle sessions and audio; nothing persists
//! across restarts.

pub mod audio_cache;
pub mod config;
pub mod error;
pub mod reply;
pub mod session;
pub mod sweeper;
pub mod tts;
pub mod twiml;
pub mod turn;

pub use audio_cache::AudioCache;
pub use config::VoiceConfig;
pub use error::{VoiceError, VoiceResult};
pub use reply::{FailingReply, OpenAiReply, ReplyBackend, ScriptedReply};
pub use session::{SessionStore, Speaker, TurnRecord};
pub use tts::{FailingTts, OpenAiTts, ScriptedTts, TtsBackend};
pub use twiml::{apology, Verb, VoiceResponse};
pub use turn::TurnController;
