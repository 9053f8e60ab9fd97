//! **Turn Controller** — one HTTP round trip of the voice conversation.
//!
//! Each inbound webhook carries a call id and maybe the caller's transcribed
//! speech. The controller decides first-turn vs. continuation, folds the
//! exchange into the session store, drives the reply and TTS collaborators,
//! and emits the call-control document that keeps the loop going.
//!
//! Collaborator failures are recovered here with scripted text and the
//! platform-voice delivery path: the protocol has no error channel mid-call,
//! so the caller must always get a well-formed document that keeps listening.

use crate::audio_cache::AudioCache;
use crate::config::VoiceConfig;
use crate::reply::ReplyBackend;
use crate::session::{SessionStore, Speaker};
use crate::tts::TtsBackend;
use crate::twiml::VoiceResponse;
use crate::VoiceResult;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives the turn-taking state machine for all calls. Stores and backends
/// are injected so the gateway owns the wiring and tests can substitute
/// scripted doubles.
pub struct TurnController {
    sessions: Arc<SessionStore>,
    audio: Arc<AudioCache>,
    reply: Arc<dyn ReplyBackend>,
    tts: Arc<dyn TtsBackend>,
    config: VoiceConfig,
}

impl TurnController {
    pub fn new(
        sessions: Arc<SessionStore>,
        audio: Arc<AudioCache>,
        reply: Arc<dyn ReplyBackend>,
        tts: Arc<dyn TtsBackend>,
        config: VoiceConfig,
    ) -> Self {
        Self {
            sessions,
            audio,
            reply,
            tts,
            config,
        }
    }

    /// Handles one turn request and returns the next call-control document.
    ///
    /// An unseen call id is a call start, not an error; absent or empty
    /// speech selects the scripted greeting/reprompt without invoking the
    /// reply backend. The returned document always ends with a gather
    /// directive — nothing in the turn logic terminates the call itself.
    pub async fn handle_turn(
        &self,
        call_sid: &str,
        speech_result: Option<&str>,
    ) -> VoiceResult<VoiceResponse> {
        let first_turn = self.sessions.begin_turn(call_sid);
        let utterance = speech_result
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let spoken = match utterance {
            None => {
                debug!(call_sid, first_turn, "no speech result; using scripted text");
                if first_turn {
                    self.config.greeting.clone()
                } else {
                    self.config.reprompt.clone()
                }
            }
            Some(heard) => {
                info!(call_sid, heard, "caller turn");
                self.sessions.append_turn(call_sid, Speaker::Caller, heard);
                let history = self.sessions.history(call_sid);
                let reply = match self.reply.reply(&self.config.persona_prompt, &history).await {
                    Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                    Ok(_) => {
                        warn!(call_sid, "reply backend returned empty text; reprompting");
                        self.config.reprompt.clone()
                    }
                    Err(e) => {
                        warn!(call_sid, error = %e, "reply backend failed; reprompting");
                        self.config.reprompt.clone()
                    }
                };
                // Keep the prompt coherent with what the caller actually
                // heard, fallback text included.
                self.sessions
                    .append_turn(call_sid, Speaker::Persona, reply.clone());
                reply
            }
        };

        let mut doc = VoiceResponse::new();
        if first_turn {
            doc = doc.record(
                format!("{}/recording-status", self.config.public_url),
                format!("{}/transcription", self.config.public_url),
            );
        }

        doc = match self.tts.synthesize(&spoken).await {
            Ok(bytes) if !bytes.is_empty() => {
                let produced_at = self.audio.put(call_sid, bytes);
                doc.play(format!(
                    "{}/audio/{}?t={}",
                    self.config.public_url,
                    call_sid,
                    produced_at.timestamp_millis(),
                ))
            }
            Ok(_) => {
                debug!(call_sid, "TTS returned no audio; using platform voice");
                doc.say(&spoken)
            }
            Err(e) => {
                warn!(call_sid, error = %e, "TTS failed; using platform voice");
                doc.say(&spoken)
            }
        };

        Ok(doc.gather("/voice"))
    }
}
