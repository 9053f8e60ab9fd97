//! **Speech Synthesizer** — text to audio bytes via an OpenAI-compatible
//! `/audio/speech` API.
//!
//! The turn controller treats every failure here as recoverable: a failed
//! synthesis falls back to the platform's native `<Say>` voice, never to a
//! silent or broken turn.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;

/// Backend that turns text into audio bytes (MP3). Empty output is allowed
/// and means "nothing to play" — the controller then uses the `<Say>` path.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// Production backend: OpenAI-compatible speech API. Uses `TTS_API_URL`,
/// `TTS_MODEL`, `TTS_VOICE`, and one of `TTS_API_KEY` /
/// `PATTER_LLM_API_KEY` / `OPENAI_API_KEY`.
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// TTS model: tts-1 (fast) or tts-1-hd (higher quality).
    pub model: String,
    /// Voice id (alloy, echo, fable, onyx, nova, shimmer, ...).
    pub voice: String,
    client: reqwest::Client,
}

impl OpenAiTts {
    /// Build from environment.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("PATTER_LLM_API_KEY"))
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                VoiceError::Config(
                    "TTS requires TTS_API_KEY, PATTER_LLM_API_KEY, or OPENAI_API_KEY".to_string(),
                )
            })?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());
        Self::new(base_url, api_key, model, voice)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            client,
        })
    }
}

#[async_trait]
impl TtsBackend for OpenAiTts {
    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {status}: {body}")));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Scripted backend: returns fixed bytes for every utterance.
#[derive(Debug, Default)]
pub struct ScriptedTts {
    bytes: Vec<u8>,
}

impl ScriptedTts {
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

#[async_trait]
impl TtsBackend for ScriptedTts {
    async fn synthesize(&self, _text: &str) -> VoiceResult<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Backend that always fails, for exercising the `<Say>` fallback path.
#[derive(Debug, Default)]
pub struct FailingTts;

#[async_trait]
impl TtsBackend for FailingTts {
    async fn synthesize(&self, _text: &str) -> VoiceResult<Vec<u8>> {
        Err(VoiceError::Tts("synthesis unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_tts_returns_configured_bytes() {
        let tts = ScriptedTts::with_bytes(vec![9, 9]);
        assert_eq!(tts.synthesize("hello").await.unwrap(), vec![9, 9]);
    }

    #[tokio::test]
    async fn default_scripted_tts_is_silent() {
        let tts = ScriptedTts::default();
        assert!(tts.synthesize("hello").await.unwrap().is_empty());
    }
}
