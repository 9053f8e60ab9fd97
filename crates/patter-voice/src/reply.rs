//! **Reply Generator** — turns the bounded session history into the
//! persona's next utterance via an OpenAI-compatible chat completions API.
//!
//! Implement `ReplyBackend` for other providers, or use `ScriptedReply` to
//! run the loop without a language model (tests, offline smoke runs).

use crate::error::{VoiceError, VoiceResult};
use crate::session::{Speaker, TurnRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Backend that produces the persona's next utterance. The last history
/// entry is the caller's newest utterance; earlier entries give context.
#[async_trait]
pub trait ReplyBackend: Send + Sync {
    async fn reply(&self, persona_prompt: &str, history: &[TurnRecord]) -> VoiceResult<String>;
}

/// Production backend: OpenAI-compatible `/chat/completions` (OpenAI,
/// OpenRouter, Groq, etc.). Uses `LLM_API_URL`, `LLM_MODEL`, and one of
/// `PATTER_LLM_API_KEY` / `OPENAI_API_KEY` / `OPENROUTER_API_KEY`.
#[derive(Debug, Clone)]
pub struct OpenAiReply {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Model name (e.g. gpt-4o-mini).
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiReply {
    /// Build from environment. The request timeout is deliberately short:
    /// a failed reply degrades to the scripted reprompt immediately rather
    /// than retrying, so turn latency stays bounded.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("PATTER_LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .map_err(|_| {
                VoiceError::Config(
                    "Reply backend requires PATTER_LLM_API_KEY, OPENAI_API_KEY, or OPENROUTER_API_KEY"
                        .to_string(),
                )
            })?;
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self::new(base_url, api_key, model)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| VoiceError::Reply(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl ReplyBackend for OpenAiReply {
    async fn reply(&self, persona_prompt: &str, history: &[TurnRecord]) -> VoiceResult<String> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(serde_json::json!({
            "role": "system",
            "content": persona_prompt,
        }));
        for turn in history {
            let role = match turn.speaker {
                Speaker::Caller => "user",
                Speaker::Persona => "assistant",
            };
            messages.push(serde_json::json!({ "role": role, "content": turn.text }));
        }
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": 150,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Reply(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Reply(format!(
                "chat API error {status}: {body}"
            )));
        }
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::Reply(e.to_string()))?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VoiceError::Reply("chat API returned no usable text".to_string()))
    }
}

/// Scripted backend: returns a fixed utterance and counts invocations.
/// Lets the loop run without a model, and lets tests assert which turns
/// invoked the generator at all.
#[derive(Debug, Default)]
pub struct ScriptedReply {
    response: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(s: impl Into<String>) -> Self {
        Self {
            response: Some(s.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `reply` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyBackend for ScriptedReply {
    async fn reply(&self, _persona_prompt: &str, _history: &[TurnRecord]) -> VoiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .response
            .clone()
            .unwrap_or_else(|| "I'm running without a language model right now.".to_string()))
    }
}

/// Backend that always fails, for exercising the fallback path.
#[derive(Debug, Default)]
pub struct FailingReply;

#[async_trait]
impl ReplyBackend for FailingReply {
    async fn reply(&self, _persona_prompt: &str, _history: &[TurnRecord]) -> VoiceResult<String> {
        Err(VoiceError::Reply("reply backend unavailable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_reply_counts_calls() {
        let backend = ScriptedReply::with_response("hello there");
        assert_eq!(backend.call_count(), 0);
        let out = backend.reply("persona", &[]).await.unwrap();
        assert_eq!(out, "hello there");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_reply_reports_unavailable() {
        let backend = FailingReply;
        let err = backend.reply("persona", &[]).await.unwrap_err();
        assert!(matches!(err, VoiceError::Reply(_)));
    }
}
