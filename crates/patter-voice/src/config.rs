//! Environment-driven configuration for the turn loop and its stores.
//!
//! Collaborator backends carry their own `from_env` constructors (see
//! `reply::OpenAiReply` and `tts::OpenAiTts`); this config only covers the
//! loop itself: scripted texts, history bound, and expiry policy.

use std::time::Duration;

/// Settings for the call turn loop.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Public base URL the telephony platform can reach, no trailing slash.
    /// Embedded in `<Play>` audio URLs and recording callbacks.
    pub public_url: String,
    /// System instruction defining the persona sent to the reply backend.
    pub persona_prompt: String,
    /// Spoken on the first turn of a call, before the caller has said anything.
    pub greeting: String,
    /// Spoken when the caller's speech was empty or no usable reply came back.
    pub reprompt: String,
    /// Maximum turns kept per session; the oldest are dropped first.
    pub history_cap: usize,
    /// Sessions and audio artifacts older than this are swept.
    pub max_age: Duration,
    /// Sweep cadence. Keep well under `max_age`.
    pub sweep_interval: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:10000".to_string(),
            persona_prompt: "You are Patter, a friendly phone receptionist. \
                You are speaking out loud over a phone call, so keep replies \
                to one or two short sentences and never use lists or markup."
                .to_string(),
            greeting: "Hi, you've reached Patter. What can I do for you today?".to_string(),
            reprompt: "Sorry, I didn't catch that. Could you say it again?".to_string(),
            history_cap: 6,
            max_age: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl VoiceConfig {
    /// Build from environment, falling back to defaults for anything unset:
    /// `PATTER_PUBLIC_URL`, `PATTER_PERSONA`, `PATTER_GREETING`,
    /// `PATTER_REPROMPT`, `PATTER_HISTORY_CAP`, `PATTER_MAX_AGE_SECS`,
    /// `PATTER_SWEEP_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            public_url: env_string("PATTER_PUBLIC_URL", &defaults.public_url)
                .trim_end_matches('/')
                .to_string(),
            persona_prompt: env_string("PATTER_PERSONA", &defaults.persona_prompt),
            greeting: env_string("PATTER_GREETING", &defaults.greeting),
            reprompt: env_string("PATTER_REPROMPT", &defaults.reprompt),
            history_cap: env_u64("PATTER_HISTORY_CAP", defaults.history_cap as u64) as usize,
            max_age: Duration::from_secs(env_u64(
                "PATTER_MAX_AGE_SECS",
                defaults.max_age.as_secs(),
            )),
            sweep_interval: Duration::from_secs(env_u64(
                "PATTER_SWEEP_SECS",
                defaults.sweep_interval.as_secs(),
            )),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_sweep_under_max_age() {
        let config = VoiceConfig::default();
        assert!(config.sweep_interval < config.max_age);
        assert_eq!(config.history_cap, 6);
        assert!(!config.public_url.ends_with('/'));
    }
}
