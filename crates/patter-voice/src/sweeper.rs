//! **Expiry Sweeper** — background eviction of stale call state.
//!
//! Conversation memory is call-scoped and ephemeral; anything idle past the
//! configured max age is reclaimed here instead of waiting for a restart.
//! The sweep shares the stores' concurrency-safe access path, so it never
//! blocks in-flight turns, and audio buffers are `Arc`-shared so eviction
//! cannot free bytes mid-serve.

use crate::audio_cache::AudioCache;
use crate::session::SessionStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawns the sweep task. `interval` should be well under `max_age`.
pub fn spawn(
    sessions: Arc<SessionStore>,
    audio: Arc<AudioCache>,
    max_age: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let max_age = chrono::Duration::seconds(max_age.as_secs() as i64);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - max_age;
            let swept_sessions = sessions.evict_older_than(cutoff);
            let swept_audio = audio.evict_older_than(cutoff);
            if swept_sessions > 0 || swept_audio > 0 {
                debug!(
                    sessions = swept_sessions,
                    artifacts = swept_audio,
                    "swept stale call state"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Speaker;

    #[tokio::test]
    async fn sweeper_leaves_fresh_entries_alone() {
        let sessions = Arc::new(SessionStore::new(6));
        let audio = Arc::new(AudioCache::new());
        sessions.append_turn("CA1", Speaker::Caller, "hello");
        audio.put("CA1", vec![1]);

        let handle = spawn(
            Arc::clone(&sessions),
            Arc::clone(&audio),
            Duration::from_secs(30 * 60),
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();

        assert_eq!(sessions.history("CA1").len(), 1);
        assert!(audio.get("CA1").is_some());
    }

    #[tokio::test]
    async fn sweeper_evicts_entries_past_max_age() {
        let sessions = Arc::new(SessionStore::new(6));
        let audio = Arc::new(AudioCache::new());
        sessions.append_turn("CA1", Speaker::Caller, "hello");
        audio.put("CA1", vec![1]);

        // Zero max age: everything already written is past the cutoff.
        let handle = spawn(
            Arc::clone(&sessions),
            Arc::clone(&audio),
            Duration::from_secs(0),
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();

        assert!(sessions.is_empty());
        assert!(audio.is_empty());
    }
}
