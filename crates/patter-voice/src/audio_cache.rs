//! **Audio Artifact Cache** — the most recent synthesized speech per call.
//!
//! Keyed by call id, never by a process-wide slot: two concurrent callers
//! must never hear each other's audio. A new `put` for the same call
//! replaces the old buffer — only the current turn's audio is ever served.
//! Buffers come back as `Arc<[u8]>`, so a sweep that evicts an entry cannot
//! free bytes that are still being streamed to the platform.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

struct AudioArtifact {
    bytes: Arc<[u8]>,
    produced_at: DateTime<Utc>,
}

/// Per-call cache of the latest synthesized utterance.
pub struct AudioCache {
    artifacts: DashMap<String, AudioArtifact>,
}

impl AudioCache {
    pub fn new() -> Self {
        Self {
            artifacts: DashMap::new(),
        }
    }

    /// Stores the buffer for this call, replacing any previous artifact.
    /// Returns the `produced_at` timestamp, which the turn controller embeds
    /// in the retrieval URL to bust platform-side caching.
    pub fn put(&self, call_sid: &str, bytes: Vec<u8>) -> DateTime<Utc> {
        let produced_at = Utc::now();
        self.artifacts.insert(
            call_sid.to_string(),
            AudioArtifact {
                bytes: bytes.into(),
                produced_at,
            },
        );
        produced_at
    }

    /// The current artifact for this call, if any. Absence is an expected
    /// state (before the first turn completes, or after expiry) and the
    /// caller must answer it with its own fallback.
    pub fn get(&self, call_sid: &str) -> Option<(Arc<[u8]>, DateTime<Utc>)> {
        self.artifacts
            .get(call_sid)
            .map(|a| (Arc::clone(&a.bytes), a.produced_at))
    }

    /// Removes every artifact produced before `cutoff`; returns the count.
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.artifacts.len();
        self.artifacts.retain(|_, a| a.produced_at >= cutoff);
        before - self.artifacts.len()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl Default for AudioCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn get_returns_last_put_bytes() {
        let cache = AudioCache::new();
        cache.put("CA1", vec![1, 2, 3]);
        let (bytes, _) = cache.get("CA1").expect("artifact present");
        assert_eq!(&bytes[..], &[1, 2, 3]);
    }

    #[test]
    fn put_overwrites_previous_artifact() {
        let cache = AudioCache::new();
        cache.put("CA1", vec![1]);
        cache.put("CA1", vec![2]);
        let (bytes, _) = cache.get("CA1").unwrap();
        assert_eq!(&bytes[..], &[2]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_calls_never_share_audio() {
        let cache = AudioCache::new();
        cache.put("CA1", vec![0xAA; 16]);
        cache.put("CA2", vec![0xBB; 16]);
        let (ca1, _) = cache.get("CA1").unwrap();
        let (ca2, _) = cache.get("CA2").unwrap();
        assert_eq!(&ca1[..], &[0xAA; 16]);
        assert_eq!(&ca2[..], &[0xBB; 16]);
    }

    #[test]
    fn absence_is_a_valid_state() {
        let cache = AudioCache::new();
        assert!(cache.get("CA-unknown").is_none());
    }

    #[test]
    fn eviction_respects_cutoff() {
        let cache = AudioCache::new();
        cache.put("CA1", vec![1]);

        assert_eq!(cache.evict_older_than(Utc::now() - Duration::minutes(30)), 0);
        assert!(cache.get("CA1").is_some());

        assert_eq!(cache.evict_older_than(Utc::now() + Duration::seconds(1)), 1);
        assert!(cache.get("CA1").is_none());
    }

    #[test]
    fn served_buffer_survives_eviction() {
        let cache = AudioCache::new();
        cache.put("CA1", vec![7, 7, 7]);
        let (held, _) = cache.get("CA1").unwrap();
        cache.evict_older_than(Utc::now() + Duration::seconds(1));
        // The Arc snapshot taken before the sweep still reads the same bytes.
        assert_eq!(&held[..], &[7, 7, 7]);
    }
}
