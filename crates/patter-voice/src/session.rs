//! **Session Store** — per-call conversation memory with bounded FIFO history.
//!
//! Keyed by the opaque call id the telephony platform sends on every request.
//! Backed by a `DashMap` so concurrent calls never block each other; each
//! per-call operation is an atomic read-modify-write under that key's shard
//! lock. Sessions are ephemeral: the expiry sweeper removes anything idle
//! past the configured max age, and nothing survives a restart.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;

/// Who produced a turn of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Caller,
    Persona,
}

/// One utterance within a call, in conversational order.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRecord {
    pub speaker: Speaker,
    pub text: String,
}

struct CallSession {
    history: VecDeque<TurnRecord>,
    last_activity: DateTime<Utc>,
}

impl CallSession {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            last_activity: Utc::now(),
        }
    }
}

/// Conversation memory for all active calls.
pub struct SessionStore {
    sessions: DashMap<String, CallSession>,
    history_cap: usize,
}

impl SessionStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            history_cap,
        }
    }

    /// Creates the session if absent and bumps its activity timestamp.
    /// Returns `true` when the call id had no session yet — the turn
    /// controller uses this to detect the first turn of a call, so the
    /// record directive is emitted exactly once even when the first turn
    /// is a greeting with no caller speech.
    pub fn begin_turn(&self, call_sid: &str) -> bool {
        match self.sessions.entry(call_sid.to_string()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().last_activity = Utc::now();
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CallSession::new());
                true
            }
        }
    }

    /// Appends a turn, creating the session if absent. The history is
    /// truncated from the front once it exceeds the cap, so the prompt sent
    /// to the reply backend stays bounded.
    pub fn append_turn(&self, call_sid: &str, speaker: Speaker, text: impl Into<String>) {
        let mut session = self
            .sessions
            .entry(call_sid.to_string())
            .or_insert_with(CallSession::new);
        session.history.push_back(TurnRecord {
            speaker,
            text: text.into(),
        });
        while session.history.len() > self.history_cap {
            session.history.pop_front();
        }
        session.last_activity = Utc::now();
    }

    /// Snapshot of the conversation so far. An unseen call id yields an
    /// empty history — absence is a valid state, not an error.
    pub fn history(&self, call_sid: &str) -> Vec<TurnRecord> {
        self.sessions
            .get(call_sid)
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes every session whose last activity precedes `cutoff`.
    /// Returns the number of sessions dropped (for sweep logging).
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.last_activity >= cutoff);
        before - self.sessions.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unseen_call_yields_empty_history() {
        let store = SessionStore::new(6);
        assert!(store.history("CA-never-seen").is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn begin_turn_reports_first_turn_once() {
        let store = SessionStore::new(6);
        assert!(store.begin_turn("CA1"));
        assert!(!store.begin_turn("CA1"));
        assert!(store.begin_turn("CA2"));
    }

    #[test]
    fn history_is_capped_fifo() {
        let store = SessionStore::new(6);
        for i in 0..10 {
            store.append_turn("CA1", Speaker::Caller, format!("utterance {i}"));
        }
        let history = store.history("CA1");
        assert_eq!(history.len(), 6);
        // Oldest turns dropped first: 0..4 are gone, 4..10 remain.
        assert_eq!(history[0].text, "utterance 4");
        assert_eq!(history[5].text, "utterance 9");
    }

    #[test]
    fn append_preserves_conversational_order() {
        let store = SessionStore::new(6);
        store.append_turn("CA1", Speaker::Caller, "hello who is this");
        store.append_turn("CA1", Speaker::Persona, "this is Patter");
        let history = store.history("CA1");
        assert_eq!(history[0].speaker, Speaker::Caller);
        assert_eq!(history[0].text, "hello who is this");
        assert_eq!(history[1].speaker, Speaker::Persona);
    }

    #[test]
    fn sessions_are_isolated_per_call() {
        let store = SessionStore::new(6);
        store.append_turn("CA1", Speaker::Caller, "first call");
        store.append_turn("CA2", Speaker::Caller, "second call");
        assert_eq!(store.history("CA1").len(), 1);
        assert_eq!(store.history("CA2").len(), 1);
        assert_eq!(store.history("CA1")[0].text, "first call");
    }

    #[test]
    fn eviction_removes_only_entries_before_cutoff() {
        let store = SessionStore::new(6);
        store.append_turn("CA1", Speaker::Caller, "hello");
        store.append_turn("CA2", Speaker::Caller, "hi");

        // Cutoff in the past: everything is recent enough to survive.
        let evicted = store.evict_older_than(Utc::now() - Duration::minutes(30));
        assert_eq!(evicted, 0);
        assert_eq!(store.len(), 2);

        // Cutoff in the future: everything precedes it and is dropped.
        let evicted = store.evict_older_than(Utc::now() + Duration::seconds(1));
        assert_eq!(evicted, 2);
        assert!(store.history("CA1").is_empty());
    }
}
