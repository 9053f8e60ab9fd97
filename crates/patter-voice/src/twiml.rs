//! Call-control document builder — the TwiML subset the turn loop needs.
//!
//! The telephony platform has no mid-call error channel: an absent or
//! malformed document kills the live call. Rendering is therefore plain
//! string building that cannot fail, and `apology()` provides the minimal
//! valid "apologize and hang up" document for internal faults.

use std::fmt::Write;

/// The verbs the loop emits, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Verb {
    /// Start call recording with completion callbacks. Emitted once per
    /// call, on the first turn.
    Record {
        status_callback: String,
        transcribe_callback: String,
    },
    /// Play synthesized audio fetched from the per-call retrieval URL.
    Play { url: String },
    /// Speak text with the platform's native voice — the delivery path that
    /// does not depend on the audio cache.
    Say { text: String },
    /// Listen for the caller's next utterance and re-POST to `action`.
    Gather { action: String },
    Hangup,
}

/// An ordered call-control document.
#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        mut self,
        status_callback: impl Into<String>,
        transcribe_callback: impl Into<String>,
    ) -> Self {
        self.verbs.push(Verb::Record {
            status_callback: status_callback.into(),
            transcribe_callback: transcribe_callback.into(),
        });
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play { url: url.into() });
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say { text: text.into() });
        self
    }

    pub fn gather(mut self, action: impl Into<String>) -> Self {
        self.verbs.push(Verb::Gather {
            action: action.into(),
        });
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Whether the document tells the platform to keep listening.
    pub fn continues_call(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Gather { .. }))
    }

    /// Renders the XML document. Infallible: writing to a `String` cannot
    /// error, so `write!` results are discarded.
    pub fn render(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Record {
                    status_callback,
                    transcribe_callback,
                } => {
                    let _ = write!(
                        xml,
                        "<Record recordingStatusCallback=\"{}\" transcribeCallback=\"{}\" playBeep=\"false\"/>",
                        escape(status_callback),
                        escape(transcribe_callback),
                    );
                }
                Verb::Play { url } => {
                    let _ = write!(xml, "<Play>{}</Play>", escape(url));
                }
                Verb::Say { text } => {
                    let _ = write!(xml, "<Say>{}</Say>", escape(text));
                }
                Verb::Gather { action } => {
                    let _ = write!(
                        xml,
                        "<Gather input=\"speech\" action=\"{}\" method=\"POST\" speechTimeout=\"auto\"/>",
                        escape(action),
                    );
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

/// Minimal last-resort document: apologize and end the call. Used by the
/// gateway when turn handling itself faults, since no response at all would
/// break the live call.
pub fn apology() -> VoiceResponse {
    VoiceResponse::new()
        .say("I'm sorry, something went wrong on my end. Goodbye.")
        .hangup()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_verbs_in_order() {
        let xml = VoiceResponse::new()
            .record("https://x/recording-status", "https://x/transcription")
            .play("https://x/audio/CA1?t=123")
            .gather("/voice")
            .render();
        let record = xml.find("<Record").unwrap();
        let play = xml.find("<Play>").unwrap();
        let gather = xml.find("<Gather").unwrap();
        assert!(record < play && play < gather);
        assert!(xml.starts_with("<?xml"));
        assert!(xml.ends_with("</Response>"));
    }

    #[test]
    fn escapes_text_and_attributes() {
        let xml = VoiceResponse::new()
            .say("Tom & Jerry <3")
            .gather("/voice?a=\"b\"")
            .render();
        assert!(xml.contains("Tom &amp; Jerry &lt;3"));
        assert!(xml.contains("action=\"/voice?a=&quot;b&quot;\""));
    }

    #[test]
    fn apology_document_ends_the_call() {
        let doc = apology();
        assert!(!doc.continues_call());
        let xml = doc.render();
        assert!(xml.contains("<Say>"));
        assert!(xml.contains("<Hangup/>"));
    }
}
