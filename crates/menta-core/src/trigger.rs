//! ============================================================================
//! Trigger Matcher - One-Shot Phrase Detection
//! ============================================================================
//! Watches the assistant's final transcript lines for a confirmation cue.
//! Matching is case-insensitive and whitespace-tolerant; the matcher fires
//! once per armed period so a repeated cue never reopens the form.
//! ============================================================================

use tracing::debug;

/// Phrase the assistant speaks when it wants the caller to confirm by typing
pub const DEFAULT_TRIGGER_PHRASE: &str = "please type your phone number below to confirm.";

/// Edge-triggered phrase matcher
#[derive(Debug, Clone)]
pub struct TriggerMatcher {
    phrases: Vec<String>,
    fired: bool,
}

impl TriggerMatcher {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            phrases,
            fired: false,
        }
    }

    /// Whether `text` contains any configured phrase (ignores armed state)
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize(text);
        self.phrases.iter().any(|p| text.contains(p.as_str()))
    }

    /// Returns true only for the first match since the last `rearm`
    pub fn observe(&mut self, text: &str) -> bool {
        if self.fired {
            if self.matches(text) {
                debug!("Trigger phrase repeated; already fired this session");
            }
            return false;
        }

        if self.matches(text) {
            self.fired = true;
            return true;
        }

        false
    }

    pub fn rearm(&mut self) {
        self.fired = false;
    }
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self::new([DEFAULT_TRIGGER_PHRASE])
    }
}

/// Lowercase and collapse runs of whitespace
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
