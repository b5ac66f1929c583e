use serde::{Deserialize, Serialize};

/// Normalize raw transcription for matching: lowercase, strip punctuation
/// except apostrophes. "Stop." -> "stop", "Done, thanks!" -> "done thanks".
///
/// STT output is noisy; every matcher in this module works on normalized
/// text so callers can pass the raw transcription straight through.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '\'')
        .collect();
    stripped.trim().to_string()
}

/// Whole-word / phrase membership test on normalized text.
///
/// Single-word entries match on a whole-word basis ("stop" must NOT match
/// inside "stopping"); multi-word entries match as substrings.
pub fn matches_entry(cleaned: &str, entry: &str) -> bool {
    if entry.contains(char::is_whitespace) {
        cleaned.contains(entry)
    } else {
        cleaned.split_whitespace().any(|word| word == entry)
    }
}

/// The parameterized utterance lexicon shared by every ability.
///
/// Consolidates the exit/yes/no word sets that each ability used to
/// duplicate. All entries must be lowercase; `Default` carries the common
/// sets. Owned per session, passed via constructors — never shared statics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    /// Tier 1: force-exit phrases, matched as substrings ("exit timer").
    /// Instant shutdown even mid-question. Empty by default; abilities add
    /// their own scoped phrases.
    pub force_exit_phrases: Vec<String>,
    /// Tier 2: exit commands, matched whole-word anywhere in the sentence.
    pub exit_commands: Vec<String>,
    /// Tier 3: conversational sign-offs, matched exactly or as the start of
    /// the sentence ("no thanks", "that's all"). NOT consulted by
    /// `is_hard_exit` — "no" is a valid answer to many questions.
    pub exit_responses: Vec<String>,
    pub yes_words: Vec<String>,
    pub no_words: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            force_exit_phrases: Vec::new(),
            exit_commands: words(&["exit", "stop", "quit", "cancel"]),
            exit_responses: words(&[
                "no",
                "nope",
                "done",
                "bye",
                "goodbye",
                "thanks",
                "thank you",
                "no thanks",
                "nothing else",
                "all good",
                "i'm good",
                "that's all",
                "that's it",
                "i'm done",
                "we're done",
            ]),
            yes_words: words(&[
                "yes", "yeah", "yep", "sure", "okay", "ok", "yup", "correct", "right",
            ]),
            no_words: words(&["no", "nope", "nah", "not"]),
        }
    }
}

impl Lexicon {
    /// Hybrid exit detection: force phrases -> commands -> responses.
    ///
    /// Tier 3 responses only count as the whole utterance or its opening
    /// ("no thanks", "no i'm good") so that "no rain today" keeps flowing.
    pub fn is_exit(&self, text: &str) -> bool {
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            return false;
        }

        if self
            .force_exit_phrases
            .iter()
            .any(|phrase| cleaned.contains(phrase.as_str()))
        {
            return true;
        }

        if self
            .exit_commands
            .iter()
            .any(|cmd| matches_entry(&cleaned, cmd))
        {
            return true;
        }

        self.exit_responses
            .iter()
            .any(|resp| cleaned == *resp || cleaned.starts_with(&format!("{resp} ")))
    }

    /// Exit detection for mid-question contexts (tiers 1 + 2 only).
    ///
    /// Use instead of `is_exit` when "no", "done", "thanks" are valid
    /// answers to the current question (onboarding, confirmations).
    pub fn is_hard_exit(&self, text: &str) -> bool {
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            return false;
        }

        if self
            .force_exit_phrases
            .iter()
            .any(|phrase| cleaned.contains(phrase.as_str()))
        {
            return true;
        }

        self.exit_commands
            .iter()
            .any(|cmd| matches_entry(&cleaned, cmd))
    }

    /// Whole-word affirmative check ("yes" never matches "yesterday").
    pub fn is_affirmative(&self, text: &str) -> bool {
        let cleaned = normalize(text);
        self.yes_words.iter().any(|w| matches_entry(&cleaned, w))
    }

    /// Whole-word negative check.
    pub fn is_negative(&self, text: &str) -> bool {
        let cleaned = normalize(text);
        self.no_words.iter().any(|w| matches_entry(&cleaned, w))
    }
}
