pub mod fuzzy;
pub mod lexicon;
pub mod numbers;
pub mod resolve;
pub mod types;

pub use fuzzy::{bigram_similarity, Catalog, CatalogEntry, DEFAULT_MATCH_THRESHOLD};
pub use lexicon::Lexicon;
pub use resolve::{resolve, HIGH_CONFIDENCE, KEYWORD_FALLBACK_CONFIDENCE, MEDIUM_CONFIDENCE};
pub use types::{
    parse_verdict, strip_json_fences, IntentResult, IntentSource, LlmVerdict, EXIT_INTENT,
    UNKNOWN_INTENT,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that can answer a one-shot classification prompt with raw text.
/// The HTTP client implements this; tests use scripted stand-ins.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> anyhow::Result<String>;
}

/// One intent the router may emit: its name, trigger phrases for the
/// keyword prefilter, and the slot names the LLM should try to fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub trigger_phrases: Vec<String>,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl IntentSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            trigger_phrases: Vec::new(),
            slots: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn triggers(mut self, phrases: &[&str]) -> Self {
        self.trigger_phrases = phrases.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn slot_names(mut self, slots: &[&str]) -> Self {
        self.slots = slots.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn samples(mut self, examples: &[&str]) -> Self {
        self.examples = examples.iter().map(|e| e.to_string()).collect();
        self
    }
}

/// The full set of intents a session understands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentSchema {
    pub intents: Vec<IntentSpec>,
}

impl IntentSchema {
    pub fn new(intents: Vec<IntentSpec>) -> Self {
        Self { intents }
    }

    /// Names the resolver will accept from the LLM. The reserved exit
    /// intent is always valid.
    pub fn valid_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> =
            self.intents.iter().map(|spec| spec.name.clone()).collect();
        names.insert(EXIT_INTENT.to_string());
        names
    }
}

/// Routes one utterance to one intent.
///
/// Order of authority: exit lexicon first (cheap, never wrong about
/// "stop"), then the keyword prefilter, then the LLM with the prefilter's
/// top candidate as corroboration. Works fully offline when no classifier
/// is attached.
pub struct IntentRouter {
    pub schema: IntentSchema,
    pub lexicon: Lexicon,
    classifier: Option<Arc<dyn IntentClassifier>>,
}

impl IntentRouter {
    pub fn new(schema: IntentSchema, lexicon: Lexicon) -> Self {
        Self {
            schema,
            lexicon,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Score every intent by its matched trigger phrases, best first.
    ///
    /// A phrase counts only when it matches per the lexicon rules (whole
    /// word for single words, substring for multi-word phrases), and longer
    /// phrases weigh more, so "turn off the lights" outbids "off".
    pub fn keyword_prefilter(&self, utterance: &str) -> Vec<(String, usize)> {
        let cleaned = lexicon::normalize(utterance);
        if cleaned.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for spec in &self.schema.intents {
            let mut score = 0usize;
            for phrase in &spec.trigger_phrases {
                let phrase_clean = lexicon::normalize(phrase);
                if !phrase_clean.is_empty() && lexicon::matches_entry(&cleaned, &phrase_clean) {
                    score += phrase_clean.len();
                }
            }
            if score > 0 {
                candidates.push((spec.name.clone(), score));
            }
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates
    }

    /// Prompt demanding a bare JSON object. Models still wrap it in fences
    /// sometimes; parse_verdict strips those.
    pub fn build_classify_prompt(&self, utterance: &str) -> String {
        let mut prompt = String::from(
            "You route commands for a voice assistant.\n\
             Reply with EXACTLY one JSON object and nothing else. No markdown, no fences, no prose.\n\
             Shape: {\"intent\": \"<name>\", \"confidence\": <0.0-1.0>, \"<slot>\": <value or null>}\n\
             Use null for every slot the command does not mention.\n\
             If no intent fits, use {\"intent\": \"unknown\", \"confidence\": 0.0}.\n\nIntents:\n",
        );
        for spec in &self.schema.intents {
            let _ = write!(prompt, "- {}: {}", spec.name, spec.description);
            if !spec.slots.is_empty() {
                let _ = write!(prompt, " Slots: {}.", spec.slots.join(", "));
            }
            if !spec.examples.is_empty() {
                let _ = write!(prompt, " e.g. \"{}\"", spec.examples.join("\", \""));
            }
            prompt.push('\n');
        }
        let _ = write!(prompt, "\nCommand: {utterance}\nJSON:");
        prompt
    }

    /// Classify one utterance end to end.
    pub async fn route(&self, utterance: &str) -> IntentResult {
        let cleaned = lexicon::normalize(utterance);
        if cleaned.is_empty() {
            return IntentResult::no_match();
        }

        // Exit phrases never go near the LLM.
        if self.lexicon.is_exit(utterance) {
            return IntentResult::keyword(EXIT_INTENT, 1.0);
        }

        let candidates = self.keyword_prefilter(utterance);
        let top_keyword = candidates.first().map(|(name, _)| name.as_str());

        let Some(classifier) = &self.classifier else {
            return match top_keyword {
                Some(name) => IntentResult::keyword(name, KEYWORD_FALLBACK_CONFIDENCE),
                None => IntentResult::no_match(),
            };
        };

        let prompt = self.build_classify_prompt(utterance);
        let verdict = match classifier.classify(&prompt).await {
            Ok(raw) if !raw.trim().is_empty() => parse_verdict(&raw),
            Ok(_) => LlmVerdict::fallback(),
            Err(e) => {
                // The session must keep flowing on a dead LLM, so degrade
                // to keywords instead of surfacing the error.
                warn!("intent classification failed: {e:#}");
                LlmVerdict::fallback()
            }
        };
        debug!(
            intent = %verdict.intent,
            confidence = verdict.confidence,
            keyword = ?top_keyword,
            "classified"
        );

        resolve(verdict, top_keyword, &self.schema.valid_names())
    }

    /// Ask the LLM whether a short, otherwise-unmatched utterance was a
    /// goodbye. Only a reply starting with "yes" counts; an absent or
    /// failing classifier answers no.
    pub async fn confirm_exit_with_llm(&self, utterance: &str) -> bool {
        let Some(classifier) = &self.classifier else {
            return false;
        };
        let prompt = format!(
            "The user of a voice assistant just said: \"{utterance}\"\n\
             Does the user want to END the conversation? Answer with exactly one word: yes or no.\n\
             Answer:"
        );
        match classifier.classify(&prompt).await {
            Ok(reply) => lexicon::normalize(&reply).starts_with("yes"),
            Err(e) => {
                debug!("exit confirmation check failed: {e:#}");
                false
            }
        }
    }
}
