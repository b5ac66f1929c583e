use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::lexicon::normalize;

/// Scores below this are treated as "no match" by [`Catalog::resolve`].
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.45;

const PHRASE_WEIGHT: f32 = 0.55;
const OVERLAP_WEIGHT: f32 = 0.45;

/// One selectable item: a stable key, a spoken display name, and the
/// alternate phrasings users actually say for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn new(key: &str, name: &str, aliases: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A fuzzy-matchable set of entries (sound names, device names, menu items).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Best entry for the utterance with its score in 0.0 - 1.0.
    ///
    /// Score blends a phrase score (exact/containment for multi-word
    /// phrases, token membership for single words, bigram similarity as
    /// the fallback for both) with token overlap against the entry name.
    pub fn best_match(&self, utterance: &str) -> Option<(&CatalogEntry, f32)> {
        let cleaned = normalize(utterance);
        if cleaned.is_empty() {
            return None;
        }
        let tokens: HashSet<&str> = cleaned.split_whitespace().collect();

        let mut best: Option<(&CatalogEntry, f32)> = None;
        for entry in &self.entries {
            let score = score_entry(entry, &cleaned, &tokens);
            match best {
                Some((_, prev)) if prev >= score => {}
                _ => best = Some((entry, score)),
            }
        }
        best
    }

    /// Best entry at or above [`DEFAULT_MATCH_THRESHOLD`], or None.
    pub fn resolve(&self, utterance: &str) -> Option<&CatalogEntry> {
        self.best_match(utterance)
            .filter(|(_, score)| *score >= DEFAULT_MATCH_THRESHOLD)
            .map(|(entry, _)| entry)
    }
}

fn score_entry(entry: &CatalogEntry, cleaned: &str, tokens: &HashSet<&str>) -> f32 {
    let name_clean = normalize(&entry.name);

    // Exact key, name or alias is always a perfect match.
    if cleaned == entry.key || cleaned == name_clean {
        return 1.0;
    }
    for alias in &entry.aliases {
        if cleaned == normalize(alias) {
            return 1.0;
        }
    }

    let mut phrase_score: f32 = phrase_similarity(&name_clean, cleaned, tokens);
    for alias in &entry.aliases {
        let alias_clean = normalize(alias);
        phrase_score = phrase_score.max(phrase_similarity(&alias_clean, cleaned, tokens));
    }

    let name_tokens: HashSet<&str> = name_clean.split_whitespace().collect();
    let overlap = name_tokens.intersection(tokens).count() as f32
        / name_tokens.len().max(1) as f32;

    (PHRASE_WEIGHT * phrase_score + OVERLAP_WEIGHT * overlap).clamp(0.0, 1.0)
}

fn phrase_similarity(phrase: &str, cleaned: &str, tokens: &HashSet<&str>) -> f32 {
    if phrase.is_empty() {
        return 0.0;
    }
    if phrase.contains(char::is_whitespace) {
        // Multi-word phrases may be wrapped in filler ("play some ocean
        // waves for me"), so containment either way counts as exact.
        if cleaned.contains(phrase) || phrase.contains(cleaned) {
            return 1.0;
        }
        return bigram_similarity(cleaned, phrase);
    }
    // Single words must match a whole token. "rain" inside "training" is
    // not a mention of rain.
    if tokens.contains(phrase) {
        return 1.0;
    }
    tokens
        .iter()
        .map(|t| bigram_similarity(t, phrase))
        .fold(0.0, f32::max)
}

/// Dice coefficient over character-bigram sets, in 0.0 - 1.0.
#[must_use]
pub fn bigram_similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let a_grams = bigrams(a);
    let b_grams = bigrams(b);
    if a_grams.is_empty() || b_grams.is_empty() {
        return 0.0;
    }
    let shared = a_grams.intersection(&b_grams).count();
    (2.0 * shared as f32) / ((a_grams.len() + b_grams.len()) as f32)
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}
