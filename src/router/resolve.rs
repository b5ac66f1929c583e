use std::collections::HashSet;

use super::types::{IntentResult, IntentSource, LlmVerdict};

/// At or above this the LLM verdict is accepted outright.
pub const HIGH_CONFIDENCE: f32 = 0.8;

/// At or above this the LLM verdict needs corroboration to be trusted.
pub const MEDIUM_CONFIDENCE: f32 = 0.5;

/// Confidence assigned when only the keyword prefilter matched.
pub const KEYWORD_FALLBACK_CONFIDENCE: f32 = 0.4;

/// Pure function: combine the LLM verdict with the keyword prefilter's top
/// candidate into the final routing decision.
///
/// High-confidence valid verdicts win outright. Mid-confidence verdicts are
/// accepted when the keyword candidate agrees, flagged ambiguous when it
/// disagrees (the candidate is surfaced as a suggestion), and passed through
/// as medium-confidence when there is no candidate at all. Anything weaker
/// falls back to the keyword candidate at a fixed low confidence, or to
/// no-match.
pub fn resolve(
    verdict: LlmVerdict,
    keyword: Option<&str>,
    valid: &HashSet<String>,
) -> IntentResult {
    let llm_known = valid.contains(&verdict.intent);

    if llm_known && verdict.confidence >= HIGH_CONFIDENCE {
        return IntentResult {
            intent: verdict.intent,
            confidence: verdict.confidence,
            source: IntentSource::LlmHighConfidence,
            slots: verdict.slots,
            keyword_suggestion: None,
        };
    }

    if llm_known && verdict.confidence >= MEDIUM_CONFIDENCE {
        return match keyword {
            Some(candidate) if candidate == verdict.intent => IntentResult {
                intent: verdict.intent,
                confidence: verdict.confidence,
                source: IntentSource::LlmKeywordAgree,
                slots: verdict.slots,
                keyword_suggestion: None,
            },
            Some(candidate) => IntentResult {
                intent: verdict.intent,
                confidence: verdict.confidence,
                source: IntentSource::Ambiguous,
                slots: verdict.slots,
                keyword_suggestion: Some(candidate.to_string()),
            },
            None => IntentResult {
                intent: verdict.intent,
                confidence: verdict.confidence,
                source: IntentSource::LlmMediumConfidence,
                slots: verdict.slots,
                keyword_suggestion: None,
            },
        };
    }

    // LLM was weak or hallucinated an unknown intent. Slots it extracted
    // may still be usable if the keyword candidate takes over.
    if let Some(candidate) = keyword {
        if valid.contains(candidate) {
            return IntentResult {
                intent: candidate.to_string(),
                confidence: KEYWORD_FALLBACK_CONFIDENCE,
                source: IntentSource::Keyword,
                slots: verdict.slots,
                keyword_suggestion: None,
            };
        }
    }

    IntentResult::no_match()
}
