use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Intent name used when nothing could be classified.
pub const UNKNOWN_INTENT: &str = "unknown";

/// Reserved intent name produced by exit-phrase detection.
pub const EXIT_INTENT: &str = "exit";

/// Where a routing decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    /// Keyword lexicon alone (LLM absent, failed, or below threshold).
    Keyword,
    LlmHighConfidence,
    /// Mid-confidence LLM answer backed by an agreeing keyword match.
    LlmKeywordAgree,
    LlmMediumConfidence,
    /// Mid-confidence LLM answer contradicted by the keyword prefilter.
    Ambiguous,
    NoMatch,
}

/// Final routing decision handed to the dialogue loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: String,
    pub confidence: f32, // 0.0 - 1.0
    pub source: IntentSource,
    #[serde(default)]
    pub slots: Map<String, Value>,
    /// Set only when the keyword prefilter disagreed with the LLM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_suggestion: Option<String>,
}

impl IntentResult {
    pub fn no_match() -> Self {
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
            source: IntentSource::NoMatch,
            slots: Map::new(),
            keyword_suggestion: None,
        }
    }

    pub fn keyword(intent: &str, confidence: f32) -> Self {
        Self {
            intent: intent.to_string(),
            confidence,
            source: IntentSource::Keyword,
            slots: Map::new(),
            keyword_suggestion: None,
        }
    }
}

/// Raw classification out of the LLM, before confidence resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmVerdict {
    pub intent: String,
    pub confidence: f32, // 0.0 - 1.0
    #[serde(default)]
    pub slots: Map<String, Value>,
}

impl LlmVerdict {
    /// Verdict used when the LLM reply was unusable.
    pub fn fallback() -> Self {
        Self {
            intent: UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
            slots: Map::new(),
        }
    }
}

/// Drop a leading/trailing markdown code fence, tolerating a "json"
/// language tag. Models add these no matter how firmly the prompt says
/// not to.
pub fn strip_json_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse a raw LLM reply into a verdict. NEVER panics: anything that is
/// not a JSON object with a usable intent collapses to
/// [`LlmVerdict::fallback`].
pub fn parse_verdict(raw: &str) -> LlmVerdict {
    let stripped = strip_json_fences(raw);
    let value: Value = match serde_json::from_str(stripped) {
        Ok(v) => v,
        Err(_) => return LlmVerdict::fallback(),
    };
    let Some(obj) = value.as_object() else {
        return LlmVerdict::fallback();
    };

    // Some prompts call the field "mode" instead of "intent".
    let intent = obj
        .get("intent")
        .or_else(|| obj.get("mode"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_INTENT)
        .to_string();

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0) as f32;

    let mut slots = Map::new();
    for (key, val) in obj {
        if key == "intent" || key == "mode" || key == "confidence" {
            continue;
        }
        if val.is_null() {
            continue;
        }
        slots.insert(key.clone(), val.clone());
    }

    LlmVerdict {
        intent,
        confidence,
        slots,
    }
}
