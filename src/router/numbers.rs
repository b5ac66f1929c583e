use regex::Regex;
use std::sync::LazyLock;

use super::lexicon::normalize;

static ANY_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").expect("valid regex"));

static WORDED_MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-z][a-z\s-]*?)\s*min(?:ute)?s?\b").expect("valid regex")
});

static VERBED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:add|extend|plus)\s+([a-z][a-z\s-]*)").expect("valid regex"));

fn word_value(word: &str) -> Option<u32> {
    let value = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(value)
}

/// Parse a spoken number: "five" -> 5, "twenty five" -> 25,
/// "twenty-five" -> 25, "12" -> 12.
///
/// Parts split on whitespace/hyphens are summed, so compounds like
/// "twenty five" resolve naturally; unrecognized parts are skipped. Returns
/// None when nothing numeric was found at all.
pub fn word_to_number(text: &str) -> Option<u32> {
    let cleaned = normalize(text);
    if cleaned.is_empty() {
        return None;
    }
    if let Some(v) = word_value(&cleaned) {
        return Some(v);
    }

    let mut total: u32 = 0;
    let mut any_found = false;
    for part in cleaned.split(|c: char| c.is_whitespace() || c == '-') {
        if part.is_empty() {
            continue;
        }
        if let Some(v) = word_value(part) {
            total = total.saturating_add(v);
            any_found = true;
        } else if let Ok(v) = part.parse::<u32>() {
            total = total.saturating_add(v);
            any_found = true;
        }
    }
    any_found.then_some(total)
}

/// Extract a minute count from free text.
///
/// Tries, in order: bare digits anywhere ("in 5 minutes" -> 5), a worded
/// number followed by a minutes unit ("in twenty five minutes" -> 25), and
/// an add/extend/plus verb followed by a worded number ("add ten" -> 10).
pub fn extract_minutes(text: &str) -> Option<u32> {
    let cleaned = normalize(text);
    if cleaned.is_empty() {
        return None;
    }

    if let Some(caps) = ANY_DIGITS.captures(&cleaned) {
        if let Ok(v) = caps[1].parse::<u32>() {
            return Some(v);
        }
    }

    if let Some(caps) = WORDED_MINUTES.captures(&cleaned) {
        if let Some(v) = word_to_number(&caps[1]) {
            return Some(v);
        }
    }

    if let Some(caps) = VERBED_NUMBER.captures(&cleaned) {
        if let Some(v) = word_to_number(&caps[1]) {
            return Some(v);
        }
    }

    None
}
