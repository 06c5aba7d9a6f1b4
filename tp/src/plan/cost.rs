//! Price text normalization
//!
//! Maps free-form cost text from the generator onto one of three canonical
//! forms: `"free"`, `"$N"`, or `"$A–$B"` with an en-dash separator.

use std::sync::LazyLock;

use regex::Regex;

/// Separator used in canonical ranges (U+2013)
pub const RANGE_SEPARATOR: char = '–';

static FREE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bfree\b").expect("valid regex"));
static ZERO_AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\$?\s*0+$").expect("valid regex"));
static SYMBOLIC_TIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\$+)\+?$").expect("valid regex"));
static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{1,6}").expect("valid regex"));

/// Fixed ranges for `$` .. `$$$$+` price tiers
const TIER_RANGES: [(u64, u64); 4] = [(0, 20), (20, 50), (50, 100), (100, 200)];

/// Normalize raw cost text; `None` means the field should be omitted
pub fn normalize(raw: Option<&str>) -> Option<String> {
    let text = raw?.trim();
    if text.is_empty() {
        return None;
    }

    if FREE_WORD.is_match(text) {
        return Some("free".to_string());
    }

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(caps) = SYMBOLIC_TIER.captures(&compact) {
        let tier = caps[1].len().min(TIER_RANGES.len()) - 1;
        let (low, high) = TIER_RANGES[tier];
        return Some(format_range(low, high));
    }

    let folded = fold_number_punctuation(text);
    if ZERO_AMOUNT.is_match(folded.trim()) {
        return Some("free".to_string());
    }

    let numbers: Vec<u64> = DIGIT_RUN
        .find_iter(&folded)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let low = numbers.iter().copied().min()?;
    let high = numbers.iter().copied().max()?;
    match (low, high) {
        (0, 0) => Some("free".to_string()),
        (low, high) if low == high => Some(format!("${}", low)),
        (low, high) => Some(format_range(low, high)),
    }
}

fn format_range(low: u64, high: u64) -> String {
    format!("${}{}${}", low, RANGE_SEPARATOR, high)
}

/// Drop thousands separators and cents so `1,200.50` reads as one number
fn fold_number_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());

        if c == ',' && prev_digit && next_digit {
            i += 1;
            continue;
        }
        if c == '.' && prev_digit && next_digit {
            i += 1;
            while chars.get(i).is_some_and(|n| n.is_ascii_digit()) {
                i += 1;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }
    out
}
