//! Activity title canonicalization
//!
//! Produces the dedup key that decides whether two titles name the same
//! real-world activity. Keys are never shown to users.

/// Leading verbs that do not change which place a title refers to.
/// Multi-word entries come first so "go to" wins over a shorter match.
const GENERIC_VERBS: &[&str] = &["go to", "visit", "explore", "walk", "tour", "see", "discover"];

/// Compute the dedup key for a title
///
/// Rules, applied in order: lower-case, strip leading generic verbs
/// (repeatedly), `&` becomes `and`, punctuation removed, whitespace
/// collapsed and trimmed.
pub fn dedup_key(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped = strip_generic_verbs(&lowered);
    let expanded = stripped.replace('&', " and ");
    let cleaned: String = expanded
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_generic_verbs(text: &str) -> &str {
    let mut rest = text;
    'outer: loop {
        for verb in GENERIC_VERBS {
            if let Some(tail) = rest.strip_prefix(verb)
                && tail.starts_with(char::is_whitespace)
            {
                rest = tail.trim_start();
                continue 'outer;
            }
        }
        return rest;
    }
}
