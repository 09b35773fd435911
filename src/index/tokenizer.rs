use once_cell::sync::Lazy;
use regex::Regex;

// Two or more word characters, same token shape the catalog vectorizer was trained with
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("valid regex"));

/// Splits combined-features text into case-folded term tokens.
///
/// No stop-word removal and no stemming: similarity is driven by raw term
/// frequency, so "nolan" and "nolans" are different terms.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = text.to_lowercase();
    TOKEN_RE
        .find_iter(&folded)
        .map(|m| m.as_str().to_string())
        .collect()
}
