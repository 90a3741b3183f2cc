//! Text tokenization for search indices
//!
//! Text is lower-cased, NFC-normalized and stripped of quote characters, then
//! split into maximal runs of letters or of digits. Tokens keep their first
//! occurrence order, duplicates are dropped and at most [`MAX_TOKEN_COUNT`]
//! tokens are kept.
//!
//! ```text
//! "Don't stop 2 believin'"  ->  ["dont", "stop", "2", "believin"]
//! "abc123"                  ->  ["abc", "123"]
//! ```

use unicode_normalization::UnicodeNormalization;

/// Upper bound on the tokens taken from one value.
pub const MAX_TOKEN_COUNT: usize = 20;

const QUOTES: [char; 4] = ['\'', '"', '`', '´'];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Class {
    Letter,
    Number,
    Other,
}

fn classify(c: char) -> Class {
    if c.is_numeric() {
        Class::Number
    } else if c.is_alphabetic() {
        Class::Letter
    } else {
        Class::Other
    }
}

/// Tokenize `value` keeping at most [`MAX_TOKEN_COUNT`] tokens.
pub fn tokenize(value: &str) -> Vec<String> {
    tokenize_with_limit(value, MAX_TOKEN_COUNT)
}

/// Tokenize `value` keeping at most `limit` tokens.
pub fn tokenize_with_limit(value: &str, limit: usize) -> Vec<String> {
    let normalized: String = value
        .to_lowercase()
        .nfc()
        .filter(|c| !QUOTES.contains(c))
        .collect();

    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut class = Class::Other;
    let mut flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() && !tokens.iter().any(|t| t == current) {
            tokens.push(current.clone());
        }
        current.clear();
    };
    for c in normalized.chars() {
        let next = classify(c);
        if next != class {
            flush(&mut current, &mut tokens);
            class = next;
        }
        if next != Class::Other {
            current.push(c);
        }
    }
    flush(&mut current, &mut tokens);
    tokens.truncate(limit);
    tokens
}

/// Smallest token (by UTF-8 bytes) that starts with `prefix`.
pub fn first_completion<'t>(prefix: &str, tokens: &'t [String]) -> Option<&'t str> {
    tokens
        .iter()
        .filter(|token| token.starts_with(prefix))
        .map(String::as_str)
        .min_by(|a, b| a.as_bytes().cmp(b.as_bytes()))
}
