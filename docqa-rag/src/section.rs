//! Best-effort detection of section headings in extracted page text.
//!
//! PDF text extraction loses typographic cues, so headings are recognized from
//! the shape of a line alone. The result is an annotation for citations, not
//! a guaranteed-correct field.

use std::sync::LazyLock;

use regex::Regex;

/// Longest heading kept, in characters.
pub const MAX_HEADING_CHARS: usize = 100;

const MAX_HEADING_WORDS: usize = 10;
const MAX_PREFIXED_HEADING_WORDS: usize = 12;

/// `Chapter 3`, `SECTION 2 - Leave`, `Article IV`, `Part B`, `3. Leave`, `4.2 Sick Leave`.
static PREFIXED_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:chapter|section|article|part)\b|\d+(?:\.\d+)*\.\s+\S|\d+(?:\.\d+)+\s+\S)")
        .expect("heading pattern is valid")
});

/// Words that stay lowercase inside a Title Case heading.
const MINOR_WORDS: &[&str] =
    &["a", "an", "and", "as", "at", "by", "for", "in", "of", "on", "or", "the", "to", "with"];

/// Returns the heading text if `line` looks like a section heading.
pub fn detect_heading(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    let words: Vec<&str> = line.split_whitespace().collect();

    if PREFIXED_HEADING.is_match(line) && words.len() <= MAX_PREFIXED_HEADING_WORDS {
        return Some(normalize(&words));
    }

    if words.len() > MAX_HEADING_WORDS || line.ends_with(['.', '!', '?', ':', ';', ',']) {
        return None;
    }
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    if letters < 3 {
        return None;
    }
    if is_all_caps(line) || is_title_case(&words) { Some(normalize(&words)) } else { None }
}

fn normalize(words: &[&str]) -> String {
    words.join(" ").chars().take(MAX_HEADING_CHARS).collect()
}

fn is_all_caps(line: &str) -> bool {
    line.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase)
}

fn is_title_case(words: &[&str]) -> bool {
    let mut saw_capitalized = false;
    for (i, word) in words.iter().enumerate() {
        let Some(first) = word.chars().find(|c| c.is_alphanumeric()) else {
            continue;
        };
        if !first.is_alphabetic() {
            continue;
        }
        if first.is_uppercase() {
            saw_capitalized = true;
        } else if i == 0 || !MINOR_WORDS.contains(&word.to_lowercase().as_str()) {
            return false;
        }
    }
    saw_capitalized
}
