//! Transcript phrase segmentation

use std::sync::LazyLock;

use regex::Regex;

/// Longest phrase emitted, in words
pub const MAX_PHRASE_WORDS: usize = 8;

/// Shortest phrase a conjunction may close, in words
pub const MIN_PHRASE_WORDS: usize = 2;

/// Words that end a phrase when a long segment is scanned
const SPLIT_WORDS: &[&str] = &[
    "and", "but", "or", "so", "because", "then", "when", "while", "if", "although", "that",
    "which", "where", "after", "before", "since", "for", "with", "from", "into", "about", "like",
    "just",
];

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?,;:\-–—]+").expect("valid regex"));

fn is_split_word(word: &str) -> bool {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
    SPLIT_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

/// Split a transcript into phrases of roughly 2 to 8 words
///
/// Sentence punctuation always separates phrases. A segment longer than
/// [`MAX_PHRASE_WORDS`] is cut after conjunctions and prepositions, or
/// forcibly at the maximum length. A one-word tail is folded into the
/// phrase before it when that stays within the maximum.
#[must_use]
pub fn split_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();

    for segment in PUNCTUATION.split(text) {
        let words: Vec<&str> = segment.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if words.len() <= MAX_PHRASE_WORDS {
            phrases.push(words.join(" "));
            continue;
        }

        let mut segment_phrases: Vec<Vec<&str>> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for word in words {
            current.push(word);
            if (is_split_word(word) && current.len() >= MIN_PHRASE_WORDS)
                || current.len() >= MAX_PHRASE_WORDS
            {
                segment_phrases.push(std::mem::take(&mut current));
            }
        }

        if !current.is_empty() {
            match segment_phrases.last_mut() {
                Some(last)
                    if current.len() < MIN_PHRASE_WORDS
                        && last.len() + current.len() <= MAX_PHRASE_WORDS =>
                {
                    last.append(&mut current);
                }
                _ => segment_phrases.push(current),
            }
        }

        phrases.extend(segment_phrases.into_iter().map(|p| p.join(" ")));
    }

    phrases
}
