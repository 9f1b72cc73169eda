//! Keyword and hashtag extraction shared by every adapter.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+").expect("valid regex"));

/// Words shorter than this are never keywords.
const MIN_KEYWORD_CHARS: usize = 4;

const STOP_WORDS: &[&str] = &[
    // English
    "that", "this", "with", "from", "have", "they", "will", "would", "there", "their",
    "what", "about", "which", "when", "your", "just", "been", "were", "more", "into",
    "than", "then", "them", "these", "some", "very", "only", "also", "here", "over",
    // French
    "dans", "pour", "avec", "sans", "sont", "cette", "mais", "nous", "vous", "elle",
    "leur", "tout", "tous", "plus", "comme", "être", "avoir", "fait", "faire", "aussi",
    "bien", "même", "encore", "très",
];

/// Hashtags in order of appearance, duplicates kept, `#` included.
#[must_use]
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Lower-cased content words in order of appearance.
///
/// Hashtag and mention tokens are skipped, surrounding punctuation is
/// stripped, and short words and stop words are discarded.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|token| !token.starts_with('#') && !token.starts_with('@'))
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// The `limit` most frequent keywords across `texts`, most frequent first.
/// Ties are broken alphabetically so output is deterministic.
#[must_use]
pub fn top_keywords<'a, I>(texts: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in extract_keywords(text) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

/// Most frequent hashtags across `texts`, same ordering rules as
/// [`top_keywords`].
#[must_use]
pub fn top_hashtags<'a, I>(texts: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for tag in extract_hashtags(text) {
            *counts.entry(tag.to_lowercase()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(tag, _)| tag).collect()
}
