//! Extractive answer synthesis.
//!
//! Picks the retrieved passage sharing the most question keywords and
//! returns its first few non-blank lines. Literal substring matching only.

use lazy_static::lazy_static;
use regex::Regex;

pub const NO_CONTEXT_ANSWER: &str = "No relevant context was retrieved.";

const MAX_ANSWER_LINES: usize = 6;
const MIN_KEYWORD_LEN: usize = 3;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").expect("static regex");
}

/// Lower-cased question tokens longer than two characters, first occurrence
/// order, without duplicates.
pub fn extract_keywords(question: &str) -> Vec<String> {
    let lowered = question.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();
    for token in NON_ALNUM.split(&lowered) {
        if token.len() >= MIN_KEYWORD_LEN && !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// Number of keywords present in `chunk`, case-insensitively.
pub fn score_chunk(chunk: &str, keywords: &[String]) -> usize {
    let lowered = chunk.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| lowered.contains(keyword.as_str()))
        .count()
}

pub fn synthesize<S: AsRef<str>>(question: &str, chunks: &[S]) -> String {
    let keywords = extract_keywords(question);

    let mut best: Option<(&str, usize)> = None;
    for chunk in chunks {
        let chunk = chunk.as_ref();
        let score = score_chunk(chunk, &keywords);
        // strictly greater: ties stay with the earlier chunk
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((chunk, score));
        }
    }

    match best {
        Some((chunk, _)) => chunk
            .trim()
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .take(MAX_ANSWER_LINES)
            .collect::<Vec<_>>()
            .join("\n"),
        None => NO_CONTEXT_ANSWER.to_string(),
    }
}
