//! Search helpers: query normalization, the local term-matching fallback,
//! and the "why did this match" snippet shown next to semantic results.

use crate::truncate_chars;
use ko_core::note::{Note, SearchRow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Queries shorter than this (after trimming) are not worth a model call.
pub const MIN_QUERY_CHARS: usize = 2;

const SNIPPET_BEFORE: usize = 52;
const SNIPPET_AFTER: usize = 110;
const FALLBACK_SNIPPET_CHARS: usize = 170;
const NO_SNIPPET: &str = "Semantic similarity match.";

/// Trimmed query, or `None` when it is too short to search.
pub fn normalize_query(query: &str) -> Option<&str> {
    let q = query.trim();
    (q.chars().count() >= MIN_QUERY_CHARS).then_some(q)
}

/// Notes whose title, summary or content contain `query`, ignoring case.
/// An empty query matches everything.
pub fn local_matches<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return notes.iter().collect();
    }

    notes
        .iter()
        .filter(|n| {
            let hay = format!(
                "{} {} {}",
                n.title.as_deref().unwrap_or_default(),
                n.summary.as_deref().unwrap_or_default(),
                n.content
            )
            .to_lowercase();
            hay.contains(&q)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Title,
    Summary,
    Content,
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchExplanation {
    pub similarity: f64,
    pub snippet: String,
    pub matched_in: MatchSource,
}

pub fn clamp_similarity(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Unique lowercase query terms longer than one character, in query order.
fn query_terms(query: &str) -> Vec<Vec<char>> {
    let mut seen = HashSet::new();
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .filter(|t| seen.insert(t.to_string()))
        .map(|t| t.chars().collect())
        .collect()
}

/// Case-insensitive search for `term` in `text`, returning the matched
/// span as character offsets into `text`.
fn find_term(text: &[char], term: &[char]) -> Option<(usize, usize)> {
    // Lowercasing can expand a character, so keep a map back to the source.
    let mut lowered = Vec::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    for (i, ch) in text.iter().enumerate() {
        for lc in ch.to_lowercase() {
            lowered.push(lc);
            origin.push(i);
        }
    }

    if term.is_empty() || term.len() > lowered.len() {
        return None;
    }
    (0..=lowered.len() - term.len())
        .find(|&i| lowered[i..i + term.len()] == *term)
        .map(|i| (origin[i], origin[i + term.len() - 1] + 1))
}

/// Explain why `row` matched `query`: a snippet around the first query
/// term found in the title, summary or content, in that order.
pub fn explain_match(row: &SearchRow, query: &str) -> MatchExplanation {
    let similarity = clamp_similarity(row.similarity);
    let terms = query_terms(query);

    let sources = [
        (MatchSource::Title, row.title.as_deref().unwrap_or_default()),
        (MatchSource::Summary, row.summary.as_deref().unwrap_or_default()),
        (MatchSource::Content, row.content.as_str()),
    ];

    for (source, text) in sources {
        let chars: Vec<char> = text.chars().collect();
        for term in &terms {
            let Some((start, end)) = find_term(&chars, term) else {
                continue;
            };
            let from = start.saturating_sub(SNIPPET_BEFORE);
            let to = (end + SNIPPET_AFTER).min(chars.len());
            let body: String = chars[from..to].iter().collect();
            let prefix = if from > 0 { "..." } else { "" };
            let suffix = if to < chars.len() { "..." } else { "" };
            return MatchExplanation {
                similarity,
                snippet: format!("{prefix}{}{suffix}", body.trim()),
                matched_in: source,
            };
        }
    }

    let fallback = row.summary.as_deref().unwrap_or(&row.content).trim();
    let snippet = if fallback.is_empty() {
        NO_SNIPPET.to_string()
    } else if fallback.chars().count() > FALLBACK_SNIPPET_CHARS {
        format!("{}...", truncate_chars(fallback, FALLBACK_SNIPPET_CHARS))
    } else {
        fallback.to_string()
    };

    MatchExplanation {
        similarity,
        snippet,
        matched_in: MatchSource::Semantic,
    }
}
