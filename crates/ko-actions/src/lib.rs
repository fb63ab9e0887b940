//! ko-actions: guarded AI actions. Note enrichment and semantic search run
//! behind the guardrails, plus the text handling around them.

pub mod cache;
pub mod enrich;
pub mod gate;
pub mod response;
pub mod search;

pub use gate::{ActionGate, Caller};

use ko_guard::GuardError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error("Note content is empty")]
    EmptyContent,
    #[error("cache error: {0}")]
    Cache(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl ActionError {
    /// Retry hint carried by guardrail rejections.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ActionError::Guard(e) => e.retry_after_ms(),
            _ => None,
        }
    }
}

/// First `max` characters of `s` (Unicode scalar values, not bytes).
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
