//! ko-guard: guardrails for AI-backed actions. Fixed-window usage budgets
//! and duplicate-request cooldowns, held in one injectable store.

pub mod budget;
pub mod clock;
pub mod dedupe;
pub mod expiry;
pub mod store;

pub use budget::BudgetWindow;
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{Admission, CleanupStats, GuardRequest, GuardStats, GuardrailStore};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Budget windows untouched for longer than this are purged (24 hours).
pub const STALE_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Input too large for {action}. Max {max_chars} characters.")]
    RequestTooLarge {
        action: String,
        char_cost: u64,
        max_chars: u64,
    },
    #[error("Rate limit reached for {action}. Please wait and retry.")]
    RateLimited { action: String, retry_after_ms: u64 },
    #[error("Usage budget reached for {action}. Please wait and retry.")]
    BudgetExceeded { action: String, retry_after_ms: u64 },
    #[error("Please wait before retrying {action}.")]
    DuplicateInFlight { action: String, retry_after_ms: u64 },
    #[error("guardrail state lock poisoned")]
    StatePoisoned,
}

/// Stable, machine-readable classification of a [`GuardError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardErrorKind {
    RequestTooLarge,
    RateLimited,
    BudgetExceeded,
    DuplicateInFlight,
    StatePoisoned,
}

impl GuardError {
    pub fn kind(&self) -> GuardErrorKind {
        match self {
            GuardError::RequestTooLarge { .. } => GuardErrorKind::RequestTooLarge,
            GuardError::RateLimited { .. } => GuardErrorKind::RateLimited,
            GuardError::BudgetExceeded { .. } => GuardErrorKind::BudgetExceeded,
            GuardError::DuplicateInFlight { .. } => GuardErrorKind::DuplicateInFlight,
            GuardError::StatePoisoned => GuardErrorKind::StatePoisoned,
        }
    }

    /// Milliseconds until an identical request could be admitted. `None`
    /// when waiting cannot help.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GuardError::RateLimited { retry_after_ms, .. }
            | GuardError::BudgetExceeded { retry_after_ms, .. }
            | GuardError::DuplicateInFlight { retry_after_ms, .. } => Some(*retry_after_ms),
            GuardError::RequestTooLarge { .. } | GuardError::StatePoisoned => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_user_facing_text() {
        let err = GuardError::RequestTooLarge {
            action: "semanticSearch".into(),
            char_cost: 900,
            max_chars: 500,
        };
        assert_eq!(err.to_string(), "Input too large for semanticSearch. Max 500 characters.");
        assert_eq!(err.retry_after_ms(), None);

        let err = GuardError::RateLimited {
            action: "enrichNote".into(),
            retry_after_ms: 1200,
        };
        assert_eq!(err.to_string(), "Rate limit reached for enrichNote. Please wait and retry.");
        assert_eq!(err.retry_after_ms(), Some(1200));

        let err = GuardError::BudgetExceeded {
            action: "enrichNote".into(),
            retry_after_ms: 5,
        };
        assert_eq!(err.to_string(), "Usage budget reached for enrichNote. Please wait and retry.");

        let err = GuardError::DuplicateInFlight {
            action: "enrichNote".into(),
            retry_after_ms: 5,
        };
        assert_eq!(err.to_string(), "Please wait before retrying enrichNote.");
        assert_eq!(err.kind(), GuardErrorKind::DuplicateInFlight);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&GuardErrorKind::DuplicateInFlight).unwrap();
        assert_eq!(json, "\"duplicate_in_flight\"");
    }
}
