//! Budget Window Tracker: fixed-window request and character budgets.
//!
//! Windows reset hard at boundaries: a stale window's counts are discarded,
//! never carried over or prorated.

use crate::GuardError;
use ko_core::policy::GuardrailConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Budget consumed by one `(user, action)` pair in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetWindow {
    pub window_start_ms: u64,
    pub request_count: u32,
    pub char_count: u64,
}

impl BudgetWindow {
    fn fresh(now_ms: u64) -> Self {
        Self {
            window_start_ms: now_ms,
            request_count: 0,
            char_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    pub user_id: String,
    pub action: String,
}

impl WindowKey {
    pub fn new(user_id: &str, action: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            action: action.to_string(),
        }
    }
}

/// A window the ledger would store if the request is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWindow {
    pub window: BudgetWindow,
    /// True when the request opens a new window (none stored, or the stored
    /// one has expired).
    pub opens_window: bool,
}

/// All budget windows, keyed by `(user, action)`.
#[derive(Debug, Default)]
pub struct BudgetLedger {
    windows: HashMap<WindowKey, BudgetWindow>,
}

impl BudgetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a request fits the budget, without touching state.
    pub fn evaluate(
        &self,
        key: &WindowKey,
        char_cost: u64,
        config: &GuardrailConfig,
        now_ms: u64,
    ) -> Result<PendingWindow, GuardError> {
        // 1. Per-request cap, independent of any window.
        if char_cost > config.max_chars_per_request {
            return Err(GuardError::RequestTooLarge {
                action: key.action.clone(),
                char_cost,
                max_chars: config.max_chars_per_request,
            });
        }

        // 2. Current window, or a fresh one if absent/expired.
        let (current, opens_window) = match self.windows.get(key) {
            Some(w) if now_ms.saturating_sub(w.window_start_ms) < config.window_ms => (*w, false),
            _ => (BudgetWindow::fresh(now_ms), true),
        };

        let retry_after_ms = current
            .window_start_ms
            .saturating_add(config.window_ms)
            .saturating_sub(now_ms);

        // 3. Request count.
        if current.request_count.saturating_add(1) > config.max_requests {
            return Err(GuardError::RateLimited {
                action: key.action.clone(),
                retry_after_ms,
            });
        }

        // 4. Character budget.
        if current.char_count.saturating_add(char_cost) > config.max_chars_per_window {
            return Err(GuardError::BudgetExceeded {
                action: key.action.clone(),
                retry_after_ms,
            });
        }

        Ok(PendingWindow {
            window: BudgetWindow {
                window_start_ms: current.window_start_ms,
                request_count: current.request_count.saturating_add(1),
                char_count: current.char_count.saturating_add(char_cost),
            },
            opens_window,
        })
    }

    /// Store an evaluated window.
    pub fn commit(&mut self, key: WindowKey, pending: PendingWindow) {
        self.windows.insert(key, pending.window);
    }

    pub fn get(&self, key: &WindowKey) -> Option<&BudgetWindow> {
        self.windows.get(key)
    }

    pub fn remove(&mut self, key: &WindowKey) -> Option<BudgetWindow> {
        self.windows.remove(key)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}
