//! Guardrail store: budget windows and dedupe locks behind one lock.
//!
//! Every check starts with an opportunistic cleanup pass; there is no
//! background task. State is per process: separate instances enforce
//! independent limits.

use crate::budget::{BudgetLedger, BudgetWindow, PendingWindow, WindowKey};
use crate::clock::{Clock, SystemClock};
use crate::dedupe::{DedupeKey, DedupeLedger};
use crate::expiry::ExpiryIndex;
use crate::{GuardError, STALE_WINDOW_MS};
use ko_core::policy::GuardrailConfig;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One guarded request: which budget it draws on and how it is fingerprinted.
#[derive(Debug, Clone, Copy)]
pub struct GuardRequest<'a> {
    pub user_id: &'a str,
    pub action: &'a str,
    pub char_cost: u64,
    pub fingerprint: &'a str,
    pub config: &'a GuardrailConfig,
    pub dedupe_ms: u64,
}

/// What an admitted request committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub window: BudgetWindow,
    pub lock_expires_at_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub windows_removed: usize,
    pub locks_removed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GuardStats {
    pub windows: usize,
    pub locks: usize,
}

#[derive(Debug, Default)]
struct GuardState {
    windows: BudgetLedger,
    locks: DedupeLedger,
    window_expiry: ExpiryIndex<WindowKey>,
    lock_expiry: ExpiryIndex<DedupeKey>,
}

impl GuardState {
    fn sweep(&mut self, now_ms: u64) -> CleanupStats {
        let mut stats = CleanupStats::default();

        for key in self.window_expiry.drain_due(now_ms) {
            let stale = self
                .windows
                .get(&key)
                .is_some_and(|w| now_ms.saturating_sub(w.window_start_ms) > STALE_WINDOW_MS);
            if stale {
                self.windows.remove(&key);
                stats.windows_removed += 1;
            }
        }

        for key in self.lock_expiry.drain_due(now_ms) {
            let expired = self.locks.expiry(&key).is_some_and(|expires_at| expires_at <= now_ms);
            if expired {
                self.locks.remove(&key);
                stats.locks_removed += 1;
            }
        }

        stats
    }

    fn commit_window(&mut self, key: WindowKey, pending: PendingWindow) {
        if pending.opens_window {
            let deadline = pending
                .window
                .window_start_ms
                .saturating_add(STALE_WINDOW_MS)
                .saturating_add(1);
            self.window_expiry.schedule(deadline, key.clone());
        }
        self.windows.commit(key, pending);
    }

    fn clear(&mut self) {
        self.windows.clear();
        self.locks.clear();
        self.window_expiry.clear();
        self.lock_expiry.clear();
    }

    fn commit_lock(&mut self, key: DedupeKey, expires_at_ms: u64) {
        self.lock_expiry.schedule(expires_at_ms, key.clone());
        self.locks.lock(key, expires_at_ms);
    }
}

/// Process-local guardrail state. Construct one per server and share it as
/// `Arc<GuardrailStore>`.
pub struct GuardrailStore {
    clock: Arc<dyn Clock>,
    state: Mutex<GuardState>,
}

impl std::fmt::Debug for GuardrailStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailStore").finish_non_exhaustive()
    }
}

impl GuardrailStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(GuardState::default()),
        }
    }

    /// Store driven by wall-clock time.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// The clock this store reads, for collaborators that must agree with it.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, GuardState>, GuardError> {
        self.state.lock().map_err(|_| GuardError::StatePoisoned)
    }

    fn sweep_locked(state: &mut GuardState, now_ms: u64) {
        let stats = state.sweep(now_ms);
        if stats != CleanupStats::default() {
            debug!(
                windows_removed = stats.windows_removed,
                locks_removed = stats.locks_removed,
                "guardrail cleanup"
            );
        }
    }

    /// Check the budget for `(user_id, action)` and consume it on success.
    /// Rejections leave the window untouched.
    pub fn check_and_consume(
        &self,
        user_id: &str,
        action: &str,
        char_cost: u64,
        config: &GuardrailConfig,
    ) -> Result<BudgetWindow, GuardError> {
        let now = self.clock.now_ms();
        let mut state = self.lock_state()?;
        Self::sweep_locked(&mut state, now);

        let key = WindowKey::new(user_id, action);
        let pending = state
            .windows
            .evaluate(&key, char_cost, config, now)
            .inspect_err(|e| log_rejection(user_id, action, e))?;
        state.commit_window(key, pending);

        debug!(
            user_id,
            action,
            request_count = pending.window.request_count,
            char_count = pending.window.char_count,
            "guardrail budget consumed"
        );
        Ok(pending.window)
    }

    /// Reject a repeat of `(user_id, action, fingerprint)` while its cooldown
    /// is active; otherwise (re)start the cooldown.
    pub fn check_and_lock(
        &self,
        user_id: &str,
        action: &str,
        fingerprint: &str,
        dedupe_ms: u64,
    ) -> Result<(), GuardError> {
        let now = self.clock.now_ms();
        let mut state = self.lock_state()?;
        Self::sweep_locked(&mut state, now);

        let key = DedupeKey::new(user_id, action, fingerprint);
        state
            .locks
            .evaluate(&key, now)
            .inspect_err(|e| log_rejection(user_id, action, e))?;
        state.commit_lock(key, now.saturating_add(dedupe_ms));
        Ok(())
    }

    /// Full guardrail check for an AI-backed action: dedupe first, then
    /// budget. Both are committed together or not at all.
    pub fn admit(&self, req: &GuardRequest<'_>) -> Result<Admission, GuardError> {
        let now = self.clock.now_ms();
        let mut state = self.lock_state()?;
        Self::sweep_locked(&mut state, now);

        let lock_key = DedupeKey::new(req.user_id, req.action, req.fingerprint);
        let window_key = WindowKey::new(req.user_id, req.action);

        let checked = state.locks.evaluate(&lock_key, now).and_then(|()| {
            state
                .windows
                .evaluate(&window_key, req.char_cost, req.config, now)
        });
        let pending = checked.inspect_err(|e| log_rejection(req.user_id, req.action, e))?;

        let lock_expires_at_ms = now.saturating_add(req.dedupe_ms);
        state.commit_lock(lock_key, lock_expires_at_ms);
        state.commit_window(window_key, pending);

        debug!(
            user_id = req.user_id,
            action = req.action,
            request_count = pending.window.request_count,
            char_count = pending.window.char_count,
            lock_expires_at_ms,
            "guardrail admitted"
        );
        Ok(Admission {
            window: pending.window,
            lock_expires_at_ms,
        })
    }

    /// Run the staleness cleanup now.
    pub fn cleanup(&self) -> Result<CleanupStats, GuardError> {
        let now = self.clock.now_ms();
        let mut state = self.lock_state()?;
        Ok(state.sweep(now))
    }

    /// Drop every window and lock.
    pub fn reset(&self) -> Result<(), GuardError> {
        let mut state = self.lock_state()?;
        state.clear();
        info!("guardrail store reset");
        Ok(())
    }

    /// The stored window for `(user_id, action)`, as last committed.
    pub fn window(&self, user_id: &str, action: &str) -> Result<Option<BudgetWindow>, GuardError> {
        let state = self.lock_state()?;
        Ok(state.windows.get(&WindowKey::new(user_id, action)).copied())
    }

    pub fn lock_expiry(
        &self,
        user_id: &str,
        action: &str,
        fingerprint: &str,
    ) -> Result<Option<u64>, GuardError> {
        let state = self.lock_state()?;
        Ok(state.locks.expiry(&DedupeKey::new(user_id, action, fingerprint)))
    }

    pub fn stats(&self) -> Result<GuardStats, GuardError> {
        let state = self.lock_state()?;
        Ok(GuardStats {
            windows: state.windows.len(),
            locks: state.locks.len(),
        })
    }
}

fn log_rejection(user_id: &str, action: &str, err: &GuardError) {
    warn!(
        user_id,
        action,
        kind = ?err.kind(),
        retry_after_ms = ?err.retry_after_ms(),
        "guardrail rejected request"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
