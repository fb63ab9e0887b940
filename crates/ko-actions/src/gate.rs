//! Action gate: runs AI-backed handlers only after the guardrails admit
//! them.
//!
//! Order per request: input validation, cache (search only), dedupe, budget,
//! then the external call. A rejected request never reaches the backend.

use crate::cache::{SemanticCache, DEFAULT_TTL_MS};
use crate::search::normalize_query;
use crate::ActionError;
use ko_core::mode::WorkspaceMode;
use ko_core::note::SearchRow;
use ko_core::policy::{GuardedAction, GuardrailSettings};
use ko_guard::{Admission, GuardRequest, GuardrailStore};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Who is asking, and from which workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub mode: WorkspaceMode,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, mode: WorkspaceMode) -> Self {
        Self {
            user_id: user_id.into(),
            mode,
        }
    }
}

pub struct ActionGate {
    store: Arc<GuardrailStore>,
    settings: GuardrailSettings,
    cache: SemanticCache,
}

impl ActionGate {
    pub fn new(store: Arc<GuardrailStore>, settings: GuardrailSettings) -> Self {
        let cache = SemanticCache::new(store.clock(), DEFAULT_TTL_MS);
        Self {
            store,
            settings,
            cache,
        }
    }

    pub fn store(&self) -> &GuardrailStore {
        &self.store
    }

    pub fn settings(&self) -> &GuardrailSettings {
        &self.settings
    }

    pub fn cache(&self) -> &SemanticCache {
        &self.cache
    }

    fn admit(
        &self,
        caller: &Caller,
        action: GuardedAction,
        char_cost: u64,
        fingerprint: &str,
    ) -> Result<Admission, ActionError> {
        let policy = self.settings.policy(action);
        let req = GuardRequest {
            user_id: &caller.user_id,
            action: action.as_str(),
            char_cost,
            fingerprint,
            config: policy.config_for(caller.mode),
            dedupe_ms: policy.dedupe_ms,
        };
        Ok(self.store.admit(&req)?)
    }

    /// Enrich a note. `run` receives the trimmed content and performs the
    /// summarization/embedding calls and the write-back.
    pub async fn enrich<F, Fut, T>(
        &self,
        caller: &Caller,
        note_id: &str,
        content: &str,
        run: F,
    ) -> Result<T, ActionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let content = content.trim();
        if content.is_empty() {
            return Err(ActionError::EmptyContent);
        }

        let char_cost = content.chars().count() as u64;
        self.admit(caller, GuardedAction::EnrichNote, char_cost, note_id)?;

        run(content.to_string()).await.map_err(|e| {
            warn!(user_id = %caller.user_id, note_id, error = %e, "enrichment backend failed");
            ActionError::Backend(e)
        })
    }

    /// Semantic search. `run` receives the trimmed query and returns the
    /// nearest-neighbour rows.
    pub async fn semantic_search<F, Fut>(
        &self,
        caller: &Caller,
        query: &str,
        run: F,
    ) -> Result<Vec<SearchRow>, ActionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<SearchRow>>>,
    {
        let Some(q) = normalize_query(query) else {
            return Ok(Vec::new());
        };

        if let Some(rows) = self.cache.get(&caller.user_id, q)? {
            debug!(user_id = %caller.user_id, rows = rows.len(), "semantic cache hit");
            return Ok(rows);
        }

        let fingerprint = q.to_lowercase();
        let char_cost = q.chars().count() as u64;
        self.admit(caller, GuardedAction::SemanticSearch, char_cost, &fingerprint)?;

        let rows = run(q.to_string()).await.map_err(|e| {
            warn!(user_id = %caller.user_id, error = %e, "semantic search backend failed");
            ActionError::Backend(e)
        })?;

        self.cache.put(&caller.user_id, q, rows.clone())?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
