//! Policy types: guarded actions, per-mode guardrail ceilings, and the
//! settings file that overrides them.

use crate::mode::WorkspaceMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Guarded actions
// ---------------------------------------------------------------------------

/// AI-backed actions that run behind the guardrails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardedAction {
    #[serde(rename = "enrichNote")]
    EnrichNote,
    #[serde(rename = "semanticSearch")]
    SemanticSearch,
}

impl GuardedAction {
    pub const ALL: [GuardedAction; 2] = [GuardedAction::EnrichNote, GuardedAction::SemanticSearch];

    /// Name used in guardrail keys and user-facing messages.
    pub fn as_str(self) -> &'static str {
        match self {
            GuardedAction::EnrichNote => "enrichNote",
            GuardedAction::SemanticSearch => "semanticSearch",
        }
    }
}

impl fmt::Display for GuardedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Guardrail config (one action, one mode)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Length of a fixed budget window (milliseconds).
    pub window_ms: u64,

    /// Requests admitted per window.
    pub max_requests: u32,

    /// Largest character cost a single request may carry.
    pub max_chars_per_request: u64,

    /// Cumulative character cost admitted per window.
    pub max_chars_per_window: u64,
}

// ---------------------------------------------------------------------------
// Action policy (both modes + dedupe cooldown)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    pub user: GuardrailConfig,
    pub demo: GuardrailConfig,

    /// Cooldown before the same fingerprint may be triggered again (milliseconds).
    pub dedupe_ms: u64,
}

impl ActionPolicy {
    pub fn config_for(&self, mode: WorkspaceMode) -> &GuardrailConfig {
        match mode {
            WorkspaceMode::User => &self.user,
            WorkspaceMode::Demo => &self.demo,
        }
    }

    pub fn enrich_note() -> Self {
        Self {
            user: GuardrailConfig {
                window_ms: 60 * 60 * 1000,
                max_requests: 24,
                max_chars_per_request: 20_000,
                max_chars_per_window: 180_000,
            },
            demo: GuardrailConfig {
                window_ms: 60 * 60 * 1000,
                max_requests: 8,
                max_chars_per_request: 8_000,
                max_chars_per_window: 48_000,
            },
            dedupe_ms: 45_000,
        }
    }

    pub fn semantic_search() -> Self {
        Self {
            user: GuardrailConfig {
                window_ms: 10 * 60 * 1000,
                max_requests: 40,
                max_chars_per_request: 500,
                max_chars_per_window: 12_000,
            },
            demo: GuardrailConfig {
                window_ms: 10 * 60 * 1000,
                max_requests: 12,
                max_chars_per_request: 500,
                max_chars_per_window: 4_000,
            },
            dedupe_ms: 4_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings file
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid guardrail settings: {0}")]
    Invalid(String),
}

/// Guardrail policy for every guarded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailSettings {
    pub enrich_note: ActionPolicy,
    pub semantic_search: ActionPolicy,
}

impl Default for GuardrailSettings {
    fn default() -> Self {
        Self {
            enrich_note: ActionPolicy::enrich_note(),
            semantic_search: ActionPolicy::semantic_search(),
        }
    }
}

impl GuardrailSettings {
    pub fn policy(&self, action: GuardedAction) -> &ActionPolicy {
        match action {
            GuardedAction::EnrichNote => &self.enrich_note,
            GuardedAction::SemanticSearch => &self.semantic_search,
        }
    }

    /// Parse settings JSON layered over the defaults. Fields absent from the
    /// document keep their default value.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let patch: serde_json::Value = serde_json::from_str(json)?;
        let mut base = serde_json::to_value(Self::default())?;
        merge_json(&mut base, patch);
        let settings: Self = serde_json::from_value(base)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for action in GuardedAction::ALL {
            let policy = self.policy(action);
            for mode in [WorkspaceMode::User, WorkspaceMode::Demo] {
                if policy.config_for(mode).window_ms == 0 {
                    return Err(SettingsError::Invalid(format!(
                        "{action} ({mode}) window_ms must be greater than zero"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Recursively overlay `patch` onto `base`. Objects merge key by key; any
/// other value replaces the base value.
fn merge_json(base: &mut serde_json::Value, patch: serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_table() {
        let s = GuardrailSettings::default();

        let enrich_user = s.policy(GuardedAction::EnrichNote).config_for(WorkspaceMode::User);
        assert_eq!(enrich_user.window_ms, 3_600_000);
        assert_eq!(enrich_user.max_requests, 24);
        assert_eq!(enrich_user.max_chars_per_request, 20_000);
        assert_eq!(enrich_user.max_chars_per_window, 180_000);

        let enrich_demo = s.policy(GuardedAction::EnrichNote).config_for(WorkspaceMode::Demo);
        assert_eq!(enrich_demo.max_requests, 8);
        assert_eq!(enrich_demo.max_chars_per_request, 8_000);
        assert_eq!(enrich_demo.max_chars_per_window, 48_000);

        let search = s.policy(GuardedAction::SemanticSearch);
        assert_eq!(search.user.window_ms, 600_000);
        assert_eq!(search.user.max_requests, 40);
        assert_eq!(search.demo.max_requests, 12);
        assert_eq!(search.demo.max_chars_per_window, 4_000);
        assert_eq!(search.dedupe_ms, 4_000);
        assert_eq!(s.enrich_note.dedupe_ms, 45_000);
    }

    #[test]
    fn action_names() {
        assert_eq!(GuardedAction::EnrichNote.as_str(), "enrichNote");
        let json = serde_json::to_string(&GuardedAction::SemanticSearch).unwrap();
        assert_eq!(json, "\"semanticSearch\"");
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let s = GuardrailSettings::from_json(
            r#"{"semantic_search": {"demo": {"max_requests": 3}, "dedupe_ms": 1000}}"#,
        )
        .unwrap();

        assert_eq!(s.semantic_search.demo.max_requests, 3);
        assert_eq!(s.semantic_search.demo.max_chars_per_window, 4_000); // untouched
        assert_eq!(s.semantic_search.dedupe_ms, 1000);
        assert_eq!(s.enrich_note, ActionPolicy::enrich_note());
    }

    #[test]
    fn zero_window_rejected() {
        let err = GuardrailSettings::from_json(r#"{"enrich_note": {"user": {"window_ms": 0}}}"#)
            .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"enrich_note": {{"user": {{"max_requests": 2}}}}}}"#).unwrap();

        let s = GuardrailSettings::load(file.path()).unwrap();
        assert_eq!(s.enrich_note.user.max_requests, 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = GuardrailSettings::load(Path::new("/nonexistent/guardrails.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
