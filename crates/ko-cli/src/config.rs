//! Settings file resolution: `--config`, then `$KO_GUARDRAILS_CONFIG`, then
//! the per-user config directory.

use anyhow::Context;
use ko_core::policy::GuardrailSettings;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "KO_GUARDRAILS_CONFIG";

/// A candidate settings file. Explicitly named files must exist; the
/// per-user default is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub required: bool,
}

pub fn resolve(explicit: Option<&Path>, env: Option<OsString>) -> Option<ConfigSource> {
    if let Some(path) = explicit {
        return Some(ConfigSource {
            path: path.to_path_buf(),
            required: true,
        });
    }
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return Some(ConfigSource {
            path: PathBuf::from(path),
            required: true,
        });
    }
    dirs::config_dir().map(|dir| ConfigSource {
        path: dir.join("knowledge-os").join("guardrails.json"),
        required: false,
    })
}

pub fn load_from(source: Option<ConfigSource>) -> anyhow::Result<GuardrailSettings> {
    match source {
        Some(src) if src.required || src.path.exists() => {
            tracing::info!(path = %src.path.display(), "loading guardrail settings");
            GuardrailSettings::load(&src.path)
                .with_context(|| format!("failed to load {}", src.path.display()))
        }
        _ => {
            tracing::debug!("no guardrail settings file, using defaults");
            Ok(GuardrailSettings::default())
        }
    }
}

pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<GuardrailSettings> {
    load_from(resolve(explicit, std::env::var_os(CONFIG_ENV)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_path_wins() {
        let src = resolve(Some(Path::new("/tmp/a.json")), Some("/tmp/b.json".into())).unwrap();
        assert_eq!(src.path, PathBuf::from("/tmp/a.json"));
        assert!(src.required);
    }

    #[test]
    fn env_path_used_when_set() {
        let src = resolve(None, Some("/tmp/b.json".into())).unwrap();
        assert_eq!(src.path, PathBuf::from("/tmp/b.json"));
        assert!(src.required);

        // empty env var is ignored
        if let Some(src) = resolve(None, Some(OsString::new())) {
            assert!(!src.required);
        }
    }

    #[test]
    fn missing_optional_file_uses_defaults() {
        let settings = load_from(Some(ConfigSource {
            path: PathBuf::from("/nonexistent/knowledge-os/guardrails.json"),
            required: false,
        }))
        .unwrap();
        assert_eq!(settings, GuardrailSettings::default());
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = load_from(Some(ConfigSource {
            path: PathBuf::from("/nonexistent/guardrails.json"),
            required: true,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn loads_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"semantic_search": {{"dedupe_ms": 250}}}}"#).unwrap();

        let settings = load_from(Some(ConfigSource {
            path: file.path().to_path_buf(),
            required: true,
        }))
        .unwrap();
        assert_eq!(settings.semantic_search.dedupe_ms, 250);
        assert_eq!(settings.enrich_note.dedupe_ms, 45_000);
    }
}
