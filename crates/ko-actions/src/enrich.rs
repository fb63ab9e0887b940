//! Enrichment: turn a summarization response into a note update, with
//! fallbacks so a note never ends up without a title or summary, and the
//! snapshot needed to undo it.

use crate::response::{first_json_object, response_text};
use crate::truncate_chars;
use ko_core::note::Note;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_TITLE_CHARS: usize = 60;
pub const MAX_SUMMARY_CHARS: usize = 300;
pub const FALLBACK_SUMMARY_CHARS: usize = 280;
pub const MAX_TAGS: usize = 12;
pub const MAX_EMBEDDING_INPUT_CHARS: usize = 8_000;

/// Title, summary and tags extracted for one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
}

/// Fields to write back to a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    /// Drop the stored embedding (undo restores a pre-enrichment note).
    pub clear_embedding: bool,
}

/// An enrichment ready to persist: the note update plus the text to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedNote {
    pub update: NoteUpdate,
    pub embedding_input: String,
}

/// First sentence or line of `content`, trimmed to the title limit.
pub fn derive_title(content: &str) -> Option<String> {
    let first = content
        .split(['\n', '.', '?', '!'])
        .next()
        .unwrap_or_default()
        .trim();
    let title = truncate_chars(first, MAX_TITLE_CHARS);
    (!title.is_empty()).then_some(title)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field<'a>(obj: Option<&'a serde_json::Map<String, Value>>, name: &str) -> Option<&'a Value> {
    obj.and_then(|o| o.get(name)).filter(|v| !v.is_null())
}

/// Parse a summarization payload for `content`.
pub fn parse_enrichment(payload: &Value, content: &str) -> Enrichment {
    let text = response_text(payload);
    let parsed: Option<Value> = first_json_object(&text).and_then(|s| serde_json::from_str(s).ok());
    let obj = parsed.as_ref().and_then(Value::as_object);

    let title = match field(obj, "title") {
        Some(v) => value_to_string(v),
        None => derive_title(content).unwrap_or_default(),
    };
    let summary = match field(obj, "summary") {
        Some(v) => value_to_string(v),
        None => truncate_chars(&collapse_whitespace(content), FALLBACK_SUMMARY_CHARS),
    };
    let tags = match field(obj, "tags") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| value_to_string(t).to_lowercase().trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_TAGS)
            .collect(),
        _ => Vec::new(),
    };

    Enrichment {
        title: truncate_chars(title.trim(), MAX_TITLE_CHARS),
        summary: truncate_chars(summary.trim(), MAX_SUMMARY_CHARS),
        tags,
    }
}

/// Title to store after enrichment: the model's, else the existing one,
/// else one derived from the content.
pub fn next_title(enrichment: &Enrichment, existing: Option<&str>, content: &str) -> Option<String> {
    let generated = enrichment.title.trim();
    if !generated.is_empty() {
        return Some(truncate_chars(generated, MAX_TITLE_CHARS));
    }
    match existing.map(str::trim) {
        Some(t) if !t.is_empty() => Some(t.to_string()),
        _ => derive_title(content),
    }
}

/// Text sent to the embedding model.
pub fn embedding_input(title: Option<&str>, summary: &str, content: &str) -> String {
    let joined = format!("{}\n\n{}\n\n{}", title.unwrap_or_default(), summary, content);
    truncate_chars(&joined, MAX_EMBEDDING_INPUT_CHARS)
}

/// Comma-separated tag input to stored tag names.
pub fn normalize_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect()
}

/// Combine a note with its enrichment.
pub fn apply_enrichment(note: &Note, enrichment: &Enrichment) -> EnrichedNote {
    let content = note.content.trim();
    let title = next_title(enrichment, note.title.as_deref(), content);
    let embedding_input = embedding_input(title.as_deref(), &enrichment.summary, content);

    EnrichedNote {
        update: NoteUpdate {
            title,
            summary: (!enrichment.summary.is_empty()).then(|| enrichment.summary.clone()),
            tags: enrichment.tags.clone(),
            clear_embedding: false,
        },
        embedding_input,
    }
}

/// Note state captured before enrichment so the user can undo it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentUndo {
    pub note_id: String,
    pub previous_title: Option<String>,
    pub previous_summary: Option<String>,
    #[serde(default)]
    pub previous_tags: Vec<String>,
}

impl EnrichmentUndo {
    pub fn capture(note: &Note) -> Self {
        Self {
            note_id: note.id.clone(),
            previous_title: note.title.clone(),
            previous_summary: note.summary.clone(),
            previous_tags: note.tags.clone(),
        }
    }

    /// The update that puts the note back as it was.
    pub fn restore(&self) -> NoteUpdate {
        fn non_blank(s: &Option<String>) -> Option<String> {
            s.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(String::from)
        }

        NoteUpdate {
            title: non_blank(&self.previous_title),
            summary: non_blank(&self.previous_summary),
            tags: normalize_tags(&self.previous_tags.join(",")),
            clear_embedding: true,
        }
    }
}
