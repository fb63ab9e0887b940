//! Note and search-result shapes shared by the action crates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,

    /// Tag names attached to the note (already normalized).
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One row returned by the nearest-neighbour match over stored embeddings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRow {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub collection_id: Option<String>,
    pub updated_at: String,
    pub similarity: f64,
}
