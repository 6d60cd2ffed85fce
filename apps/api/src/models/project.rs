use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;
use crate::timestamp;

use super::{opt_string_field, string_field, string_list};

/// A portfolio project as served to callers. Internal-only store fields are
/// dropped during coercion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    /// First element is treated as the cover image.
    pub images: Vec<String>,
    pub github_url: Option<String>,
    pub live_demo_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn from_document(doc: &Document) -> Self {
        let data = &doc.data;

        // Older documents stored a single `media` URL instead of `images`.
        let images = match data.get("images") {
            Some(v) => string_list(Some(v)),
            None => string_list(data.get("media")),
        };

        Self {
            id: doc.id.clone(),
            title: string_field(data, "title"),
            description: string_field(data, "description"),
            tech_stack: string_list(data.get("techStack")),
            images,
            github_url: opt_string_field(data, "githubUrl"),
            live_demo_url: opt_string_field(data, "liveDemoUrl"),
            is_published: data
                .get("isPublished")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            created_at: timestamp::normalize_or_epoch(data.get("createdAt")),
            updated_at: timestamp::normalize_or_epoch(data.get("updatedAt")),
        }
    }
}
