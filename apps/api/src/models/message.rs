use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;
use crate::timestamp;

use super::{string_field, SOURCE_PORTFOLIO};

/// An inbound contact-form message. Lives in `contact_messages`
/// (canonical) or the legacy `messages` collection; the `collection`
/// field records which one, so admin deletes can target it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub collection: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    /// `None` renders as "no value" in the console rather than a fake date.
    pub submitted_at: Option<DateTime<Utc>>,
    pub source: String,
}

impl ContactMessage {
    pub fn from_document(doc: &Document, collection: &str) -> Self {
        let data = &doc.data;
        Self {
            id: doc.id.clone(),
            collection: collection.to_string(),
            name: string_field(data, "name"),
            email: string_field(data, "email"),
            phone: string_field(data, "phone"),
            message: string_field(data, "message"),
            submitted_at: data.get("submittedAt").and_then(timestamp::normalize),
            source: data
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or(SOURCE_PORTFOLIO)
                .to_string(),
        }
    }

    /// Sort key for the merged admin listing: `submittedAt`, falling back
    /// to `createdAt`, else epoch (sorts last in the descending view).
    pub fn sort_millis(doc: &Document) -> i64 {
        let primary = timestamp::sort_millis(doc.data.get("submittedAt"));
        if primary != 0 {
            primary
        } else {
            timestamp::sort_millis(doc.data.get("createdAt"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: serde_json::Value) -> Document {
        Document {
            id: id.to_string(),
            data: data.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn absent_submitted_at_stays_none() {
        let m = ContactMessage::from_document(&doc("m1", json!({"name": "Ana"})), "messages");
        assert!(m.submitted_at.is_none());
        assert_eq!(m.collection, "messages");
    }

    #[test]
    fn sort_key_prefers_submitted_at_then_created_at() {
        let with_submitted = doc(
            "a",
            json!({"submittedAt": {"seconds": 200}, "createdAt": {"seconds": 900}}),
        );
        let with_created = doc("b", json!({"createdAt": {"seconds": 100}}));
        let with_neither = doc("c", json!({}));

        assert_eq!(ContactMessage::sort_millis(&with_submitted), 200_000);
        assert_eq!(ContactMessage::sort_millis(&with_created), 100_000);
        assert_eq!(ContactMessage::sort_millis(&with_neither), 0);
    }
}
