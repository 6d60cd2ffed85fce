use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Document;
use crate::timestamp;

use super::{string_field, SOURCE_PORTFOLIO};

/// A client testimonial. Created by the public form or by an admin,
/// deleted by an admin, never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: String,
    pub name: String,
    pub role: String,
    pub content: String,
    pub rating: i64,
    pub submitted_at: DateTime<Utc>,
    pub source: String,
}

impl Testimonial {
    /// `now` substitutes for an absent/unparseable `submittedAt`.
    pub fn from_document(doc: &Document, now: DateTime<Utc>) -> Self {
        let data = &doc.data;
        Self {
            id: doc.id.clone(),
            name: string_field(data, "name"),
            role: string_field(data, "role"),
            content: string_field(data, "content"),
            rating: coerce_rating(data.get("rating")),
            submitted_at: data
                .get("submittedAt")
                .and_then(timestamp::normalize)
                .unwrap_or(now),
            source: data
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or(SOURCE_PORTFOLIO)
                .to_string(),
        }
    }
}

/// Ratings arrive as numbers or numeric strings; anything else is 0.
pub fn coerce_rating(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(data: serde_json::Value) -> Document {
        Document {
            id: "t1".to_string(),
            data: data.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn rating_coerces_from_number_and_string() {
        assert_eq!(coerce_rating(Some(&json!(4))), 4);
        assert_eq!(coerce_rating(Some(&json!("5"))), 5);
        assert_eq!(coerce_rating(Some(&json!(4.9))), 4);
        assert_eq!(coerce_rating(Some(&json!("not a number"))), 0);
        assert_eq!(coerce_rating(None), 0);
    }

    #[test]
    fn source_defaults_to_portfolio_literal() {
        let now = Utc::now();
        let t = Testimonial::from_document(&doc(json!({"name": "Ana"})), now);
        assert_eq!(t.source, SOURCE_PORTFOLIO);
        assert_eq!(t.submitted_at, now);
    }

    #[test]
    fn stored_submitted_at_wins_over_now() {
        let now = Utc::now();
        let t = Testimonial::from_document(
            &doc(json!({"submittedAt": "2024-01-15T09:00:00Z"})),
            now,
        );
        assert_eq!(t.submitted_at.timestamp(), 1705309200);
    }
}
