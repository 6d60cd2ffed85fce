//! Testimonial endpoints: public listing and public submission.
//! Deletion goes through the generic admin collection endpoint.

use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::testimonial::{coerce_rating, Testimonial};
use crate::models::SOURCE_PORTFOLIO;
use crate::state::AppState;
use crate::store::{Fields, TESTIMONIALS};

/// GET /api/testimonials
/// All testimonials, newest first.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Testimonial>>, AppError> {
    let now = Utc::now();
    let docs = state.store.list(TESTIMONIALS).await?;

    let mut testimonials: Vec<Testimonial> = docs
        .iter()
        .map(|doc| Testimonial::from_document(doc, now))
        .collect();
    testimonials.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

    Ok(Json(testimonials))
}

/// POST /api/testimonials
/// Required: name, role, content, rating. Rating is coerced to an integer;
/// a rating that coerces to zero counts as missing.
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Testimonial>, AppError> {
    let name = non_empty(&body, "name");
    let role = non_empty(&body, "role");
    let content = non_empty(&body, "content");
    let rating = coerce_rating(body.get("rating"));

    let (Some(name), Some(role), Some(content)) = (name, role, content) else {
        return Err(AppError::Validation("Missing required fields".to_string()));
    };
    if rating == 0 {
        return Err(AppError::Validation("Missing required fields".to_string()));
    }

    let now = Utc::now();
    let mut data = Fields::new();
    data.insert("name".to_string(), json!(name));
    data.insert("role".to_string(), json!(role));
    data.insert("content".to_string(), json!(content));
    data.insert("rating".to_string(), json!(rating));
    data.insert(
        "submittedAt".to_string(),
        json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    data.insert("source".to_string(), json!(SOURCE_PORTFOLIO));

    let doc = state.store.add(TESTIMONIALS, data).await?;
    Ok(Json(Testimonial::from_document(&doc, now)))
}

fn non_empty(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
