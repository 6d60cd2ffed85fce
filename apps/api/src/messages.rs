//! Contact-form intake and the admin message console.
//!
//! Submissions land in `contact_messages`; the admin view also reads the
//! legacy `messages` collection and merges both, tolerating a read failure
//! on either side.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::require_admin;
use crate::errors::AppError;
use crate::models::message::ContactMessage;
use crate::models::SOURCE_PORTFOLIO;
use crate::state::AppState;
use crate::store::{Document, Fields, Store, CONTACT_MESSAGES, LEGACY_MESSAGES};

/// POST /api/contact
/// All four fields required and non-empty.
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ContactMessage>, AppError> {
    let mut data = Fields::new();
    for key in ["name", "email", "phone", "message"] {
        let value = body
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Missing required fields".to_string()))?;
        data.insert(key.to_string(), json!(value));
    }
    data.insert(
        "submittedAt".to_string(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    data.insert("source".to_string(), json!(SOURCE_PORTFOLIO));

    let doc = state.store.add(CONTACT_MESSAGES, data).await?;
    Ok(Json(ContactMessage::from_document(&doc, CONTACT_MESSAGES)))
}

/// GET /api/messages/admin
/// Merged view over the canonical and legacy collections, newest first.
pub async fn admin_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ContactMessage>>, AppError> {
    require_admin(&headers, &state.config)?;
    Ok(Json(fetch_merged(&state.store).await))
}

/// Reads both message collections, skipping one that fails to load so the
/// admin still sees the other. Shared with the live sync controller.
pub(crate) async fn fetch_merged(store: &Store) -> Vec<ContactMessage> {
    let mut tagged: Vec<(&str, Document)> = Vec::new();
    for collection in [CONTACT_MESSAGES, LEGACY_MESSAGES] {
        match store.list(collection).await {
            Ok(docs) => tagged.extend(docs.into_iter().map(|d| (collection, d))),
            Err(e) => tracing::warn!("Failed reading {collection}: {e}"),
        }
    }

    tagged.sort_by_key(|(_, doc)| std::cmp::Reverse(ContactMessage::sort_millis(doc)));
    tagged
        .iter()
        .map(|(collection, doc)| ContactMessage::from_document(doc, collection))
        .collect()
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
    /// Which collection to target; defaults to the legacy one.
    #[serde(rename = "type")]
    pub message_type: Option<String>,
}

/// DELETE /api/messages/admin?id=&type=
pub async fn admin_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("Missing id".to_string()))?;

    let collection = match query.message_type.as_deref() {
        None => LEGACY_MESSAGES,
        Some(LEGACY_MESSAGES) => LEGACY_MESSAGES,
        Some(CONTACT_MESSAGES) => CONTACT_MESSAGES,
        Some(other) => {
            return Err(AppError::Validation(format!(
                "Unknown message type '{other}'"
            )))
        }
    };

    state.store.delete(collection, &id).await?;
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use crate::testutil::{admin_headers, test_state};
    use std::sync::Arc;

    fn state() -> AppState {
        test_state(Store::new(Arc::new(MemoryBackend::new())))
    }

    #[tokio::test]
    async fn contact_happy_path_echoes_id_and_source() {
        let state = state();
        let Json(m) = submit_contact(
            State(state),
            Json(json!({
                "name": "Ana",
                "email": "a@x.com",
                "phone": "123",
                "message": "Hi",
            })),
        )
        .await
        .unwrap();

        assert!(!m.id.is_empty());
        assert_eq!(m.source, "portfolio_website");
        assert!(m.submitted_at.is_some());
    }

    #[tokio::test]
    async fn contact_with_missing_phone_is_400() {
        let state = state();
        let err = submit_contact(
            State(state),
            Json(json!({"name": "Ana", "email": "a@x.com", "message": "Hi"})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Missing required fields"));
    }

    #[tokio::test]
    async fn admin_list_merges_both_collections_newest_first() {
        let state = state();
        let mut old = Fields::new();
        old.insert("name".to_string(), json!("Legacy"));
        old.insert("submittedAt".to_string(), json!("2022-01-01T00:00:00Z"));
        state.store.add(LEGACY_MESSAGES, old).await.unwrap();

        let mut new = Fields::new();
        new.insert("name".to_string(), json!("Current"));
        new.insert("submittedAt".to_string(), json!("2024-01-01T00:00:00Z"));
        state.store.add(CONTACT_MESSAGES, new).await.unwrap();

        let Json(messages) = admin_list(State(state), admin_headers()).await.unwrap();
        let names: Vec<&str> = messages.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Current", "Legacy"]);
        assert_eq!(messages[0].collection, CONTACT_MESSAGES);
        assert_eq!(messages[1].collection, LEGACY_MESSAGES);
    }

    #[tokio::test]
    async fn delete_targets_collection_from_type_param() {
        let state = state();
        let mut data = Fields::new();
        data.insert("name".to_string(), json!("To delete"));
        let doc = state.store.add(CONTACT_MESSAGES, data).await.unwrap();

        admin_delete(
            State(state.clone()),
            admin_headers(),
            Query(DeleteQuery {
                id: Some(doc.id.clone()),
                message_type: Some(CONTACT_MESSAGES.to_string()),
            }),
        )
        .await
        .unwrap();

        assert!(state
            .store
            .get(CONTACT_MESSAGES, &doc.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_without_id_is_400() {
        let state = state();
        let err = admin_delete(
            State(state),
            admin_headers(),
            Query(DeleteQuery {
                id: None,
                message_type: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Missing id"));
    }

    #[tokio::test]
    async fn admin_list_requires_token() {
        let state = state();
        let err = admin_list(State(state), HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
