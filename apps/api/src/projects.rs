//! Portfolio project endpoints.
//!
//! The public read path filters out unpublished projects and never exposes
//! the store's native timestamp representations; the admin write path is
//! token-gated and does partial updates — only fields present in the
//! payload are written.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::require_admin;
use crate::errors::AppError;
use crate::models::project::Project;
use crate::state::AppState;
use crate::store::{Fields, PROJECTS};

const NO_STORE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";

/// GET /api/projects
/// Published projects only, newest first.
pub async fn list_public(
    State(state): State<AppState>,
) -> Result<([(header::HeaderName, &'static str); 1], Json<Vec<Project>>), AppError> {
    let docs = state.store.list(PROJECTS).await?;

    let mut projects: Vec<Project> = docs
        .iter()
        .map(Project::from_document)
        .filter(|p| p.is_published)
        .collect();
    // Stable sort: ties keep the store's id order.
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(([(header::CACHE_CONTROL, NO_STORE)], Json(projects)))
}

/// GET /api/projects/:id
pub async fn get_public(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<([(header::HeaderName, &'static str); 1], Json<Project>), AppError> {
    let doc = state
        .store
        .get(PROJECTS, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(Project::from_document(&doc)),
    ))
}

/// Fields an admin may write on a project. Anything else in the payload
/// is ignored.
const WRITABLE_FIELDS: &[&str] = &[
    "title",
    "description",
    "techStack",
    "images",
    "githubUrl",
    "liveDemoUrl",
    "isPublished",
];

/// POST /api/projects/admin
/// Creates a project with defaulted fields; `createdAt` may be supplied
/// (e.g. when backfilling an old portfolio entry).
pub async fn admin_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let defaults = [
        ("title", json!("")),
        ("description", json!("")),
        ("techStack", json!([])),
        ("images", json!([])),
        ("githubUrl", json!("")),
        ("liveDemoUrl", json!("")),
        ("isPublished", json!(true)),
    ];

    let mut data = Fields::new();
    for (key, default) in defaults {
        data.insert(key.to_string(), body.get(key).cloned().unwrap_or(default));
    }
    for key in ["createdAt", "updatedAt"] {
        if let Some(v) = body.get(key) {
            data.insert(key.to_string(), v.clone());
        }
    }

    let doc = state.store.add(PROJECTS, data).await?;
    Ok(Json(json!({ "id": doc.id })))
}

/// PUT /api/projects/admin
/// Partial update: only fields present in the payload are overwritten.
pub async fn admin_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("Missing id".to_string()))?
        .to_string();

    let mut data = Fields::new();
    for key in WRITABLE_FIELDS {
        if let Some(v) = body.get(*key) {
            data.insert(key.to_string(), v.clone());
        }
    }

    state.store.update(PROJECTS, &id, data).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

/// DELETE /api/projects/admin?id=
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

    state.store.delete(PROJECTS, &id).await?;
    Ok(Json(json!({ "ok": true })))
}
