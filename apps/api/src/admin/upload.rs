//! Project image upload.
//!
//! The console uploads images to blob storage and stores only the returned
//! URL on the project document.

use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::require_admin;
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/admin/upload (multipart, field `file`)
/// Writes the bytes under `uploads/<uuid>-<filename>` and returns the
/// public URL to store on the project.
pub async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_admin(&headers, &state.config)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload.bin").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed reading upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        let key = format!("uploads/{}-{}", Uuid::new_v4(), sanitize_filename(&filename));

        let mut put = state
            .s3
            .put_object()
            .bucket(&state.config.s3_bucket)
            .key(&key)
            .body(ByteStream::from(bytes));
        if let Some(ct) = content_type {
            put = put.content_type(ct);
        }
        put.send().await.map_err(|e| AppError::S3(e.to_string()))?;

        let url = format!(
            "{}/{}/{}",
            state.config.s3_public_url.trim_end_matches('/'),
            state.config.s3_bucket,
            key
        );
        return Ok(Json(json!({ "url": url, "key": key })));
    }

    Err(AppError::Validation("Missing file field".to_string()))
}

/// Keeps object keys URL- and S3-safe.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("logo final (v2).png"), "logo-final--v2-.png");
        assert_eq!(sanitize_filename("plain.webp"), "plain.webp");
    }
}
