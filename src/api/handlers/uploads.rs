use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use super::{error_page, escape_html, link_error};
use crate::api::models::{
    ConsumedUpload, CreateTokenRequest, DeletedUpload, ListUploadsParams, TokenIssued, TokenView,
    UploadReceived,
};
use crate::api::response::{ApiError, AppQuery, JSend, OptionalJson};
use crate::links::{ttl_from_secs, LinkError};
use crate::storage::{sanitize_filename, PartialFile, StorageLayout};
use crate::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

const UPLOAD_TEMPLATE: &str = include_str!("../templates/upload.html");

// ============================================================================
// Upload page
// ============================================================================

/// Route: GET /upload/:token
pub async fn upload_page(State(state): State<Arc<AppState>>, Path(token): Path<String>) -> Response {
    match state.tokens.check_upload_slot(&token).await {
        Ok(token) => {
            let description = token
                .description
                .as_deref()
                .map(escape_html)
                .unwrap_or_else(|| "Choose a file to send.".to_string());
            // User text goes in last so placeholders inside it stay literal.
            let page = UPLOAD_TEMPLATE
                .replace("{{expires_at}}", &token.expires_at.to_rfc3339())
                .replace(
                    "{{max_mb}}",
                    &format!("{:.1}", state.config.max_upload_bytes as f64 / (1024.0 * 1024.0)),
                )
                .replace("{{description}}", &description);
            Html(page).into_response()
        }
        Err(e) => {
            let err = link_error(e);
            let title = match err.status() {
                StatusCode::NOT_FOUND => "Link not found",
                StatusCode::GONE => "Link expired",
                StatusCode::CONFLICT => "Link already used",
                _ => "Something went wrong",
            };
            error_page(err, title)
        }
    }
}

// ============================================================================
// Upload
// ============================================================================

/// Route: POST /upload/:token
///
/// Streams the `file` field to disk and records it against the token only once
/// the bytes are synced and in place.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<JSend<UploadReceived>>, ApiError> {
    let limit = state.config.max_upload_bytes;

    if let Some(declared) = content_length(&headers) {
        if declared > limit.saturating_add(MULTIPART_OVERHEAD) {
            return Err(link_error(LinkError::PayloadTooLarge { limit }));
        }
    }

    // Fail fast before reading the body; record_upload re-checks atomically.
    state
        .tokens
        .check_upload_slot(&token)
        .await
        .map_err(link_error)?;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let display_name = sanitize_filename(&raw_name)
            .ok_or_else(|| link_error(LinkError::InvalidName(raw_name.clone())))?;
        let stored_name = format!("{}_{}", uuid::Uuid::new_v4().simple(), display_name);
        let target = state
            .layout
            .resolve(&StorageLayout::upload_key(&stored_name))
            .map_err(|e| link_error(e.into()))?;

        let mut partial = PartialFile::create(target.clone())
            .await
            .map_err(|e| link_error(e.into()))?;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if partial.written() + chunk.len() as u64 > limit {
                tracing::debug!(token_id = %token, limit, "Upload exceeded size limit");
                return Err(link_error(LinkError::PayloadTooLarge { limit }));
            }
            partial.write(&chunk).await.map_err(|e| link_error(e.into()))?;
        }

        let size = partial.commit().await.map_err(|e| link_error(e.into()))?;

        return match state.tokens.record_upload(&token, &stored_name, size).await {
            Ok(_) => Ok(JSend::success(UploadReceived {
                filename: display_name,
                size_bytes: size,
            })),
            Err(e) => {
                // Lost the race (or the token expired mid-upload); the file is ours to drop.
                if let Err(rm) = tokio::fs::remove_file(&target).await {
                    tracing::warn!(path = %target.display(), error = %rm, "Failed to remove rejected upload");
                }
                Err(link_error(e))
            }
        };
    }

    Err(ApiError::bad_request("file field is required"))
}

// ============================================================================
// Token API
// ============================================================================

/// Route: POST /api/create_token
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    OptionalJson(req): OptionalJson<CreateTokenRequest>,
) -> Result<Json<JSend<TokenIssued>>, ApiError> {
    if req.ttl_seconds == Some(0) {
        return Err(ApiError::bad_request("ttl_seconds must be greater than 0"));
    }

    let ttl = req
        .ttl_seconds
        .map(ttl_from_secs)
        .unwrap_or_else(|| state.upload_ttl());
    let token = state
        .tokens
        .issue(ttl, req.description)
        .await
        .map_err(link_error)?;

    Ok(JSend::success(TokenIssued::new(&state, &token)))
}

/// Route: GET|POST /api/check/:token
pub async fn check_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<JSend<TokenView>>, ApiError> {
    let token = state.tokens.inspect(&token).await.map_err(link_error)?;
    Ok(JSend::success(token.into()))
}

/// Route: POST /api/consume/:token
pub async fn consume_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<JSend<ConsumedUpload>>, ApiError> {
    let token = state.tokens.consume(&token).await.map_err(link_error)?;
    let consumed = ConsumedUpload::new(&state, &token).map_err(link_error)?;
    Ok(JSend::success(consumed))
}

/// Route: GET /api/uploads
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListUploadsParams>,
) -> Json<JSend<Vec<TokenView>>> {
    let tokens = state.tokens.list(params.include_expired).await;
    JSend::success(tokens.into_iter().map(TokenView::from).collect())
}

/// Route: DELETE /api/uploads/:token
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<JSend<DeletedUpload>>, ApiError> {
    let token = state.tokens.delete(&token).await.map_err(link_error)?;
    Ok(JSend::success(DeletedUpload {
        token_id: token.id,
        deleted: true,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}
