use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use super::{error_page, escape_html, link_error};
use crate::api::models::{SessionLinks, SessionSummary, ShareFileRequest};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::links::{FileLinks, ShareOutcome};
use crate::AppState;

const SESSION_TEMPLATE: &str = include_str!("../templates/session.html");

/// Route: POST /api/share
pub async fn share(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ShareFileRequest>,
) -> Result<Json<JSend<ShareOutcome>>, ApiError> {
    if req.filename.trim().is_empty() {
        return Err(ApiError::bad_request("filename must not be empty"));
    }
    if req.ttl_seconds == Some(0) {
        return Err(ApiError::bad_request("ttl_seconds must be greater than 0"));
    }

    let outcome = state.sessions.share(req.into()).await.map_err(link_error)?;
    Ok(JSend::success(outcome))
}

/// Route: GET /api/sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<JSend<Vec<SessionSummary>>> {
    let sessions = state.sessions.list().await;
    JSend::success(sessions.into_iter().map(SessionSummary::from).collect())
}

/// Route: GET /api/sessions/:id/links
pub async fn session_links(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<JSend<SessionLinks>>, ApiError> {
    let links = SessionLinks::load(&state, &session_id)
        .await
        .map_err(link_error)?;
    Ok(JSend::success(links))
}

/// Route: GET /:session_id
///
/// Browsable listing of a session's files for whoever holds the session URL.
pub async fn session_page(State(state): State<Arc<AppState>>, Path(session_id): Path<String>) -> Response {
    match SessionLinks::load(&state, &session_id).await {
        Ok(links) => {
            let files = if links.files.is_empty() {
                "<li class=\"muted\">No files yet.</li>".to_string()
            } else {
                links.files.iter().map(file_item).collect::<Vec<_>>().join("\n")
            };
            let page = SESSION_TEMPLATE
                .replace("{{expires_at}}", &links.expires_at.to_rfc3339())
                .replace("{{files}}", &files);
            Html(page).into_response()
        }
        Err(e) => {
            let err = link_error(e);
            let title = match err.status() {
                StatusCode::NOT_FOUND => "Session not found",
                StatusCode::GONE => "Session expired",
                _ => "Something went wrong",
            };
            error_page(err, title)
        }
    }
}

fn file_item(file: &FileLinks) -> String {
    let name = escape_html(&file.display_name);
    let mut item = format!(
        "<li><a href=\"{}\">{}</a>",
        escape_html(&file.download_url),
        name
    );
    if let Some(short) = &file.short_url {
        let short = escape_html(short);
        item.push_str(&format!(" <span class=\"muted\">(<a href=\"{short}\">{short}</a>)</span>"));
    }
    item.push_str("</li>");
    item
}
