use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state
        .config
        .max_upload_bytes
        .saturating_add(handlers::MULTIPART_OVERHEAD)
        .try_into()
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handlers::health))
        // Upload links
        .route(
            "/upload/:token",
            get(handlers::upload_page)
                .post(handlers::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Token API
        .route("/api/create_token", post(handlers::create_token))
        .route(
            "/api/check/:token",
            get(handlers::check_token).post(handlers::check_token),
        )
        .route("/api/consume/:token", post(handlers::consume_token))
        .route("/api/uploads", get(handlers::list_uploads))
        .route(
            "/api/uploads/:token",
            axum::routing::delete(handlers::delete_upload),
        )
        // Sessions
        .route("/api/share", post(handlers::share))
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/sessions/:session_id/links", get(handlers::session_links))
        .route("/api/cleanup", post(handlers::cleanup))
        // Tools
        .route("/api/tools", get(handlers::list_tools))
        .route("/api/tools/:name", post(handlers::call_tool))
        // Downloads
        .route("/d/:short_key", get(handlers::download_short))
        .route("/:session_id", get(handlers::session_page))
        .route("/:session_id/:filename", get(handlers::download_session_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
