mod admin;
mod downloads;
mod sessions;
mod tools;
mod uploads;

use axum::response::{Html, IntoResponse, Response};

use crate::api::response::ApiError;
use crate::links::LinkError;
use crate::tools::ToolError;

pub use admin::{cleanup, health};
pub use downloads::{download_session_file, download_short};
pub use sessions::{list_sessions, session_links, session_page, share};
pub use tools::{call_tool, list_tools};
pub use uploads::MULTIPART_OVERHEAD;
pub use uploads::{
    check_token, consume_token, create_token, delete_upload, list_uploads, upload_file, upload_page,
};

const ERROR_TEMPLATE: &str = include_str!("../templates/error.html");

/// Map a LinkError to an ApiError
fn link_error(e: LinkError) -> ApiError {
    let message = e.to_string();
    match e {
        LinkError::NotFound(_) => ApiError::not_found(message),
        LinkError::Expired(_) => ApiError::gone(message),
        LinkError::AlreadyUploaded
        | LinkError::AlreadyConsumed
        | LinkError::NotConsumable
        | LinkError::DuplicateFile(_) => ApiError::conflict(message),
        LinkError::PayloadTooLarge { .. } => ApiError::payload_too_large(message),
        LinkError::InvalidName(_) | LinkError::InvalidPath(_) => ApiError::bad_request(message),
        LinkError::IdentifierCollision { .. }
        | LinkError::Entropy
        | LinkError::Store(_)
        | LinkError::Io(_) => {
            tracing::error!(error = %message, "Request failed");
            ApiError::internal(message)
        }
    }
}

fn tool_error(e: ToolError) -> ApiError {
    match e {
        ToolError::UnknownTool(_) => ApiError::not_found(e.to_string()),
        ToolError::InvalidArguments { .. } => ApiError::bad_request(e.to_string()),
        ToolError::Link(e) => link_error(e),
        ToolError::Serialization(_) => {
            tracing::error!(error = %e, "Tool output could not be encoded");
            ApiError::internal(e.to_string())
        }
    }
}

/// Render `err` as an HTML page for browser-facing routes.
fn error_page(err: ApiError, title: &str) -> Response {
    let page = ERROR_TEMPLATE
        .replace("{{title}}", title)
        .replace("{{message}}", &escape_html(err.message()));
    (err.status(), Html(page)).into_response()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
