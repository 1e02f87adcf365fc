use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::link_error;
use crate::api::response::ApiError;
use crate::links::ResolvedFile;
use crate::AppState;

/// Characters left unescaped in an RFC 5987 `filename*` value (attr-char).
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Route: GET /d/:short_key
pub async fn download_short(
    State(state): State<Arc<AppState>>,
    Path(short_key): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .resolver
        .resolve_short(&short_key)
        .await
        .map_err(link_error)?;

    tracing::debug!(short_key = %short_key, filename = %file.display_name, "Serving short link");
    Ok(stream_file(file))
}

/// Route: GET /:session_id/:filename
pub async fn download_session_file(
    State(state): State<Arc<AppState>>,
    Path((session_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let file = state
        .resolver
        .resolve_session_file(&session_id, &filename)
        .await
        .map_err(link_error)?;

    tracing::debug!(session_id = %session_id, filename = %file.display_name, "Serving session file");
    Ok(stream_file(file))
}

fn stream_file(file: ResolvedFile) -> Response {
    let mime = mime_guess::from_path(&file.display_name).first_or_octet_stream();
    let disposition = content_disposition(&file.display_name);
    let body = Body::from_stream(ReaderStream::new(file.file));

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime.as_ref()
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.size));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    // Links are ephemeral; nothing downstream should keep a copy.
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    response
}

/// `attachment` with an ASCII fallback name plus the exact UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = utf8_percent_encode(filename, ATTR_CHAR);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_names_pass_through() {
        assert_eq!(
            content_disposition("report-2024.pdf"),
            "attachment; filename=\"report-2024.pdf\"; filename*=UTF-8''report-2024.pdf"
        );
    }

    #[test]
    fn unicode_names_are_encoded() {
        let value = content_disposition("résumé.txt");
        assert!(value.starts_with("attachment; filename=\"r_sum_.txt\""));
        assert!(value.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9.txt"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }
}
