use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;
use std::sync::Arc;

use super::tool_error;
use crate::api::response::{ApiError, JSend};
use crate::tools::ToolDescriptor;
use crate::AppState;

/// Route: GET /api/tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<JSend<Vec<ToolDescriptor>>> {
    JSend::success(state.tools.describe())
}

/// Route: POST /api/tools/:name
///
/// The body is the tool's JSON arguments; an empty body means no arguments.
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<JSend<Value>>, ApiError> {
    if !state.tools.contains(&name) {
        return Err(ApiError::not_found(format!("Unknown tool: {name}")));
    }

    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?
    };

    let output = state
        .tools
        .dispatch(&state, &name, args)
        .await
        .map_err(tool_error)?;

    Ok(JSend::success(output))
}
