//! Request and response bodies shared by the HTTP handlers and the tool registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::links::{FileLinks, SessionView, ShareRequest};
use crate::storage::models::{Token, TokenStatus};
use crate::AppState;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub description: Option<String>,
    /// Overrides the configured upload TTL.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRef {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUploadsParams {
    #[serde(default)]
    pub include_expired: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRef {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareFileRequest {
    pub filename: String,
    #[serde(default)]
    pub source_session_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_true")]
    pub short_link: bool,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAndShareRequest {
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_true")]
    pub short_link: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoArgs {}

fn default_true() -> bool {
    true
}

impl From<ShareFileRequest> for ShareRequest {
    fn from(req: ShareFileRequest) -> Self {
        ShareRequest {
            filename: req.filename,
            source_session_id: req.source_session_id,
            session_id: req.session_id,
            short_link: req.short_link,
            ttl: req.ttl_seconds.map(crate::links::ttl_from_secs),
            description: req.description,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TokenIssued {
    pub token_id: String,
    pub upload_url: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenIssued {
    pub fn new(state: &AppState, token: &Token) -> Self {
        Self {
            token_id: token.id.clone(),
            upload_url: state.tokens.upload_url(token),
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenView {
    pub token_id: String,
    pub status: TokenStatus,
    pub filename: Option<String>,
    pub size_bytes: Option<u64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Token> for TokenView {
    fn from(token: Token) -> Self {
        Self {
            token_id: token.id,
            status: token.status,
            filename: token.target_filename,
            size_bytes: token.size_bytes,
            description: token.description,
            created_at: token.created_at,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadReceived {
    pub filename: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct ConsumedUpload {
    pub token_id: String,
    pub filename: String,
    /// Absolute path for the processing step to read from.
    pub path: String,
    pub size_bytes: u64,
}

impl ConsumedUpload {
    pub fn new(state: &AppState, token: &Token) -> Result<Self, crate::links::LinkError> {
        let path = state.tokens.upload_path(token)?;
        Ok(Self {
            token_id: token.id.clone(),
            filename: token.target_filename.clone().unwrap_or_default(),
            path: path.to_string_lossy().into_owned(),
            size_bytes: token.size_bytes.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedUpload {
    pub token_id: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub files: Vec<String>,
    pub short_links: usize,
}

impl From<SessionView> for SessionSummary {
    fn from(view: SessionView) -> Self {
        let session = view.session;
        Self {
            files: session.files.into_iter().map(|f| f.display_name).collect(),
            short_links: session.short_links.len(),
            session_id: session.id,
            description: session.description,
            created_at: session.created_at,
            expires_at: session.expires_at,
            expired: view.expired,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionLinks {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub files: Vec<FileLinks>,
}

impl SessionLinks {
    pub async fn load(state: &AppState, session_id: &str) -> Result<Self, crate::links::LinkError> {
        let session = state.sessions.get_live(session_id).await?;
        let files = state.sessions.get_links(session_id).await?;
        Ok(Self {
            session_id: session.id,
            expires_at: session.expires_at,
            files,
        })
    }
}
