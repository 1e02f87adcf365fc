use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ToolRegistry, TypedTool};
use crate::api::models::{
    ConsumedUpload, CreateAndShareRequest, CreateSessionRequest, CreateTokenRequest, DeletedUpload,
    ListUploadsParams, NoArgs, SessionCreated, SessionLinks, SessionRef, SessionSummary,
    ShareFileRequest, TokenIssued, TokenRef, TokenView,
};
use crate::links::{ttl_from_secs, LinkError, ShareOutcome, ShareRequest};
use crate::sweeper::{self, SweepStats};
use crate::AppState;

pub(super) fn register_all(registry: &mut ToolRegistry) {
    registry.register(CreateUploadLink);
    registry.register(CheckUpload);
    registry.register(ProcessUpload);
    registry.register(ListUploads);
    registry.register(DeleteUpload);
    registry.register(CreateSession);
    registry.register(ShareFile);
    registry.register(CreateAndShare);
    registry.register(ListSessions);
    registry.register(GetSessionLinks);
    registry.register(CleanupSessions);
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn token_schema() -> Value {
    object_schema(
        json!({ "token": { "type": "string", "description": "Upload token id" } }),
        &["token"],
    )
}

// ============================================================================
// Upload tokens
// ============================================================================

pub struct CreateUploadLink;

#[async_trait]
impl TypedTool for CreateUploadLink {
    type Input = CreateTokenRequest;
    type Output = TokenIssued;

    const NAME: &'static str = "create_upload_link";
    const DESCRIPTION: &'static str = "Issue a single-use upload link.";

    fn input_schema() -> Value {
        object_schema(
            json!({
                "description": { "type": "string" },
                "ttl_seconds": { "type": "integer", "minimum": 1 },
            }),
            &[],
        )
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        let ttl = input
            .ttl_seconds
            .map(ttl_from_secs)
            .unwrap_or_else(|| state.upload_ttl());
        let token = state.tokens.issue(ttl, input.description).await?;
        Ok(TokenIssued::new(state, &token))
    }
}

pub struct CheckUpload;

#[async_trait]
impl TypedTool for CheckUpload {
    type Input = TokenRef;
    type Output = TokenView;

    const NAME: &'static str = "check_upload";
    const DESCRIPTION: &'static str = "Report the current status of an upload link.";

    fn input_schema() -> Value {
        token_schema()
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        Ok(state.tokens.inspect(&input.token).await?.into())
    }
}

pub struct ProcessUpload;

#[async_trait]
impl TypedTool for ProcessUpload {
    type Input = TokenRef;
    type Output = ConsumedUpload;

    const NAME: &'static str = "process_upload";
    const DESCRIPTION: &'static str =
        "Claim an uploaded file for processing. Succeeds once per upload.";

    fn input_schema() -> Value {
        token_schema()
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        let token = state.tokens.consume(&input.token).await?;
        ConsumedUpload::new(state, &token)
    }
}

pub struct ListUploads;

#[async_trait]
impl TypedTool for ListUploads {
    type Input = ListUploadsParams;
    type Output = Vec<TokenView>;

    const NAME: &'static str = "list_uploads";
    const DESCRIPTION: &'static str = "List upload links, newest first.";

    fn input_schema() -> Value {
        object_schema(json!({ "include_expired": { "type": "boolean" } }), &[])
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        let tokens = state.tokens.list(input.include_expired).await;
        Ok(tokens.into_iter().map(TokenView::from).collect())
    }
}

pub struct DeleteUpload;

#[async_trait]
impl TypedTool for DeleteUpload {
    type Input = TokenRef;
    type Output = DeletedUpload;

    const NAME: &'static str = "delete_upload";
    const DESCRIPTION: &'static str = "Delete an upload link and its file.";

    fn input_schema() -> Value {
        token_schema()
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        let token = state.tokens.delete(&input.token).await?;
        Ok(DeletedUpload {
            token_id: token.id,
            deleted: true,
        })
    }
}

// ============================================================================
// Sessions
// ============================================================================

pub struct CreateSession;

#[async_trait]
impl TypedTool for CreateSession {
    type Input = CreateSessionRequest;
    type Output = SessionCreated;

    const NAME: &'static str = "create_session";
    const DESCRIPTION: &'static str = "Create an empty download session.";

    fn input_schema() -> Value {
        object_schema(
            json!({
                "description": { "type": "string" },
                "ttl_seconds": { "type": "integer", "minimum": 1 },
            }),
            &[],
        )
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        let ttl = input
            .ttl_seconds
            .map(ttl_from_secs)
            .unwrap_or_else(|| state.session_ttl());
        let session = state.sessions.create(ttl, input.description).await?;
        Ok(SessionCreated {
            session_id: session.id,
            expires_at: session.expires_at,
        })
    }
}

pub struct ShareFile;

#[async_trait]
impl TypedTool for ShareFile {
    type Input = ShareFileRequest;
    type Output = ShareOutcome;

    const NAME: &'static str = "share_file";
    const DESCRIPTION: &'static str =
        "Publish a stored file through a download session, optionally with a short link.";

    fn input_schema() -> Value {
        object_schema(
            json!({
                "filename": { "type": "string" },
                "source_session_id": { "type": "string" },
                "session_id": { "type": "string" },
                "short_link": { "type": "boolean", "default": true },
                "ttl_seconds": { "type": "integer", "minimum": 1 },
                "description": { "type": "string" },
            }),
            &["filename"],
        )
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        state.sessions.share(input.into()).await
    }
}

pub struct CreateAndShare;

#[async_trait]
impl TypedTool for CreateAndShare {
    type Input = CreateAndShareRequest;
    type Output = ShareOutcome;

    const NAME: &'static str = "create_and_share";
    const DESCRIPTION: &'static str = "Write text content to a file and publish it.";

    fn input_schema() -> Value {
        object_schema(
            json!({
                "filename": { "type": "string" },
                "content": { "type": "string" },
                "session_id": { "type": "string" },
                "short_link": { "type": "boolean", "default": true },
                "description": { "type": "string" },
            }),
            &["filename", "content"],
        )
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        let req = ShareRequest {
            session_id: input.session_id,
            short_link: input.short_link,
            description: input.description,
            ..Default::default()
        };
        state
            .sessions
            .share_content(&input.filename, input.content.as_bytes(), req)
            .await
    }
}

pub struct ListSessions;

#[async_trait]
impl TypedTool for ListSessions {
    type Input = NoArgs;
    type Output = Vec<SessionSummary>;

    const NAME: &'static str = "list_sessions";
    const DESCRIPTION: &'static str = "List download sessions, newest first.";

    fn input_schema() -> Value {
        object_schema(json!({}), &[])
    }

    async fn run(&self, state: &AppState, _input: Self::Input) -> Result<Self::Output, LinkError> {
        let sessions = state.sessions.list().await;
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }
}

pub struct GetSessionLinks;

#[async_trait]
impl TypedTool for GetSessionLinks {
    type Input = SessionRef;
    type Output = SessionLinks;

    const NAME: &'static str = "get_session_links";
    const DESCRIPTION: &'static str = "Download and short links for every file in a session.";

    fn input_schema() -> Value {
        object_schema(json!({ "session_id": { "type": "string" } }), &["session_id"])
    }

    async fn run(&self, state: &AppState, input: Self::Input) -> Result<Self::Output, LinkError> {
        SessionLinks::load(state, &input.session_id).await
    }
}

pub struct CleanupSessions;

#[async_trait]
impl TypedTool for CleanupSessions {
    type Input = NoArgs;
    type Output = SweepStats;

    const NAME: &'static str = "cleanup_sessions";
    const DESCRIPTION: &'static str = "Remove expired upload links and sessions now.";

    fn input_schema() -> Value {
        object_schema(json!({}), &[])
    }

    async fn run(&self, state: &AppState, _input: Self::Input) -> Result<Self::Output, LinkError> {
        sweeper::sweep(state).await
    }
}
