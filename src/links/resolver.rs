use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use super::{is_expired, LinkError};
use crate::storage::models::{Session, SessionFile};
use crate::storage::{StateStore, StorageLayout};

/// An opened session file, ready to stream.
#[derive(Debug)]
pub struct ResolvedFile {
    pub file: tokio::fs::File,
    pub stored_path: PathBuf,
    pub display_name: String,
    pub size: u64,
}

/// Maps short keys and `(session, filename)` pairs to stored files.
pub struct LinkResolver {
    store: Arc<StateStore>,
    layout: StorageLayout,
}

impl LinkResolver {
    pub fn new(store: Arc<StateStore>, layout: StorageLayout) -> Self {
        Self { store, layout }
    }

    pub async fn resolve_short(&self, short_key: &str) -> Result<ResolvedFile, LinkError> {
        let rows = self.store.sessions.read().await;

        let (session, filename) = rows
            .values()
            .find_map(|s| s.short_links.get(short_key).map(|name| (s, name)))
            .ok_or(LinkError::NotFound("Link"))?;

        let file = live_file(session, filename)?;
        // The read guard stays alive until the file is open, so a concurrent
        // cleanup cannot unlink it in between.
        self.open(file).await
    }

    pub async fn resolve_session_file(&self, session_id: &str, filename: &str) -> Result<ResolvedFile, LinkError> {
        let rows = self.store.sessions.read().await;

        let session = rows.get(session_id).ok_or(LinkError::NotFound("Session"))?;
        let file = live_file(session, filename)?;
        self.open(file).await
    }

    async fn open(&self, file: &SessionFile) -> Result<ResolvedFile, LinkError> {
        let path = self.layout.resolve(&file.stored_path)?;
        let handle = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), "Session file missing from storage");
                LinkError::NotFound("File")
            } else {
                LinkError::Io(e)
            }
        })?;
        let size = handle.metadata().await?.len();

        Ok(ResolvedFile {
            file: handle,
            stored_path: path,
            display_name: file.display_name.clone(),
            size,
        })
    }
}

fn live_file<'a>(session: &'a Session, filename: &str) -> Result<&'a SessionFile, LinkError> {
    if is_expired(session, Utc::now()) {
        return Err(LinkError::Expired("Session"));
    }
    session.file(filename).ok_or(LinkError::NotFound("File"))
}
