use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::ids::{self, Entropy, MAX_ID_ATTEMPTS};
use super::{is_expired, LinkError, PublicUrls};
use crate::storage::models::{Session, SessionFile};
use crate::storage::{sanitize_filename, PartialFile, StateStore, StorageLayout};

/// A session as listed, with expiry evaluated at listing time.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: Session,
    pub expired: bool,
}

/// Public links for one file in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileLinks {
    pub display_name: String,
    pub download_url: String,
    pub short_url: Option<String>,
}

/// Publish an existing file through a (new or existing) session.
#[derive(Debug, Clone, Default)]
pub struct ShareRequest {
    pub filename: String,
    /// Look the source up in this session instead of `uploads/` and `shared/`.
    pub source_session_id: Option<String>,
    /// Append to this session instead of creating one.
    pub session_id: Option<String>,
    pub short_link: bool,
    pub ttl: Option<Duration>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareOutcome {
    pub session_id: String,
    pub filename: String,
    pub download_url: String,
    pub short_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Creates share sessions, attaches files to them and mints short links.
pub struct SessionManager {
    store: Arc<StateStore>,
    layout: StorageLayout,
    urls: PublicUrls,
    entropy: Arc<dyn Entropy>,
    default_ttl: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<StateStore>,
        layout: StorageLayout,
        urls: PublicUrls,
        entropy: Arc<dyn Entropy>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            store,
            layout,
            urls,
            entropy,
            default_ttl,
        }
    }

    /// Create an empty session that expires after `ttl`.
    pub async fn create(&self, ttl: Duration, description: Option<String>) -> Result<Session, LinkError> {
        let entropy = Arc::clone(&self.entropy);
        let session = self
            .store
            .sessions
            .mutate(|rows| {
                let id = ids::generate_unique(
                    MAX_ID_ATTEMPTS,
                    || ids::session_id(entropy.as_ref()),
                    |candidate| rows.contains_key(candidate),
                )?;
                let now = Utc::now();
                let session = Session {
                    id: id.clone(),
                    created_at: now,
                    expires_at: now + ttl,
                    description,
                    files: Vec::new(),
                    short_links: Default::default(),
                };
                rows.insert(id, session.clone());
                Ok::<_, LinkError>(session)
            })
            .await?;

        if let Err(e) = self.create_session_dir(&session.id).await {
            if let Err(rollback) = self.store.sessions.delete(&session.id).await {
                tracing::error!(session_id = %session.id, error = %rollback, "Failed to drop session without directory");
            }
            return Err(e);
        }

        tracing::debug!(session_id = %session.id, expires_at = %session.expires_at, "Created session");
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<Session, LinkError> {
        self.store
            .sessions
            .get(session_id)
            .await
            .ok_or(LinkError::NotFound("Session"))
    }

    /// Like [`get`](Self::get), rejecting expired sessions.
    pub async fn get_live(&self, session_id: &str) -> Result<Session, LinkError> {
        let session = self.get(session_id).await?;
        if is_expired(&session, Utc::now()) {
            return Err(LinkError::Expired("Session"));
        }
        Ok(session)
    }

    /// Append an already-stored file to a session.
    ///
    /// `stored_path` is relative to the storage root. The display name is
    /// sanitized and must be unique within the session.
    pub async fn add_file(
        &self,
        session_id: &str,
        stored_path: &str,
        display_name: &str,
    ) -> Result<SessionFile, LinkError> {
        let display_name = sanitize_filename(display_name)
            .ok_or_else(|| LinkError::InvalidName(display_name.to_string()))?;
        self.layout.resolve(stored_path)?;

        let file = self
            .store
            .sessions
            .mutate(|rows| {
                let session = rows.get_mut(session_id).ok_or(LinkError::NotFound("Session"))?;
                if is_expired(&*session, Utc::now()) {
                    return Err(LinkError::Expired("Session"));
                }
                if session.file(&display_name).is_some() {
                    return Err(LinkError::DuplicateFile(display_name));
                }

                let file = SessionFile {
                    stored_path: stored_path.to_string(),
                    display_name,
                };
                session.files.push(file.clone());
                Ok(file)
            })
            .await?;

        tracing::debug!(session_id = %session_id, filename = %file.display_name, "Added file to session");
        Ok(file)
    }

    /// Copy `source` into the session directory and append it.
    pub async fn attach_file(
        &self,
        session_id: &str,
        source: &Path,
        display_name: &str,
    ) -> Result<SessionFile, LinkError> {
        self.get_live(session_id).await?;

        let blob = uuid::Uuid::new_v4().simple().to_string();
        let key = StorageLayout::session_key(session_id, &blob);
        let dest = self.layout.resolve(&key)?;

        self.create_session_dir(session_id).await?;
        tokio::fs::copy(source, &dest).await?;

        match self.add_file(session_id, &key, display_name).await {
            Ok(file) => Ok(file),
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&dest).await {
                    tracing::warn!(path = %dest.display(), error = %rm, "Failed to remove orphaned copy");
                }
                Err(e)
            }
        }
    }

    /// Mint a short key for `filename` in `session_id`.
    ///
    /// Keys are unique across all sessions and never equal a session id.
    pub async fn create_short_link(&self, session_id: &str, filename: &str) -> Result<String, LinkError> {
        let entropy = Arc::clone(&self.entropy);
        let key = self
            .store
            .sessions
            .mutate(|rows| {
                let session = rows.get(session_id).ok_or(LinkError::NotFound("Session"))?;
                if is_expired(session, Utc::now()) {
                    return Err(LinkError::Expired("Session"));
                }
                if session.file(filename).is_none() {
                    return Err(LinkError::NotFound("File"));
                }

                let key = ids::generate_unique(
                    MAX_ID_ATTEMPTS,
                    || ids::short_key(entropy.as_ref()),
                    |candidate| {
                        rows.contains_key(candidate)
                            || rows.values().any(|s| s.short_links.contains_key(candidate))
                    },
                )?;

                let session = rows.get_mut(session_id).ok_or(LinkError::NotFound("Session"))?;
                session.short_links.insert(key.clone(), filename.to_string());
                Ok(key)
            })
            .await?;

        tracing::debug!(session_id = %session_id, short_key = %key, "Created short link");
        Ok(key)
    }

    /// Every session, newest first.
    pub async fn list(&self) -> Vec<SessionView> {
        let now = Utc::now();
        let mut views: Vec<SessionView> = self
            .store
            .sessions
            .all()
            .await
            .into_iter()
            .map(|session| SessionView {
                expired: is_expired(&session, now),
                session,
            })
            .collect();
        views.sort_by(|a, b| b.session.created_at.cmp(&a.session.created_at));
        views
    }

    /// Download links for every file in a live session, in insertion order.
    pub async fn get_links(&self, session_id: &str) -> Result<Vec<FileLinks>, LinkError> {
        let session = self.get_live(session_id).await?;
        Ok(session
            .files
            .iter()
            .map(|file| FileLinks {
                display_name: file.display_name.clone(),
                download_url: self.urls.download(&session.id, &file.display_name),
                short_url: session
                    .short_key_for(&file.display_name)
                    .map(|key| self.urls.short(key)),
            })
            .collect())
    }

    /// Publish a file that already exists in storage.
    pub async fn share(&self, req: ShareRequest) -> Result<ShareOutcome, LinkError> {
        let name = sanitize_filename(&req.filename)
            .ok_or_else(|| LinkError::InvalidName(req.filename.clone()))?;
        let source = self.find_source(&name, req.source_session_id.as_deref()).await?;
        self.publish(&source, &name, req).await
    }

    /// Write `content` into `shared/` and publish it under `filename`.
    ///
    /// Every call writes its own `<uuid>_<name>` file, so concurrent calls
    /// with the same name never touch each other's bytes.
    pub async fn share_content(
        &self,
        filename: &str,
        content: &[u8],
        req: ShareRequest,
    ) -> Result<ShareOutcome, LinkError> {
        let name = sanitize_filename(filename)
            .ok_or_else(|| LinkError::InvalidName(filename.to_string()))?;

        let stored_name = format!("{}_{}", uuid::Uuid::new_v4().simple(), name);
        let source = self.layout.shared_dir().join(&stored_name);
        let mut partial = PartialFile::create(source.clone()).await?;
        partial.write(content).await?;
        partial.commit().await?;

        let outcome = self.publish(&source, &name, req).await;
        if outcome.is_err() {
            if let Err(rm) = tokio::fs::remove_file(&source).await {
                tracing::warn!(path = %source.display(), error = %rm, "Failed to remove unshared content");
            }
        }
        outcome
    }

    async fn publish(&self, source: &Path, name: &str, req: ShareRequest) -> Result<ShareOutcome, LinkError> {
        let session = match req.session_id.as_deref() {
            Some(id) => self.get_live(id).await?,
            None => {
                self.create(req.ttl.unwrap_or(self.default_ttl), req.description)
                    .await?
            }
        };

        let file = self.attach_file(&session.id, source, name).await?;
        let short_url = if req.short_link {
            let key = self.create_short_link(&session.id, &file.display_name).await?;
            Some(self.urls.short(&key))
        } else {
            None
        };

        tracing::info!(session_id = %session.id, filename = %file.display_name, "Shared file");

        Ok(ShareOutcome {
            download_url: self.urls.download(&session.id, &file.display_name),
            session_id: session.id,
            filename: file.display_name,
            short_url,
            expires_at: session.expires_at,
        })
    }

    /// Remove every session that expired before `now`, with its short links
    /// and files.
    ///
    /// Rows are dropped under the table write lock first; files are unlinked
    /// only after that, so a resolver sees either the whole session or nothing.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize, LinkError> {
        let removed = self
            .store
            .sessions
            .mutate(|rows| {
                let expired: Vec<String> = rows
                    .values()
                    .filter(|s| is_expired(*s, now))
                    .map(|s| s.id.clone())
                    .collect();
                Ok::<_, LinkError>(
                    expired
                        .iter()
                        .filter_map(|id| rows.remove(id))
                        .collect::<Vec<_>>(),
                )
            })
            .await?;

        for session in &removed {
            self.remove_session_files(session).await;
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Removed expired sessions");
        }
        Ok(removed.len())
    }

    async fn create_session_dir(&self, session_id: &str) -> Result<(), LinkError> {
        tokio::fs::create_dir_all(self.layout.session_dir(session_id)?).await?;
        Ok(())
    }

    async fn find_source(&self, name: &str, source_session_id: Option<&str>) -> Result<PathBuf, LinkError> {
        if let Some(source_id) = source_session_id {
            let session = self.get_live(source_id).await?;
            let file = session.file(name).ok_or(LinkError::NotFound("Source file"))?;
            let path = self.layout.resolve(&file.stored_path)?;
            return if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                Ok(path)
            } else {
                Err(LinkError::NotFound("Source file"))
            };
        }

        for dir in [self.layout.uploads_dir(), self.layout.shared_dir()] {
            let candidate = dir.join(name);
            if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
                return Ok(candidate);
            }
        }
        Err(LinkError::NotFound("Source file"))
    }

    async fn remove_session_files(&self, session: &Session) {
        for file in &session.files {
            match self.layout.resolve(&file.stored_path) {
                Ok(path) => {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            tracing::warn!(session_id = %session.id, path = %path.display(), error = %e, "Failed to remove session file");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "Skipping invalid stored path");
                }
            }
        }

        if let Ok(dir) = self.layout.session_dir(&session.id) {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(session_id = %session.id, error = %e, "Failed to remove session directory");
                }
            }
        }
    }
}
