use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::ids::{self, Entropy, MAX_ID_ATTEMPTS};
use super::{is_expired, LinkError, PublicUrls};
use crate::storage::models::{Token, TokenStatus};
use crate::storage::{StateStore, StorageLayout};

/// Issues and enforces single-use upload tokens.
///
/// Every state transition runs inside one `Table::mutate` call, which makes
/// `record_upload` and `consume` linearizable per token.
pub struct TokenManager {
    store: Arc<StateStore>,
    layout: StorageLayout,
    urls: PublicUrls,
    entropy: Arc<dyn Entropy>,
}

impl TokenManager {
    pub fn new(
        store: Arc<StateStore>,
        layout: StorageLayout,
        urls: PublicUrls,
        entropy: Arc<dyn Entropy>,
    ) -> Self {
        Self {
            store,
            layout,
            urls,
            entropy,
        }
    }

    /// Mint a new Pending token valid for `ttl`.
    pub async fn issue(&self, ttl: Duration, description: Option<String>) -> Result<Token, LinkError> {
        let entropy = Arc::clone(&self.entropy);
        let token = self
            .store
            .tokens
            .mutate(|rows| {
                let id = ids::generate_unique(
                    MAX_ID_ATTEMPTS,
                    || ids::token_id(entropy.as_ref()),
                    |candidate| rows.contains_key(candidate),
                )?;
                let now = Utc::now();
                let token = Token {
                    id: id.clone(),
                    created_at: now,
                    expires_at: now + ttl,
                    status: TokenStatus::Pending,
                    target_filename: None,
                    size_bytes: None,
                    description,
                    uploaded_at: None,
                    consumed_at: None,
                };
                rows.insert(id, token.clone());
                Ok::<_, LinkError>(token)
            })
            .await?;

        tracing::debug!(token_id = %token.id, expires_at = %token.expires_at, "Issued upload token");
        Ok(token)
    }

    pub fn upload_url(&self, token: &Token) -> String {
        self.urls.upload(&token.id)
    }

    /// Read-only check: the token exists, is not consumed and has not expired.
    pub async fn validate(&self, id: &str) -> Result<Token, LinkError> {
        let token = self
            .store
            .tokens
            .get(id)
            .await
            .ok_or(LinkError::NotFound("Upload token"))?;

        match token.effective_status(Utc::now()) {
            TokenStatus::Consumed => Err(LinkError::AlreadyConsumed),
            TokenStatus::Expired => Err(LinkError::Expired("Upload token")),
            _ => Ok(token),
        }
    }

    /// Like [`validate`](Self::validate), but also rejects tokens that already
    /// carry an upload. Used before any request body is read.
    pub async fn check_upload_slot(&self, id: &str) -> Result<Token, LinkError> {
        let token = self.validate(id).await?;
        if token.status == TokenStatus::Uploaded {
            return Err(LinkError::AlreadyUploaded);
        }
        Ok(token)
    }

    /// The token with its status as seen right now.
    pub async fn inspect(&self, id: &str) -> Result<Token, LinkError> {
        let mut token = self
            .store
            .tokens
            .get(id)
            .await
            .ok_or(LinkError::NotFound("Upload token"))?;
        token.status = token.effective_status(Utc::now());
        Ok(token)
    }

    /// Pending -> Uploaded, exactly once per token.
    pub async fn record_upload(&self, id: &str, filename: &str, size: u64) -> Result<Token, LinkError> {
        let token = self
            .store
            .tokens
            .mutate(|rows| {
                let token = rows.get_mut(id).ok_or(LinkError::NotFound("Upload token"))?;
                let now = Utc::now();

                if matches!(token.status, TokenStatus::Uploaded | TokenStatus::Consumed) {
                    return Err(LinkError::AlreadyUploaded);
                }
                if is_expired(&*token, now) {
                    return Err(LinkError::Expired("Upload token"));
                }

                token.status = TokenStatus::Uploaded;
                token.target_filename = Some(filename.to_string());
                token.size_bytes = Some(size);
                token.uploaded_at = Some(now);
                Ok(token.clone())
            })
            .await?;

        tracing::info!(token_id = %id, filename = %filename, size, "Upload recorded");
        Ok(token)
    }

    /// Uploaded -> Consumed, handing the file to exactly one consumer.
    pub async fn consume(&self, id: &str) -> Result<Token, LinkError> {
        let token = self
            .store
            .tokens
            .mutate(|rows| {
                let token = rows.get_mut(id).ok_or(LinkError::NotFound("Upload token"))?;
                let now = Utc::now();

                match token.status {
                    TokenStatus::Consumed => return Err(LinkError::AlreadyConsumed),
                    _ if is_expired(&*token, now) => return Err(LinkError::Expired("Upload token")),
                    TokenStatus::Uploaded => {}
                    TokenStatus::Pending | TokenStatus::Expired => {
                        return Err(LinkError::NotConsumable)
                    }
                }

                token.status = TokenStatus::Consumed;
                token.consumed_at = Some(now);
                Ok(token.clone())
            })
            .await?;

        tracing::debug!(token_id = %id, "Upload consumed");
        Ok(token)
    }

    /// Tokens newest first, statuses reported with lazy expiry applied.
    pub async fn list(&self, include_expired: bool) -> Vec<Token> {
        let now = Utc::now();
        let mut tokens: Vec<Token> = self
            .store
            .tokens
            .all()
            .await
            .into_iter()
            .map(|mut t| {
                t.status = t.effective_status(now);
                t
            })
            .filter(|t| include_expired || t.status != TokenStatus::Expired)
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tokens
    }

    /// Remove a token and the file uploaded against it.
    pub async fn delete(&self, id: &str) -> Result<Token, LinkError> {
        let token = self
            .store
            .tokens
            .delete(id)
            .await?
            .ok_or(LinkError::NotFound("Upload token"))?;

        self.remove_upload(&token).await;
        tracing::debug!(token_id = %id, "Deleted upload token");
        Ok(token)
    }

    /// Absolute path of the file uploaded against `token`.
    pub fn upload_path(&self, token: &Token) -> Result<PathBuf, LinkError> {
        let name = token
            .target_filename
            .as_deref()
            .ok_or(LinkError::NotConsumable)?;
        Ok(self.layout.resolve(&StorageLayout::upload_key(name))?)
    }

    /// Drop every token that expired before `now`, along with its upload.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<usize, LinkError> {
        let removed = self
            .store
            .tokens
            .mutate(|rows| {
                let expired: Vec<String> = rows
                    .values()
                    .filter(|t| is_expired(*t, now))
                    .map(|t| t.id.clone())
                    .collect();
                Ok::<_, LinkError>(
                    expired
                        .iter()
                        .filter_map(|id| rows.remove(id))
                        .collect::<Vec<_>>(),
                )
            })
            .await?;

        for token in &removed {
            self.remove_upload(token).await;
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Removed expired upload tokens");
        }
        Ok(removed.len())
    }

    async fn remove_upload(&self, token: &Token) {
        let Some(name) = token.target_filename.as_deref() else {
            return;
        };
        let path = match self.layout.resolve(&StorageLayout::upload_key(name)) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(token_id = %token.id, error = %e, "Refusing to remove upload");
                return;
            }
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(token_id = %token.id, path = %path.display(), error = %e, "Failed to remove uploaded file");
            }
        }
    }
}
