//! linkdrop - ephemeral link-based file exchange
//!
//! This crate hands out single-use upload links and expiring download sessions:
//! - One-time upload tokens with lazy TTL expiry and an upload/consume split
//! - Share sessions bundling files, with optional short links
//! - JSON state tables rewritten atomically on every mutation
//! - REST API with streaming multipart upload and streamed downloads

pub mod api;
pub mod config;
pub mod links;
pub mod storage;
pub mod sweeper;
#[cfg(test)]
pub mod testutil;
pub mod tools;

use std::sync::Arc;

use config::Config;
use links::{Entropy, LinkError, LinkResolver, PublicUrls, SessionManager, SystemEntropy, TokenManager};
use storage::{StateStore, StorageLayout};
use tools::ToolRegistry;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub layout: StorageLayout,
    pub store: Arc<StateStore>,
    pub tokens: TokenManager,
    pub sessions: SessionManager,
    pub resolver: LinkResolver,
    pub tools: ToolRegistry,
}

impl AppState {
    /// Open storage under `config.storage.root` and wire up the managers.
    pub fn open(config: Config) -> Result<Self, LinkError> {
        Self::with_entropy(config, Arc::new(SystemEntropy::new()))
    }

    /// Same as [`open`](Self::open) with a caller-supplied randomness source.
    pub fn with_entropy(config: Config, entropy: Arc<dyn Entropy>) -> Result<Self, LinkError> {
        let layout = StorageLayout::new(&config.storage.root)?;
        let store = Arc::new(StateStore::open(&config.storage.root)?);
        let urls = PublicUrls::new(config.links.public_base_url.clone());

        let tokens = TokenManager::new(
            Arc::clone(&store),
            layout.clone(),
            urls.clone(),
            Arc::clone(&entropy),
        );
        let sessions = SessionManager::new(
            Arc::clone(&store),
            layout.clone(),
            urls,
            entropy,
            links::ttl_from_secs(config.links.session_ttl_seconds),
        );
        let resolver = LinkResolver::new(Arc::clone(&store), layout.clone());

        Ok(Self {
            config,
            layout,
            store,
            tokens,
            sessions,
            resolver,
            tools: ToolRegistry::builtin(),
        })
    }

    pub fn upload_ttl(&self) -> chrono::Duration {
        links::ttl_from_secs(self.config.links.upload_ttl_seconds)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        links::ttl_from_secs(self.config.links.session_ttl_seconds)
    }
}
