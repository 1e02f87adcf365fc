use std::path::Path;
use thiserror::Error;

use super::models::{Session, Token};
use super::table::Table;
use super::tables::{SESSIONS, TOKENS};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to flush table '{table}': {source}")]
    Flush {
        table: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Flush task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Owns the token and session tables. Managers hold it behind an `Arc`;
/// nothing else touches the persisted files.
pub struct StateStore {
    pub tokens: Table<Token>,
    pub sessions: Table<Session>,
}

impl StateStore {
    /// Open (or create) the state tables under `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root.as_ref())?;

        let tokens = Table::load(root.as_ref(), TOKENS);
        let sessions = Table::load(root.as_ref(), SESSIONS);

        if tokens.recovered() || sessions.recovered() {
            tracing::warn!(
                tokens_recovered = tokens.recovered(),
                sessions_recovered = sessions.recovered(),
                "State store recovered from unreadable tables"
            );
        }

        Ok(Self { tokens, sessions })
    }
}
