//! Shared helpers for linkdrop integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use linkdrop::config::Config;
use linkdrop::links::{Entropy, LinkError};
use linkdrop::AppState;

pub const BASE_URL: &str = "http://drop.test";

pub fn test_config(dir: &tempfile::TempDir, overrides: &[(&str, &str)]) -> Config {
    let root = dir.path().join("files");
    let mut env: HashMap<String, String> = HashMap::from([
        ("STORAGE_ROOT".to_string(), root.to_string_lossy().to_string()),
        ("PUBLIC_BASE_URL".to_string(), BASE_URL.to_string()),
        ("MAX_UPLOAD_BYTES".to_string(), "4096".to_string()),
        ("CLEANUP_INTERVAL_SECONDS".to_string(), "0".to_string()),
    ]);
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn test_state(dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(dir, &[])
}

pub fn test_state_with(dir: &tempfile::TempDir, overrides: &[(&str, &str)]) -> Arc<AppState> {
    Arc::new(AppState::open(test_config(dir, overrides)).unwrap())
}

pub fn test_state_with_entropy(dir: &tempfile::TempDir, entropy: Arc<dyn Entropy>) -> Arc<AppState> {
    Arc::new(AppState::with_entropy(test_config(dir, &[]), entropy).unwrap())
}

/// Always yields the same bytes.
pub struct Stuck;

impl Entropy for Stuck {
    fn fill(&self, dest: &mut [u8]) -> Result<(), LinkError> {
        dest.fill(7);
        Ok(())
    }
}

/// Yields every value twice in a row (0, 0, 1, 1, ...), so every other
/// candidate collides with the previous one.
pub struct Stutter(AtomicU64);

impl Stutter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }
}

impl Entropy for Stutter {
    fn fill(&self, dest: &mut [u8]) -> Result<(), LinkError> {
        let n = (self.0.fetch_add(1, Ordering::SeqCst) / 2).to_be_bytes();
        dest.fill(0);
        let len = dest.len();
        let take = len.min(n.len());
        dest[len - take..].copy_from_slice(&n[n.len() - take..]);
        Ok(())
    }
}

/// Place a file in `uploads/` the way a completed upload would.
pub async fn seed_upload(state: &AppState, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = state.layout.uploads_dir().join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path
}
