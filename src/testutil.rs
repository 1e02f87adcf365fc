//! Shared test helpers for linkdrop unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::AppState;

/// Create a test AppState rooted in a temporary directory.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(temp_dir, &[])
}

/// Like [`test_state`] with extra environment-style overrides.
pub fn test_state_with(temp_dir: &tempfile::TempDir, overrides: &[(&str, &str)]) -> Arc<AppState> {
    let root = temp_dir.path().join("files");
    let mut env: HashMap<String, String> = HashMap::from([
        ("STORAGE_ROOT".to_string(), root.to_string_lossy().to_string()),
        ("PUBLIC_BASE_URL".to_string(), "http://drop.test".to_string()),
        ("MAX_UPLOAD_BYTES".to_string(), (1024 * 1024).to_string()), // 1MB for tests
        ("CLEANUP_INTERVAL_SECONDS".to_string(), "0".to_string()),
    ]);
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|key| env.get(key).cloned()).expect("Invalid test config");
    Arc::new(AppState::open(config).expect("Failed to open test state"))
}
