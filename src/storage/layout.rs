use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

pub const UPLOADS_DIR: &str = "uploads";
pub const SHARED_DIR: &str = "shared";
pub const SESSIONS_DIR: &str = "sessions";

/// Longest display name kept by [`sanitize_filename`], in characters.
const MAX_NAME_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Invalid stored path: {0}")]
    InvalidPath(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fixed directory structure under the storage root.
///
/// Stored paths are kept relative to the root with `/` separators and are
/// always produced by this type, never taken verbatim from a client.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, std::io::Error> {
        let root = root.as_ref().to_path_buf();
        for dir in [UPLOADS_DIR, SHARED_DIR, SESSIONS_DIR] {
            std::fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root.join(SHARED_DIR)
    }

    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf, LayoutError> {
        self.resolve(&format!("{SESSIONS_DIR}/{session_id}"))
    }

    /// Relative path of an uploaded file.
    pub fn upload_key(stored_name: &str) -> String {
        format!("{UPLOADS_DIR}/{stored_name}")
    }

    /// Relative path of a blob inside a session directory.
    pub fn session_key(session_id: &str, blob: &str) -> String {
        format!("{SESSIONS_DIR}/{session_id}/{blob}")
    }

    /// Join a stored relative path onto the root, rejecting anything that
    /// could step outside it.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, LayoutError> {
        if relative.is_empty() || relative.contains('\\') || relative.contains('\0') {
            return Err(LayoutError::InvalidPath(relative.to_string()));
        }

        let mut path = self.root.clone();
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(LayoutError::InvalidPath(relative.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Inverse of [`resolve`](Self::resolve) for paths under the root.
    pub fn relative(&self, path: &Path) -> Result<String, LayoutError> {
        let rest = path
            .strip_prefix(&self.root)
            .map_err(|_| LayoutError::InvalidPath(path.display().to_string()))?;

        let mut segments = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(s) => match s.to_str() {
                    Some(s) => segments.push(s),
                    None => return Err(LayoutError::InvalidPath(path.display().to_string())),
                },
                _ => return Err(LayoutError::InvalidPath(path.display().to_string())),
            }
        }

        let relative = segments.join("/");
        // Round-trip through resolve so both directions apply the same rules.
        self.resolve(&relative)?;
        Ok(relative)
    }
}

/// Reduce a client-supplied file name to a safe single path segment.
///
/// Keeps the last segment, Unicode alphanumerics and `.-_`; whitespace turns
/// into `_`; leading dots are stripped. Returns `None` if nothing is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let cleaned: String = last
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let name: String = trimmed.chars().take(MAX_NAME_CHARS).collect();

    if name.is_empty() || name.chars().all(|c| c == '_' || c == '.') {
        None
    } else {
        Some(name)
    }
}

/// A file being written under a temporary `.part` name.
///
/// Dropping it without [`commit`](Self::commit) deletes the partial data, so a
/// cancelled request leaves nothing behind.
pub struct PartialFile {
    file: tokio::fs::File,
    part: PathBuf,
    target: PathBuf,
    written: u64,
    committed: bool,
}

impl PartialFile {
    pub async fn create(target: PathBuf) -> Result<Self, std::io::Error> {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = target.with_file_name(format!(".{name}.part"));
        let file = tokio::fs::File::create(&part).await?;

        Ok(Self {
            file,
            part,
            target,
            written: 0,
            committed: false,
        })
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), std::io::Error> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Sync to disk and move into place. Returns the final byte count.
    pub async fn commit(mut self) -> Result<u64, std::io::Error> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        tokio::fs::rename(&self.part, &self.target).await?;
        self.committed = true;
        Ok(self.written)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.part) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.part.display(), error = %e, "Failed to remove partial file");
                }
            }
        }
    }
}
