use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};

use super::db::StoreError;
use super::models::{Session, Token};
use super::tables::TableDef;

/// Write attempts per flush before the error is surfaced.
const FLUSH_ATTEMPTS: u32 = 3;

/// A row type persisted in a [`Table`]. The id is the JSON key on disk.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

impl Record for Token {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Session {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// One JSON-backed table.
///
/// Readers share the lock; every mutation holds the write lock for its whole
/// read-modify-flush cycle, so check-and-transition sequences run one at a time.
pub struct Table<R> {
    def: TableDef,
    path: PathBuf,
    rows: RwLock<BTreeMap<String, R>>,
    recovered: bool,
}

impl<R: Record> Table<R> {
    /// Load the table from `dir`. Never fails: a missing file yields an empty
    /// table, a corrupt one is set aside and replaced by an empty table.
    pub fn load(dir: &Path, def: TableDef) -> Self {
        let path = dir.join(def.file_name);
        let mut recovered = false;

        let rows = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, R>>(&bytes) {
                Ok(mut rows) => {
                    for (id, row) in rows.iter_mut() {
                        row.set_id(id.clone());
                    }
                    rows
                }
                Err(e) => {
                    recovered = true;
                    let backup = quarantine(&path);
                    tracing::warn!(
                        table = def.name,
                        error = %e,
                        backup = ?backup,
                        "Corrupt state table, starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                recovered = true;
                tracing::warn!(table = def.name, error = %e, "Unreadable state table, starting empty");
                BTreeMap::new()
            }
        };

        tracing::debug!(table = def.name, rows = rows.len(), "Loaded state table");

        Self {
            def,
            path,
            rows: RwLock::new(rows),
            recovered,
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    /// Whether `load` had to discard an unreadable file.
    pub fn recovered(&self) -> bool {
        self.recovered
    }

    pub async fn get(&self, id: &str) -> Option<R> {
        self.rows.read().await.get(id).cloned()
    }

    /// Point-in-time copy of every row.
    pub async fn all(&self) -> Vec<R> {
        self.rows.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Hold the table stable (no writer can run) while the guard lives.
    pub async fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, R>> {
        self.rows.read().await
    }

    /// Insert or replace a record.
    pub async fn put(&self, record: R) -> Result<(), StoreError> {
        self.mutate(|rows| {
            rows.insert(record.id().to_string(), record);
            Ok::<_, StoreError>(())
        })
        .await
    }

    /// Remove a record, returning it if it existed.
    pub async fn delete(&self, id: &str) -> Result<Option<R>, StoreError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(id) {
            return Ok(None);
        }
        let mut staged = rows.clone();
        let removed = staged.remove(id);
        self.flush(&staged).await?;
        *rows = staged;
        Ok(removed)
    }

    /// Run `f` against a staged copy under the write lock, flush, then publish.
    ///
    /// If `f` fails or the flush fails, the visible table is left untouched.
    pub async fn mutate<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut BTreeMap<String, R>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut rows = self.rows.write().await;
        let mut staged = rows.clone();
        let out = f(&mut staged)?;
        self.flush(&staged).await?;
        *rows = staged;
        Ok(out)
    }

    /// Serialize `rows` and write them out on the blocking pool.
    async fn flush(&self, rows: &BTreeMap<String, R>) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(rows)?;
        let path = self.path.clone();
        let table = self.def.name;
        tokio::task::spawn_blocking(move || flush_with_retry(table, &path, &data)).await?
    }
}

fn flush_with_retry(table: &'static str, path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let mut attempt = 1;
    loop {
        match write_atomic(path, data) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < FLUSH_ATTEMPTS => {
                tracing::warn!(table, attempt, error = %e, "Flush failed, retrying");
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(table, error = %e, "Flush failed");
                return Err(StoreError::Flush { table, source: e });
            }
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}

/// Move a corrupt table aside so the next flush does not destroy it.
fn quarantine(path: &Path) -> Option<PathBuf> {
    let mut backup = path.as_os_str().to_owned();
    backup.push(format!(".corrupt-{}", Utc::now().timestamp()));
    let backup = PathBuf::from(backup);
    std::fs::rename(path, &backup).ok().map(|_| backup)
}
