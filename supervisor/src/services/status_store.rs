//! Status store implementations
//!
//! The durable variant keeps the whole record map in one JSON file and
//! writes it atomically (temp file + rename), so a crash mid-write never
//! leaves a torn store behind. The in-memory variant backs tests and
//! short-lived tooling.

use crate::error::{SupervisorError, SupervisorResult};
use crate::traits::StatusStore;
use shared::AppRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// JSON-file-backed store. All access is serialized behind one lock, which
/// is the per-key atomicity the monitor's read-decide-write cycles assume.
pub struct FileStatusStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> SupervisorResult<HashMap<String, AppRecord>> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let records: HashMap<String, AppRecord> = serde_json::from_str(&contents)?;
                Ok(records)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, records: &HashMap<String, AppRecord>) -> SupervisorResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(records)?;
        fs::write(&tmp_path, contents).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl StatusStore for FileStatusStore {
    async fn get(&self, name: &str) -> SupervisorResult<Option<AppRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(name))
    }

    async fn get_all(&self) -> SupervisorResult<Vec<AppRecord>> {
        let _guard = self.lock.lock().await;
        let mut records: Vec<AppRecord> = self.load().await?.into_values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn put(&self, record: AppRecord) -> SupervisorResult<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        debug!(app = %record.name, status = %record.status, "persisting record");
        records.insert(record.name.clone(), record);
        self.save(&records).await
    }
}

/// In-memory store for tests and one-shot commands
#[derive(Default)]
pub struct MemoryStatusStore {
    records: tokio::sync::RwLock<HashMap<String, AppRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store
    pub async fn with_records(records: Vec<AppRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store
                .put(record)
                .await
                .unwrap_or_else(|_| unreachable!("memory store put cannot fail"));
        }
        store
    }
}

#[async_trait::async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, name: &str) -> SupervisorResult<Option<AppRecord>> {
        Ok(self.records.read().await.get(name).cloned())
    }

    async fn get_all(&self) -> SupervisorResult<Vec<AppRecord>> {
        let mut records: Vec<AppRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn put(&self, record: AppRecord) -> SupervisorResult<()> {
        self.records
            .write()
            .await
            .insert(record.name.clone(), record);
        Ok(())
    }
}

/// Fetch a record or fail with `AppNotFound`
pub async fn require_record<S: StatusStore + ?Sized>(
    store: &S,
    name: &str,
) -> SupervisorResult<AppRecord> {
    store
        .get(name)
        .await?
        .ok_or_else(|| SupervisorError::AppNotFound {
            name: name.to_string(),
        })
}
