//! Named snapshots of the storage document.
//!
//! Each backup is `<id>.json` next to an `index.json` holding the metadata,
//! newest first.

use crate::Result;
use crate::store::document::{CURRENT_VERSION, StorageDocument, Tool};
use crate::store::file::FileStore;
use crate::store::merge;
use anyhow::{Context, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

pub const MAX_BACKUPS: usize = 10;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub version: String,
    /// Serialized size of the snapshot in bytes.
    pub size: usize,
    pub tools: Vec<String>,
    #[serde(default)]
    pub automatic: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct BackupIndex {
    dir: PathBuf,
}

impl BackupIndex {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn snapshot_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Metadata, newest first. An unreadable index reads as empty.
    pub(crate) fn list(&self) -> Vec<BackupMetadata> {
        let path = self.dir.join(INDEX_FILE);
        let Ok(text) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "failed to load backup index");
            Vec::new()
        })
    }

    fn write_index(&self, entries: &[BackupMetadata]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating backup directory {}", self.dir.display()))?;
        let path = self.dir.join(INDEX_FILE);
        fs::write(&path, serde_json::to_string_pretty(entries)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    fn add(&self, meta: BackupMetadata, snapshot: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating backup directory {}", self.dir.display()))?;
        fs::write(self.snapshot_path(&meta.id), snapshot)
            .with_context(|| format!("writing backup {}", meta.id))?;

        let mut entries = self.list();
        entries.insert(0, meta);
        for old in entries.drain(MAX_BACKUPS.min(entries.len())..) {
            self.remove_snapshot(&old.id);
        }
        self.write_index(&entries)
    }

    /// Failures are logged; the index is rewritten either way.
    fn remove_snapshot(&self, id: &str) -> bool {
        let path = self.snapshot_path(id);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not remove backup snapshot");
                false
            }
        }
    }

    fn read(&self, id: &str) -> Result<Value> {
        let path = self.snapshot_path(id);
        let text = fs::read_to_string(&path).map_err(|_| anyhow!("backup '{}' not found", id))?;
        serde_json::from_str(&text).with_context(|| format!("backup '{}' is corrupt", id))
    }

    /// Returns `false` if no backup had that id.
    fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.list();
        let before = entries.len();
        entries.retain(|b| b.id != id);
        let removed = self.remove_snapshot(id);
        if entries.len() == before && !removed {
            return Ok(false);
        }
        self.write_index(&entries)?;
        Ok(true)
    }

    /// Keep the newest `keep` backups. Returns how many were removed.
    pub(crate) fn truncate(&self, keep: usize) -> Result<usize> {
        let mut entries = self.list();
        if entries.len() <= keep {
            return Ok(0);
        }
        let removed: Vec<BackupMetadata> = entries.drain(keep..).collect();
        for old in &removed {
            self.remove_snapshot(&old.id);
        }
        self.write_index(&entries)?;
        Ok(removed.len())
    }

    pub(crate) fn disk_usage(&self) -> u64 {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return 0;
        };
        dir.filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }
}

impl FileStore {
    /// Snapshot the current document (or just `tools`' records). Returns the
    /// new backup's id.
    pub fn create_backup(
        &self,
        name: &str,
        description: Option<&str>,
        tools: Option<&[Tool]>,
    ) -> Result<String> {
        let Value::Object(data) = serde_json::to_value(self.load())? else {
            anyhow::bail!("storage document did not serialize to an object");
        };
        let data = match tools {
            Some(tools) => merge::filter_by_tools(&data, tools),
            None => data,
        };
        let snapshot = serde_json::to_string(&data)?;

        let meta = BackupMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            timestamp: Utc::now().timestamp_millis(),
            version: CURRENT_VERSION.to_string(),
            size: snapshot.len(),
            tools: tools
                .unwrap_or(&Tool::ALL[..])
                .iter()
                .map(|t| t.id().to_string())
                .collect(),
            automatic: false,
        };
        let id = meta.id.clone();
        self.backups().add(meta, &snapshot)?;
        info!(%id, name, "created backup");
        Ok(id)
    }

    pub fn list_backups(&self) -> Vec<BackupMetadata> {
        self.backups().list()
    }

    /// Replace the current document with a backup, migrating it if needed.
    pub fn restore_backup(&self, id: &str) -> Result<()> {
        let Value::Object(mut data) = self.backups().read(id)? else {
            anyhow::bail!("backup '{}' is not a JSON object", id);
        };
        merge::migrate(&mut data);
        let doc: StorageDocument = serde_json::from_value(Value::Object(data))
            .with_context(|| format!("backup '{}' does not match the storage layout", id))?;
        self.save(&doc)?;
        info!(%id, "restored backup");
        Ok(())
    }

    pub fn delete_backup(&self, id: &str) -> Result<bool> {
        self.backups().delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::Collection;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn create_restore_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store
            .add_record(Collection::MongoQueries, json!({ "id": "a" }))
            .unwrap();

        let id = store.create_backup("before", Some("first"), None).unwrap();
        store.clear_all().unwrap();
        assert!(store.load().mongo_queries.is_empty());

        store.restore_backup(&id).unwrap();
        assert_eq!(store.load().mongo_queries, vec![json!({ "id": "a" })]);

        let listed = store.list_backups();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "before");
        assert_eq!(listed[0].tools.len(), Tool::ALL.len());

        assert!(store.delete_backup(&id).unwrap());
        assert!(!store.delete_backup(&id).unwrap());
        assert!(store.restore_backup(&id).is_err());
    }

    #[test]
    fn keeps_newest_ten() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        let ids: Vec<String> = (0..12)
            .map(|i| store.create_backup(&format!("b{}", i), None, None).unwrap())
            .collect();

        let listed = store.list_backups();
        assert_eq!(listed.len(), MAX_BACKUPS);
        assert_eq!(listed[0].name, "b11");
        assert_eq!(listed[9].name, "b2");
        assert!(store.restore_backup(&ids[0]).is_err());

        assert_eq!(store.backups().truncate(5).unwrap(), 5);
        assert_eq!(store.list_backups().len(), 5);
    }

    #[test]
    fn unremovable_snapshot_still_leaves_the_index() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let id = store.create_backup("stuck", None, None).unwrap();

        let snapshot = store.backups().snapshot_path(&id);
        fs::remove_file(&snapshot).unwrap();
        fs::create_dir(&snapshot).unwrap();

        assert!(!store.backups().remove_snapshot(&id));
        assert!(store.delete_backup(&id).unwrap());
        assert!(store.list_backups().is_empty());
        assert!(snapshot.is_dir());
    }

    #[test]
    fn tool_scoped_backup() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store
            .add_record(Collection::SqlQueries, json!({ "id": "s" }))
            .unwrap();
        store
            .add_record(Collection::MongoQueries, json!({ "id": "m" }))
            .unwrap();

        let id = store
            .create_backup("sql", None, Some(&[Tool::SqlQueryBuilder]))
            .unwrap();
        store.restore_backup(&id).unwrap();

        let doc = store.load();
        assert_eq!(doc.sql_queries.len(), 1);
        assert!(doc.mongo_queries.is_empty());
        assert_eq!(store.list_backups()[0].tools, vec!["sql-query-builder"]);
    }
}
