//! JSON-file persistence for [`StorageDocument`].

use crate::Result;
use crate::store::backup::BackupIndex;
use crate::store::document::{CURRENT_VERSION, Category, Collection, StorageDocument, Tool, record_id};
use crate::store::merge::{self, MergeStats, Migration};
use anyhow::{Context, bail};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const DATA_FILE: &str = "devtools-platform-data.json";

/// Default budget that `storage_usage` reports against.
pub const MAX_STORAGE_BYTES: u64 = 50 * 1024 * 1024;

/// `cleanup_old_data` only trims above this share of the budget.
const CLEANUP_THRESHOLD_PERCENT: u64 = 80;
const KEEP_API_RESPONSES: usize = 50;
const KEEP_RECENT_TOOLS: usize = 20;
const KEEP_BACKUPS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Restrict the export to these tools' records.
    pub tools: Option<Vec<Tool>>,
    pub include_metadata: bool,
    pub include_personal_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub used: u64,
    pub total: u64,
    pub percentage: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub migrations: Vec<Migration>,
    pub merge: MergeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub api_responses_removed: usize,
    pub recent_tools_removed: usize,
    pub backups_removed: usize,
}

/// The whole state lives in one file under `dir`; backups go to
/// `dir/backups/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    budget: u64,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            budget: MAX_STORAGE_BYTES,
        }
    }

    /// Report usage against `bytes` instead of [`MAX_STORAGE_BYTES`].
    pub fn with_budget(mut self, bytes: u64) -> Self {
        self.budget = bytes.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    pub(crate) fn backups(&self) -> BackupIndex {
        BackupIndex::new(self.dir.join("backups"))
    }

    /// Current document. A missing file yields defaults; so does a corrupt
    /// one, after logging the parse error.
    pub fn load(&self) -> StorageDocument {
        let path = self.data_path();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StorageDocument::default(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read storage file");
                return StorageDocument::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                error!(path = %path.display(), error = %e, "storage file is corrupt, using defaults");
                StorageDocument::default()
            }
        }
    }

    pub fn save(&self, doc: &StorageDocument) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating data directory {}", self.dir.display()))?;
        let text = serde_json::to_string_pretty(doc)?;
        let path = self.data_path();
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), records = doc.record_count(), "saved storage document");
        Ok(())
    }

    /// Like [`save`](Self::save) but a failure is only logged.
    pub fn save_logged(&self, doc: &StorageDocument) -> bool {
        match self.save(doc) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "could not persist storage document");
                false
            }
        }
    }

    pub fn clear_all(&self) -> Result<()> {
        let path = self.data_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }

    /// Append a record, assigning a fresh id if it has none. Returns the id.
    pub fn add_record(&self, c: Collection, mut record: Value) -> Result<String> {
        if !record.is_object() {
            bail!("records must be JSON objects");
        }
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record["id"] = json!(id);
                id
            }
        };

        let mut doc = self.load();
        let records = doc.records_mut(c);
        if records.iter().any(|r| record_id(r).as_deref() == Some(id.as_str())) {
            bail!("{} already has a record with id '{}'", c, id);
        }
        records.push(record);
        self.save(&doc)?;
        Ok(id)
    }

    /// Shallow-patch the record with `id`. Returns `false` if there is none.
    pub fn update_record(&self, c: Collection, id: &str, patch: Map<String, Value>) -> Result<bool> {
        let mut doc = self.load();
        let Some(Value::Object(record)) = doc
            .records_mut(c)
            .iter_mut()
            .find(|r| record_id(r).as_deref() == Some(id))
        else {
            return Ok(false);
        };
        for (k, v) in patch {
            if k != "id" {
                record.insert(k, v);
            }
        }
        self.save(&doc)?;
        Ok(true)
    }

    pub fn remove_record(&self, c: Collection, id: &str) -> Result<bool> {
        let mut doc = self.load();
        let records = doc.records_mut(c);
        let before = records.len();
        records.retain(|r| record_id(r).as_deref() != Some(id));
        if records.len() == before {
            return Ok(false);
        }
        self.save(&doc)?;
        Ok(true)
    }

    /// Pretty JSON of the current document, shaped by `options`.
    pub fn export_document(&self, options: &ExportOptions) -> Result<String> {
        let Value::Object(mut data) = serde_json::to_value(self.load())? else {
            bail!("storage document did not serialize to an object");
        };
        if let Some(tools) = &options.tools {
            data = merge::filter_by_tools(&data, tools);
        }
        if !options.include_personal_data {
            merge::redact_personal_data(&mut data);
        }

        let out = if options.include_metadata {
            let tools: Vec<&str> = options
                .tools
                .as_deref()
                .unwrap_or(&Tool::ALL[..])
                .iter()
                .map(|t| t.id())
                .collect();
            json!({
                "metadata": {
                    "exportTimestamp": Utc::now().timestamp_millis(),
                    "version": CURRENT_VERSION,
                    "tools": tools,
                    "format": "json"
                },
                "data": data
            })
        } else {
            Value::Object(data)
        };
        Ok(serde_json::to_string_pretty(&out)?)
    }

    /// Merge an export (plain or metadata-wrapped, any version) into the
    /// current document. On error nothing is written.
    pub fn import_document(&self, text: &str) -> Result<ImportSummary> {
        let parsed: Value = serde_json::from_str(text).context("import is not valid JSON")?;
        let Value::Object(mut imported) = merge::unwrap_export(parsed) else {
            bail!("import must be a JSON object");
        };
        let migrations = merge::migrate(&mut imported);

        let Value::Object(mut current) = serde_json::to_value(self.load())? else {
            bail!("storage document did not serialize to an object");
        };
        let stats = merge::merge_documents(&mut current, imported);
        let doc: StorageDocument = serde_json::from_value(Value::Object(current))
            .context("merged document does not match the storage layout")?;
        self.save(&doc)?;

        info!(
            added = stats.total_added(),
            duplicates = stats.skipped_duplicates,
            migrations = migrations.len(),
            "imported storage data"
        );
        Ok(ImportSummary {
            migrations,
            merge: stats,
        })
    }

    /// Empty one tool's records.
    pub fn clear_tool(&self, tool: Tool) -> Result<()> {
        let mut doc = self.load();
        doc.records_mut(tool.collection()).clear();
        self.save(&doc)
    }

    pub fn clear_category(&self, category: Category) -> Result<()> {
        let mut doc = self.load();
        for c in category.collections() {
            doc.records_mut(*c).clear();
        }
        self.save(&doc)
    }

    /// Bytes used by the data file and all backups.
    pub fn storage_usage(&self) -> StorageUsage {
        let file = fs::metadata(self.data_path()).map(|m| m.len()).unwrap_or(0);
        let used = file + self.backups().disk_usage();
        StorageUsage {
            used,
            total: self.budget,
            percentage: (used.saturating_mul(100) + self.budget / 2) / self.budget,
        }
    }

    /// Trim history when usage is above the threshold. Returns `None` when
    /// nothing needed doing.
    pub fn cleanup_old_data(&self) -> Result<Option<CleanupSummary>> {
        let usage = self.storage_usage();
        if usage.percentage <= CLEANUP_THRESHOLD_PERCENT {
            debug!(percentage = usage.percentage, "storage below cleanup threshold");
            return Ok(None);
        }

        let mut doc = self.load();
        let mut summary = CleanupSummary::default();

        let responses = &mut doc.cross_tool_data.api_responses;
        if responses.len() > KEEP_API_RESPONSES {
            summary.api_responses_removed = responses.len() - KEEP_API_RESPONSES;
            responses.truncate(KEEP_API_RESPONSES);
        }
        if doc.recent_tools.len() > KEEP_RECENT_TOOLS {
            summary.recent_tools_removed = doc.recent_tools.len() - KEEP_RECENT_TOOLS;
            doc.recent_tools.truncate(KEEP_RECENT_TOOLS);
        }
        summary.backups_removed = self.backups().truncate(KEEP_BACKUPS)?;

        self.save(&doc)?;
        info!(?summary, "cleaned up old data");
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn load_defaults_when_missing_or_corrupt() {
        let (_dir, store) = store();
        assert_eq!(store.load(), StorageDocument::default());

        fs::write(store.data_path(), "{ not json").unwrap();
        assert_eq!(store.load(), StorageDocument::default());
    }

    #[test]
    fn crud() {
        let (_dir, store) = store();
        let id = store
            .add_record(Collection::MongoQueries, json!({ "name": "active users" }))
            .unwrap();
        assert_eq!(id.len(), 36);

        let explicit = store
            .add_record(Collection::MongoQueries, json!({ "id": "q2", "name": "b" }))
            .unwrap();
        assert_eq!(explicit, "q2");
        assert!(store
            .add_record(Collection::MongoQueries, json!({ "id": "q2" }))
            .is_err());

        let patch = json!({ "name": "renamed", "id": "ignored" });
        assert!(store
            .update_record(Collection::MongoQueries, "q2", patch.as_object().cloned().unwrap())
            .unwrap());
        assert!(!store
            .update_record(Collection::SqlQueries, "q2", Map::new())
            .unwrap());

        let doc = store.load();
        assert_eq!(doc.mongo_queries[1], json!({ "id": "q2", "name": "renamed" }));

        assert!(store.remove_record(Collection::MongoQueries, &id).unwrap());
        assert!(!store.remove_record(Collection::MongoQueries, &id).unwrap());
        assert_eq!(store.load().mongo_queries.len(), 1);

        store.clear_all().unwrap();
        store.clear_all().unwrap();
        assert!(store.load().mongo_queries.is_empty());
    }

    #[test]
    fn export_redacts_unless_asked() {
        let (_dir, store) = store();
        store
            .add_record(
                Collection::DatabaseConnections,
                json!({ "id": "c", "parameters": { "password": "pw" } }),
            )
            .unwrap();

        let redacted: Value =
            serde_json::from_str(&store.export_document(&ExportOptions::default()).unwrap())
                .unwrap();
        assert_eq!(
            redacted["databaseConnections"][0]["parameters"]["password"],
            json!("[REDACTED]")
        );

        let opts = ExportOptions {
            tools: Some(vec![Tool::ConnectionStringBuilder]),
            include_metadata: true,
            include_personal_data: true,
        };
        let full: Value = serde_json::from_str(&store.export_document(&opts).unwrap()).unwrap();
        assert_eq!(full["metadata"]["tools"], json!(["connection-string-builder"]));
        assert_eq!(
            full["data"]["databaseConnections"][0]["parameters"]["password"],
            json!("pw")
        );
        assert!(full["data"].get("mongoQueries").is_none());
    }

    #[test]
    fn import_merges_and_rejects_garbage() {
        let (_dir, store) = store();
        store
            .add_record(Collection::MongoQueries, json!({ "id": "a" }))
            .unwrap();

        let export = json!({
            "metadata": { "version": "0.9.0" },
            "data": { "mongoQueries": [ { "id": "a" }, { "id": "b" } ], "custom": 1 }
        });
        let summary = store.import_document(&export.to_string()).unwrap();
        assert_eq!(summary.migrations.len(), 1);
        assert_eq!(summary.merge.skipped_duplicates, 1);

        let doc = store.load();
        assert_eq!(doc.mongo_queries.len(), 2);
        assert_eq!(doc.version, "1.0.0");
        assert_eq!(doc.extra["custom"], json!(1));

        assert!(store.import_document("not json").is_err());
        assert!(store.import_document("[1, 2]").is_err());
        assert_eq!(store.load().mongo_queries.len(), 2);
    }

    #[test]
    fn clearing_by_tool_and_category() {
        let (_dir, store) = store();
        store.add_record(Collection::ApiRequests, json!({})).unwrap();
        store.add_record(Collection::MockEndpoints, json!({})).unwrap();
        store.add_record(Collection::JsonFormats, json!({})).unwrap();

        store.clear_tool(Tool::MockServer).unwrap();
        let doc = store.load();
        assert!(doc.mock_endpoints.is_empty());
        assert_eq!(doc.api_requests.len(), 1);

        store.clear_category(Category::Api).unwrap();
        let doc = store.load();
        assert!(doc.api_requests.is_empty());
        assert_eq!(doc.json_formats.len(), 1);
    }

    #[test]
    fn usage_is_reported_against_budget() {
        let (_dir, store) = store();
        store.save(&StorageDocument::default()).unwrap();
        let usage = store.storage_usage();
        assert!(usage.used > 0);
        assert_eq!(usage.total, MAX_STORAGE_BYTES);
        assert_eq!(usage.percentage, 0);
        assert_eq!(store.cleanup_old_data().unwrap(), None);
    }

    #[test]
    fn cleanup_trims_history_above_threshold() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).with_budget(1);

        let mut doc = StorageDocument::default();
        doc.cross_tool_data.api_responses = (0..60).map(|i| json!({ "n": i })).collect();
        doc.recent_tools = (0..25).map(|i| json!(format!("tool-{}", i))).collect();
        store.save(&doc).unwrap();
        for i in 0..7 {
            store.create_backup(&format!("b{}", i), None, None).unwrap();
        }
        assert!(store.storage_usage().percentage > CLEANUP_THRESHOLD_PERCENT);

        let summary = store.cleanup_old_data().unwrap().unwrap();
        assert_eq!(
            summary,
            CleanupSummary {
                api_responses_removed: 10,
                recent_tools_removed: 5,
                backups_removed: 2,
            }
        );

        let doc = store.load();
        assert_eq!(doc.cross_tool_data.api_responses.len(), KEEP_API_RESPONSES);
        assert_eq!(doc.cross_tool_data.api_responses[0], json!({ "n": 0 }));
        assert_eq!(doc.recent_tools.len(), KEEP_RECENT_TOOLS);
        let backups = store.list_backups();
        assert_eq!(backups.len(), KEEP_BACKUPS);
        assert_eq!(backups[0].name, "b6");
    }
}
