//! Persisted tool state: one JSON document on disk plus backups.

pub mod backup;
pub mod document;
pub mod file;
pub mod merge;

pub use backup::{BackupMetadata, MAX_BACKUPS};
pub use document::{Category, Collection, StorageDocument, Tool};
pub use file::{CleanupSummary, ExportOptions, FileStore, ImportSummary, StorageUsage};
