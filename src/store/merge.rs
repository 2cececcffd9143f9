//! Import-side transforms on raw JSON: wrapper removal, version migration,
//! merging into the current document, and export-side redaction.

use crate::store::document::{CURRENT_VERSION, Tool, record_id};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use tracing::debug;

pub const REDACTED: &str = "[REDACTED]";

/// Version assumed for documents written before versioning existed.
const UNVERSIONED: &str = "0.9.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub id: String,
    pub from_version: String,
    pub to_version: String,
    pub timestamp: i64,
    pub changes: Vec<String>,
    pub success: bool,
}

/// Number of records each array gained during a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: Vec<(String, usize)>,
    pub skipped_duplicates: usize,
}

impl MergeStats {
    pub fn total_added(&self) -> usize {
        self.added.iter().map(|(_, n)| n).sum()
    }
}

/// `{ "metadata": ..., "data": ... }` exports unwrap to their `data`.
pub fn unwrap_export(value: Value) -> Value {
    match value {
        Value::Object(mut m) if m.contains_key("metadata") && m.contains_key("data") => {
            m.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Bring an imported document up to [`CURRENT_VERSION`].
///
/// Returns the migrations applied (also recorded under `migrations`).
pub fn migrate(doc: &mut Map<String, Value>) -> Vec<Migration> {
    let from = match doc.get("version").and_then(Value::as_str) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNVERSIONED.to_string(),
    };

    let mut applied = Vec::new();
    if version_lt(&from, CURRENT_VERSION) {
        let changes = upgrade_to_v1(doc);
        debug!(from = %from, to = CURRENT_VERSION, ?changes, "migrated storage document");
        applied.push(Migration {
            id: uuid::Uuid::new_v4().to_string(),
            from_version: from,
            to_version: CURRENT_VERSION.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            changes,
            success: true,
        });
    }

    doc.insert(
        "migrations".to_string(),
        serde_json::to_value(&applied).unwrap_or_else(|_| json!([])),
    );
    doc.insert("version".to_string(), json!(CURRENT_VERSION));
    applied
}

fn upgrade_to_v1(doc: &mut Map<String, Value>) -> Vec<String> {
    let mut changes = Vec::new();
    let defaults = [
        ("favoriteTools", json!([])),
        ("recentTools", json!([])),
        (
            "userPreferences",
            json!({
                "theme": "system",
                "sidebarCollapsed": false,
                "notifications": true,
                "autoSave": true,
                "keyboardShortcuts": true
            }),
        ),
        (
            "crossToolData",
            json!({
                "sharedConnections": [],
                "exportedQueries": [],
                "apiResponses": [],
                "globalVariables": {}
            }),
        ),
    ];
    for (key, value) in defaults {
        if doc.get(key).is_none_or(Value::is_null) {
            doc.insert(key.to_string(), value);
            changes.push(format!("added {}", key));
        }
    }
    changes
}

/// Dotted numeric comparison; missing or non-numeric parts count as 0.
fn version_lt(a: &str, b: &str) -> bool {
    let parts = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|p| p.trim().parse().unwrap_or(0))
            .collect()
    };
    let (mut pa, mut pb) = (parts(a), parts(b));
    let n = pa.len().max(pb.len());
    pa.resize(n, 0);
    pb.resize(n, 0);
    pa < pb
}

/// Merge `imported` into `current`.
///
/// Arrays append the imported records whose id is not already present
/// (records without an id dedupe by equality). Objects merge shallowly with
/// imported keys winning. Anything else is overwritten.
pub fn merge_documents(current: &mut Map<String, Value>, imported: Map<String, Value>) -> MergeStats {
    let mut stats = MergeStats::default();
    for (key, value) in imported {
        match (current.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(incoming)) => {
                let before = existing.len();
                let skipped = merge_records(existing, incoming);
                stats.skipped_duplicates += skipped;
                let added = existing.len() - before;
                if added > 0 {
                    stats.added.push((key, added));
                }
            }
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                existing.extend(incoming);
            }
            (Some(slot), value) => *slot = value,
            (None, value) => {
                if let Some(n) = value.as_array().map(Vec::len).filter(|n| *n > 0) {
                    stats.added.push((key.clone(), n));
                }
                current.insert(key, value);
            }
        }
    }
    stats
}

/// Returns how many incoming records were dropped as duplicates.
fn merge_records(existing: &mut Vec<Value>, incoming: Vec<Value>) -> usize {
    let mut ids: HashSet<String> = existing.iter().filter_map(record_id).collect();
    let mut skipped = 0;
    for record in incoming {
        let duplicate = match record_id(&record) {
            Some(id) => !ids.insert(id),
            None => existing.contains(&record),
        };
        if duplicate {
            skipped += 1;
        } else {
            existing.push(record);
        }
    }
    skipped
}

/// Keep only `version` and the arrays owned by `tools`.
pub fn filter_by_tools(doc: &Map<String, Value>, tools: &[Tool]) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(v) = doc.get("version") {
        out.insert("version".to_string(), v.clone());
    }
    for tool in tools {
        let key = tool.collection().key();
        if let Some(v) = doc.get(key) {
            out.insert(key.to_string(), v.clone());
        }
    }
    out
}

/// Blank out connection credentials and sensitive environment values.
pub fn redact_personal_data(doc: &mut Map<String, Value>) {
    if let Some(Value::Array(conns)) = doc.get_mut("databaseConnections") {
        for conn in conns {
            let Some(Value::Object(params)) = conn.get_mut("parameters") else {
                continue;
            };
            for key in ["password", "username"] {
                if params.get(key).is_some_and(|v| !is_blank(v)) {
                    params.insert(key.to_string(), json!(REDACTED));
                }
            }
        }
    }

    if let Some(Value::Array(envs)) = doc.get_mut("envEnvironments") {
        for env in envs {
            let Some(Value::Array(vars)) = env.get_mut("variables") else {
                continue;
            };
            for var in vars {
                if var.get("sensitive").and_then(Value::as_bool) == Some(true) {
                    if let Value::Object(m) = var {
                        m.insert("value".to_string(), json!(REDACTED));
                    }
                }
            }
        }
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
