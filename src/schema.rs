//! Field-level schema guessed from one sample document.

use crate::compile::coerce::parse_date;
use crate::model::DataType;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static OBJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)[a-f0-9]{24}$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    /// Dotted path from the document root.
    pub path: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub required: bool,
    pub indexed: bool,
    pub sample: Value,
    #[serde(rename = "nestedFields", skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaStats {
    pub document_count: u64,
    /// Serialized size in bytes of the sample.
    pub avg_document_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub collection: String,
    pub fields: Vec<FieldInfo>,
    pub sample_document: Map<String, Value>,
    pub stats: SchemaStats,
}

impl Schema {
    /// Every field, depth first, nested ones included.
    pub fn all_fields(&self) -> Vec<&FieldInfo> {
        fn walk<'a>(fields: &'a [FieldInfo], out: &mut Vec<&'a FieldInfo>) {
            for f in fields {
                out.push(f);
                walk(&f.nested, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.fields, &mut out);
        out
    }
}

pub fn infer_schema(document: &Map<String, Value>, collection: &str) -> Schema {
    let size = serde_json::to_string(document).map(|s| s.len()).unwrap_or(0);
    Schema {
        collection: collection.to_string(),
        fields: fields_of(document, ""),
        sample_document: document.clone(),
        stats: SchemaStats {
            document_count: 0,
            avg_document_size: size,
        },
    }
}

fn fields_of(obj: &Map<String, Value>, prefix: &str) -> Vec<FieldInfo> {
    obj.iter()
        .map(|(key, value)| {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            // Arrays describe their first element when it is a document.
            let nested = match value {
                Value::Object(m) => fields_of(m, &path),
                Value::Array(items) => match items.first() {
                    Some(Value::Object(m)) => fields_of(m, &path),
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            };
            FieldInfo {
                name: key.clone(),
                data_type: infer_type(value),
                required: true,
                indexed: key == "_id",
                sample: value.clone(),
                nested,
                path,
            }
        })
        .collect()
}

pub fn infer_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(_) => DataType::Number,
        Value::Array(_) => DataType::Array,
        Value::Object(m) if m.contains_key("$oid") => DataType::ObjectId,
        Value::Object(m) if m.contains_key("$date") => DataType::Date,
        Value::Object(_) => DataType::Object,
        Value::String(s) if OBJECT_ID.is_match(s) => DataType::ObjectId,
        Value::String(s) if parse_date(s).is_some() => DataType::Date,
        Value::String(_) => DataType::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn scalar_types() {
        assert_eq!(infer_type(&json!("507f1f77bcf86cd799439011")), DataType::ObjectId);
        assert_eq!(infer_type(&json!("2024-01-15")), DataType::Date);
        assert_eq!(infer_type(&json!("2024-01-15T10:00:00Z")), DataType::Date);
        assert_eq!(infer_type(&json!("hello")), DataType::String);
        assert_eq!(infer_type(&json!(3.5)), DataType::Number);
        assert_eq!(infer_type(&json!(false)), DataType::Boolean);
        assert_eq!(infer_type(&json!(null)), DataType::Null);
        assert_eq!(infer_type(&json!({ "$oid": "x" })), DataType::ObjectId);
    }

    #[test]
    fn nested_paths() {
        let doc = json!({
            "_id": "507f1f77bcf86cd799439011",
            "profile": { "city": "Utrecht" },
            "orders": [ { "total": 12 } ],
            "tags": ["a"]
        });
        let schema = infer_schema(doc.as_object().unwrap(), "users");

        assert_eq!(schema.collection, "users");
        assert!(schema.fields[0].indexed);
        assert!(!schema.fields[1].indexed);

        let paths: Vec<&str> = schema.all_fields().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["_id", "profile", "profile.city", "orders", "orders.total", "tags"]
        );
        assert_eq!(
            schema.stats.avg_document_size,
            serde_json::to_string(&doc).unwrap().len()
        );
    }

    #[test]
    fn serializes_with_nested_field_key() {
        let doc = json!({ "a": { "b": 1 } });
        let v = serde_json::to_value(infer_schema(doc.as_object().unwrap(), "c")).unwrap();
        assert_eq!(v["fields"][0]["type"], json!("object"));
        assert_eq!(v["fields"][0]["nestedFields"][0]["path"], json!("a.b"));
        assert!(v["fields"][0]["nestedFields"][0].get("nestedFields").is_none());
    }
}
