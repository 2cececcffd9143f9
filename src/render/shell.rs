//! MongoDB shell syntax for a saved query.

use crate::compile::{self, CompileError};
use crate::model::{MongoQuery, Operation, Update, UpdateKind};
use crate::pipeline::Pipeline;
use crate::render::filter::filter_to_string;
use serde_json::{Map, Value};

/// Render the query as one `db.<collection>.<method>(...)` expression.
pub fn render_query(query: &MongoQuery) -> Result<String, CompileError> {
    let c = &query.collection;
    let filter = filter_arg(query)?;
    let options = query.options.clone().unwrap_or_default();

    let out = match query.operation {
        Operation::Find => {
            let mut s = format!("db.{}.find({}", c, filter.as_deref().unwrap_or("{}"));
            if let Some(projection) = &options.projection {
                s.push_str(&format!(", {}", compact(&Value::Object(projection.clone()))));
            }
            s.push(')');
            if let Some(sort) = &options.sort {
                s.push_str(&format!(".sort({})", compact(&Value::Object(sort.clone()))));
            }
            if let Some(limit) = options.limit.filter(|n| *n > 0) {
                s.push_str(&format!(".limit({})", limit));
            }
            if let Some(skip) = options.skip.filter(|n| *n > 0) {
                s.push_str(&format!(".skip({})", skip));
            }
            s
        }
        Operation::InsertOne => format!(
            "db.{}.insertOne({})",
            c,
            pretty(&Value::Object(query.document.clone().unwrap_or_default()))
        ),
        Operation::InsertMany => format!(
            "db.{}.insertMany({})",
            c,
            pretty(&Value::Array(query.documents.clone().unwrap_or_default()))
        ),
        Operation::UpdateOne | Operation::UpdateMany => {
            let update = query
                .update
                .as_ref()
                .map(|u| pretty(&update_value(u)))
                .unwrap_or_else(|| "{}".to_string());
            let mut s = format!(
                "db.{}.{}({}, {}",
                c,
                query.operation,
                filter.as_deref().unwrap_or("{}"),
                update
            );
            let mut opts = Map::new();
            if options.upsert {
                opts.insert("upsert".to_string(), Value::Bool(true));
            }
            if let Some(wc) = &options.write_concern {
                opts.insert(
                    "writeConcern".to_string(),
                    serde_json::to_value(wc).unwrap_or_default(),
                );
            }
            if !opts.is_empty() {
                s.push_str(&format!(", {}", compact(&Value::Object(opts))));
            }
            s.push(')');
            s
        }
        Operation::ReplaceOne => {
            let mut s = format!(
                "db.{}.replaceOne({}, {}",
                c,
                filter.as_deref().unwrap_or("{}"),
                compact(&Value::Object(query.document.clone().unwrap_or_default()))
            );
            if options.upsert {
                s.push_str(", { upsert: true }");
            }
            s.push(')');
            s
        }
        Operation::DeleteOne | Operation::DeleteMany => {
            let mut s = format!(
                "db.{}.{}({}",
                c,
                query.operation,
                filter.as_deref().unwrap_or("{}")
            );
            if let Some(wc) = &options.write_concern {
                s.push_str(&format!(
                    ", {{ writeConcern: {} }}",
                    compact(&serde_json::to_value(wc).unwrap_or_default())
                ));
            }
            s.push(')');
            s
        }
        Operation::Aggregate => render_aggregate(c, query),
        Operation::CreateIndex => match &query.index {
            None => format!("db.{}.createIndex({{}})", c),
            Some(index) => {
                let mut s = format!(
                    "db.{}.createIndex({}",
                    c,
                    compact(&Value::Object(index.keys.clone()))
                );
                if let Some(opts) = index.options.as_ref().filter(|o| !o.is_empty()) {
                    s.push_str(&format!(", {}", compact(&Value::Object(opts.clone()))));
                }
                s.push(')');
                s
            }
        },
        Operation::DropIndex => format!(
            "db.{}.dropIndex({})",
            c,
            Value::String(query.index_name.clone().unwrap_or_default())
        ),
        Operation::Distinct => {
            let field = query.field.as_deref().unwrap_or("field");
            let mut s = format!("db.{}.distinct({}", c, Value::String(field.to_string()));
            if let Some(f) = &filter {
                s.push_str(&format!(", {}", f));
            }
            s.push(')');
            s
        }
        Operation::Count | Operation::CountDocuments => {
            let arg = match (&filter, query.operation) {
                (Some(f), _) => f.as_str(),
                (None, Operation::CountDocuments) => "{}",
                (None, _) => "",
            };
            format!("db.{}.{}({})", c, query.operation, arg)
        }
        Operation::EstimatedDocumentCount => format!("db.{}.estimatedDocumentCount()", c),
    };
    Ok(out)
}

/// Compiled filter as pretty JSON, or `None` when there is nothing to filter.
pub(crate) fn filter_arg(query: &MongoQuery) -> Result<Option<String>, CompileError> {
    match &query.filter {
        Some(input) if !input.is_empty() => {
            let tree = compile::compile(input)?;
            Ok(Some(filter_to_string(&tree)))
        }
        _ => Ok(None),
    }
}

fn render_aggregate(collection: &str, query: &MongoQuery) -> String {
    let pipeline = Pipeline::new(query.pipeline.clone().unwrap_or_default());
    let stages: Vec<String> = pipeline
        .active_stages()
        .into_iter()
        .map(|s| format!("{{ {}: {} }}", s.stage, pretty(&s.config)))
        .collect();
    if stages.is_empty() {
        return format!("db.{}.aggregate([])", collection);
    }
    format!(
        "db.{}.aggregate([\n  {}\n])",
        collection,
        stages.join(",\n  ")
    )
}

/// Update document: replacement body, or operations grouped by operator.
pub fn update_value(update: &Update) -> Value {
    match update.kind {
        UpdateKind::Replace => update
            .operations
            .first()
            .map(|op| op.value.clone())
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new())),
        UpdateKind::Update => {
            let mut out = Map::new();
            for op in &update.operations {
                let entry = out
                    .entry(op.operator.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(fields) = entry {
                    fields.insert(op.field.clone(), op.value.clone());
                }
            }
            Value::Object(out)
        }
    }
}

pub(crate) fn pretty(v: &Value) -> String {
    serde_json::to_string_pretty(v).unwrap_or_default()
}

pub(crate) fn compact(v: &Value) -> String {
    serde_json::to_string(v).unwrap_or_default()
}
