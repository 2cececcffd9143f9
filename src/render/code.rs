//! Driver snippets for a saved query.

use crate::compile::CompileError;
use crate::model::{MongoQuery, Operation};
use crate::pipeline::Pipeline;
use crate::render::shell::{self, compact, filter_arg, pretty};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Shell,
    Nodejs,
    Python,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Shell, Language::Nodejs, Language::Python];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Shell => "shell",
            Language::Nodejs => "nodejs",
            Language::Python => "python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shell" | "mongosh" => Ok(Language::Shell),
            "nodejs" | "node" | "js" => Ok(Language::Nodejs),
            "python" | "py" => Ok(Language::Python),
            other => Err(format!(
                "unknown language '{}' (expected one of: {})",
                other,
                Language::ALL.map(Language::as_str).join(", ")
            )),
        }
    }
}

pub fn render_code(query: &MongoQuery, language: Language) -> Result<String, CompileError> {
    match language {
        Language::Shell => shell::render_query(query),
        Language::Nodejs => render_nodejs(query),
        Language::Python => render_python(query),
    }
}

fn stage_values(query: &MongoQuery) -> Vec<Value> {
    Pipeline::new(query.pipeline.clone().unwrap_or_default())
        .active_stages()
        .into_iter()
        .map(crate::pipeline::stage_value)
        .collect()
}

fn render_nodejs(query: &MongoQuery) -> Result<String, CompileError> {
    let op = query.operation;
    let filter = filter_arg(query)?.unwrap_or_else(|| "{}".to_string());
    let options = query.options.clone().unwrap_or_default();

    let mut code = String::from(
        "// Node.js with MongoDB driver\nconst { MongoClient } = require('mongodb');\n\n",
    );
    code.push_str(&format!("async function {}Query() {{\n", op));
    code.push_str("  const client = new MongoClient('mongodb://localhost:27017');\n");
    code.push_str("  await client.connect();\n");
    code.push_str("  const db = client.db('database');\n");
    code.push_str(&format!(
        "  const collection = db.collection('{}');\n\n",
        query.collection
    ));

    match op {
        Operation::Find => {
            code.push_str(&format!("  const result = await collection.find({}", filter));
            if let Some(projection) = &options.projection {
                code.push_str(&format!(
                    ", {{ projection: {} }}",
                    compact(&Value::Object(projection.clone()))
                ));
            }
            code.push(')');
            if let Some(sort) = &options.sort {
                code.push_str(&format!(".sort({})", compact(&Value::Object(sort.clone()))));
            }
            if let Some(limit) = options.limit.filter(|n| *n > 0) {
                code.push_str(&format!(".limit({})", limit));
            }
            if let Some(skip) = options.skip.filter(|n| *n > 0) {
                code.push_str(&format!(".skip({})", skip));
            }
            code.push_str(".toArray();\n");
        }
        Operation::Aggregate => {
            let stages: Vec<String> = stage_values(query).iter().map(compact).collect();
            if stages.is_empty() {
                code.push_str("  const result = await collection.aggregate([]).toArray();\n");
            } else {
                code.push_str(&format!(
                    "  const result = await collection.aggregate([\n    {}\n  ]).toArray();\n",
                    stages.join(",\n    ")
                ));
            }
        }
        Operation::InsertOne => code.push_str(&format!(
            "  const result = await collection.insertOne({});\n",
            pretty(&Value::Object(query.document.clone().unwrap_or_default()))
        )),
        Operation::InsertMany => code.push_str(&format!(
            "  const result = await collection.insertMany({});\n",
            pretty(&Value::Array(query.documents.clone().unwrap_or_default()))
        )),
        Operation::UpdateOne | Operation::UpdateMany => {
            let update = query
                .update
                .as_ref()
                .map(shell::update_value)
                .unwrap_or_else(|| Value::Object(Map::new()));
            code.push_str(&format!(
                "  const result = await collection.{}({}, {});\n",
                op,
                filter,
                compact(&update)
            ));
        }
        Operation::DeleteOne
        | Operation::DeleteMany
        | Operation::Count
        | Operation::CountDocuments => code.push_str(&format!(
            "  const result = await collection.{}({});\n",
            op, filter
        )),
        _ => code.push_str(&format!("  const result = await collection.{}();\n", op)),
    }

    code.push_str("  console.log(result);\n");
    code.push_str("  await client.close();\n");
    code.push_str(&format!("}}\n\n{}Query();", op));
    Ok(code)
}

fn render_python(query: &MongoQuery) -> Result<String, CompileError> {
    let op = query.operation;
    let name = snake_case(op.method());
    let filter = match &query.filter {
        Some(input) if !input.is_empty() => {
            python_literal(&crate::render::filter_to_value(&crate::compile::compile(input)?))
        }
        _ => "{}".to_string(),
    };
    let options = query.options.clone().unwrap_or_default();

    let mut code = String::from(
        "# Python with PyMongo\nfrom pymongo import MongoClient\nfrom datetime import datetime\n\n",
    );
    code.push_str(&format!("def {}_query():\n", name));
    code.push_str("    client = MongoClient('mongodb://localhost:27017')\n");
    code.push_str("    db = client.database\n");
    code.push_str(&format!("    collection = db.{}\n\n", query.collection));

    match op {
        Operation::Find => {
            code.push_str(&format!("    result = collection.find({}", filter));
            if let Some(projection) = &options.projection {
                code.push_str(&format!(
                    ", {}",
                    python_literal(&Value::Object(projection.clone()))
                ));
            }
            code.push(')');
            if let Some(limit) = options.limit.filter(|n| *n > 0) {
                code.push_str(&format!(".limit({})", limit));
            }
            if let Some(skip) = options.skip.filter(|n| *n > 0) {
                code.push_str(&format!(".skip({})", skip));
            }
            if let Some(sort) = &options.sort {
                let pairs: Vec<String> = sort
                    .iter()
                    .map(|(k, v)| {
                        format!("({}, {})", python_literal(&Value::String(k.clone())), v)
                    })
                    .collect();
                code.push_str(&format!(".sort([{}])", pairs.join(", ")));
            }
            code.push_str("\n    for doc in result:\n        print(doc)\n");
        }
        Operation::Aggregate => {
            let stages: Vec<String> = stage_values(query).iter().map(python_literal).collect();
            if stages.is_empty() {
                code.push_str("    result = collection.aggregate([])\n");
            } else {
                code.push_str(&format!(
                    "    result = collection.aggregate([\n        {}\n    ])\n",
                    stages.join(",\n        ")
                ));
            }
            code.push_str("    for doc in result:\n        print(doc)\n");
        }
        Operation::InsertOne => {
            code.push_str(&format!(
                "    result = collection.insert_one({})\n",
                python_literal(&Value::Object(query.document.clone().unwrap_or_default()))
            ));
            code.push_str("    print(f\"Inserted document with id: {result.inserted_id}\")\n");
        }
        Operation::InsertMany => {
            code.push_str(&format!(
                "    result = collection.insert_many({})\n",
                python_literal(&Value::Array(query.documents.clone().unwrap_or_default()))
            ));
            code.push_str("    print(f\"Inserted {len(result.inserted_ids)} documents\")\n");
        }
        Operation::UpdateOne | Operation::UpdateMany => {
            let update = query
                .update
                .as_ref()
                .map(shell::update_value)
                .unwrap_or_else(|| Value::Object(Map::new()));
            code.push_str(&format!(
                "    result = collection.{}({}, {})\n",
                name,
                filter,
                python_literal(&update)
            ));
            code.push_str("    print(result.modified_count)\n");
        }
        Operation::DeleteOne | Operation::DeleteMany | Operation::CountDocuments => {
            code.push_str(&format!("    result = collection.{}({})\n", name, filter));
            code.push_str("    print(result)\n");
        }
        _ => code.push_str(&format!("    result = collection.{}()\n    print(result)\n", name)),
    }

    code.push_str("    client.close()\n\n");
    code.push_str(&format!(
        "if __name__ == \"__main__\":\n    {}_query()",
        name
    ));
    Ok(code)
}

/// `insertOne` -> `insert_one`.
fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for ch in s.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// JSON value as a Python literal (`None`, `True`, single-quoted strings).
pub fn python_literal(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(python_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(m) => format!(
            "{{{}}}",
            m.iter()
                .map(|(k, v)| format!(
                    "{}: {}",
                    python_literal(&Value::String(k.clone())),
                    python_literal(v)
                ))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
