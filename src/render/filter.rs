use crate::compile::{FilterNode, Predicate};
use crate::model::Operator;
use serde_json::{Map, Value};

/// Render a compiled tree as a MongoDB query document.
///
/// The empty predicate renders as `{}`. Negated operator predicates use the
/// field-level `$not`; negated equality and negated combinators use `$nor`,
/// since MongoDB has no top-level `$not`.
pub fn filter_to_value(node: &FilterNode) -> Value {
    match node {
        FilterNode::Predicate(p) => predicate_value(p),
        FilterNode::And(children) if children.is_empty() => Value::Object(Map::new()),
        FilterNode::Or(children) if children.is_empty() => Value::Object(Map::new()),
        FilterNode::And(children) => single("$and", list(children)),
        FilterNode::Or(children) => single("$or", list(children)),
        FilterNode::Not(inner) => negated_value(inner),
    }
}

/// Pretty JSON, two-space indent.
pub fn filter_to_string(node: &FilterNode) -> String {
    serde_json::to_string_pretty(&filter_to_value(node)).unwrap_or_else(|_| "{}".to_string())
}

fn list(children: &[FilterNode]) -> Value {
    Value::Array(children.iter().map(filter_to_value).collect())
}

fn single(key: &str, value: Value) -> Value {
    let mut m = Map::new();
    m.insert(key.to_string(), value);
    Value::Object(m)
}

/// `{ "$op": value }` (plus `$options` for regex).
fn operator_expr(p: &Predicate) -> Value {
    let mut m = Map::new();
    m.insert(p.operator.as_str().to_string(), p.value.clone());
    if let Some(opts) = &p.options {
        m.insert("$options".to_string(), Value::String(opts.clone()));
    }
    Value::Object(m)
}

fn predicate_value(p: &Predicate) -> Value {
    match p.operator {
        Operator::Eq => single(&p.field, p.value.clone()),
        Operator::Text => single("$text", single("$search", p.value.clone())),
        Operator::Where => single("$where", p.value.clone()),
        _ => single(&p.field, operator_expr(p)),
    }
}

fn negated_value(inner: &FilterNode) -> Value {
    match inner {
        FilterNode::Predicate(p)
            if p.operator != Operator::Eq && !p.operator.is_document_level() =>
        {
            single(&p.field, single("$not", operator_expr(p)))
        }
        other => single("$nor", Value::Array(vec![filter_to_value(other)])),
    }
}
