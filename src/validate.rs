//! Static checks on a saved query before it is run or exported.
//!
//! Errors make the query invalid; warnings and performance hints are advice.

use crate::compile;
use crate::model::{MongoQuery, Operation, PipelineStage, StageType};
use crate::pipeline::Pipeline;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintKind {
    Query,
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceHint {
    #[serde(rename = "type")]
    pub kind: HintKind,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Warning>,
    pub performance: Vec<PerformanceHint>,
}

/// Result sets above this size get a hint to add a limit.
const LARGE_LIMIT: u64 = 1000;

pub fn validate_query(query: &MongoQuery) -> ValidationReport {
    let mut r = ValidationReport::default();

    if query.collection.trim().is_empty() {
        r.errors.push(issue("MISSING_COLLECTION", "Collection name is required"));
    }

    if let Some(filter) = &query.filter {
        if let Err(e) = compile::compile(filter) {
            let mut i = issue("INVALID_FILTER", e.to_string());
            i.field = e.field().map(str::to_string);
            r.errors.push(i);
        }
    }

    match query.operation {
        Operation::Find => check_find(query, &mut r),
        Operation::Aggregate => check_aggregate(query, &mut r),
        Operation::InsertOne => {
            if query.document.as_ref().is_none_or(|d| d.is_empty()) {
                r.errors.push(issue("MISSING_DOCUMENT", "Document to insert is required"));
            }
        }
        Operation::InsertMany => {
            if query.documents.as_ref().is_none_or(|d| d.is_empty()) {
                r.errors.push(issue(
                    "MISSING_DOCUMENTS",
                    "Array of documents to insert is required",
                ));
            }
        }
        Operation::UpdateOne | Operation::UpdateMany => {
            if query.update.as_ref().is_none_or(|u| u.operations.is_empty()) {
                r.errors.push(issue("MISSING_UPDATE", "Update operations are required"));
            }
            if !query.has_filter() {
                r.warnings.push(warning(
                    "No filter specified for update operation",
                    "Consider adding filter conditions to avoid updating all documents",
                ));
            }
        }
        _ => {}
    }

    r.valid = r.errors.is_empty();
    r
}

fn check_find(query: &MongoQuery, r: &mut ValidationReport) {
    if !query.has_filter() {
        r.warnings.push(warning(
            "No filter specified - this will return all documents",
            "Add filter conditions to limit results",
        ));
    }

    let limit = query.options.as_ref().and_then(|o| o.limit).unwrap_or(0);
    if limit == 0 || limit > LARGE_LIMIT {
        r.performance.push(PerformanceHint {
            kind: HintKind::Query,
            severity: Severity::Medium,
            message: "Large result set without limit".to_string(),
            suggestion: "Consider adding a limit to improve performance".to_string(),
        });
    }
}

fn check_aggregate(query: &MongoQuery, r: &mut ValidationReport) {
    let pipeline = Pipeline::new(query.pipeline.clone().unwrap_or_default());
    if pipeline.stages.is_empty() {
        r.warnings.push(warning(
            "Empty aggregation pipeline",
            "Add pipeline stages to perform aggregation operations",
        ));
        return;
    }

    let active = pipeline.active_stages();

    if let Some(first) = active.first() {
        if first.stage != StageType::Match {
            r.performance.push(PerformanceHint {
                kind: HintKind::Pipeline,
                severity: Severity::High,
                message: "Pipeline should start with $match when possible".to_string(),
                suggestion: "Place $match stages early in the pipeline to reduce documents processed"
                    .to_string(),
            });
        }
    }

    for pair in active.windows(2) {
        if pair[0].stage == StageType::Limit && pair[1].stage == StageType::Sort {
            let mut i = issue("INVALID_STAGE_ORDER", "$sort cannot be used after $limit");
            i.stage = Some(StageType::Sort);
            r.errors.push(i);
        }
    }

    for stage in active {
        check_stage(stage, r);
    }
}

fn check_stage(stage: &PipelineStage, r: &mut ValidationReport) {
    let missing = |key: &str| match stage.config.get(key) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };

    match stage.stage {
        StageType::Group if missing("_id") => {
            let mut i = issue("MISSING_GROUP_ID", "$group stage requires _id field");
            i.stage = Some(stage.stage);
            r.errors.push(i);
        }
        StageType::Lookup => {
            for field in ["from", "localField", "foreignField", "as"] {
                if missing(field) {
                    r.errors.push(Issue {
                        code: "MISSING_LOOKUP_FIELD",
                        message: format!("$lookup stage requires {} field", field),
                        stage: Some(stage.stage),
                        field: Some(field.to_string()),
                    });
                }
            }
        }
        StageType::Unwind if missing("path") => {
            let mut i = issue("MISSING_UNWIND_PATH", "$unwind stage requires path field");
            i.stage = Some(stage.stage);
            r.errors.push(i);
        }
        _ => {}
    }
}

fn issue(code: &'static str, message: impl Into<String>) -> Issue {
    Issue {
        code,
        message: message.into(),
        stage: None,
        field: None,
    }
}

fn warning(message: &str, suggestion: &str) -> Warning {
    Warning {
        message: message.to_string(),
        suggestion: suggestion.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, FlatFilter, Logic, Operator, QueryOptions};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn codes(r: &ValidationReport) -> Vec<&'static str> {
        r.errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn missing_collection() {
        let r = validate_query(&MongoQuery::new(" ", Operation::Count));
        assert!(!r.valid);
        assert_eq!(codes(&r), vec!["MISSING_COLLECTION"]);
    }

    #[test]
    fn find_without_filter_or_limit() {
        let r = validate_query(&MongoQuery::new("users", Operation::Find));
        assert!(r.valid);
        assert_eq!(r.warnings.len(), 1);
        assert_eq!(r.performance[0].severity, Severity::Medium);

        let mut q = MongoQuery::new("users", Operation::Find);
        q.options = Some(QueryOptions {
            limit: Some(50),
            ..Default::default()
        });
        assert!(validate_query(&q).performance.is_empty());
    }

    #[test]
    fn aggregate_stage_rules() {
        let mut q = MongoQuery::new("orders", Operation::Aggregate);
        q.pipeline = Some(vec![
            PipelineStage::new(StageType::Group, json!({ "count": { "$sum": 1 } }), 0),
            PipelineStage::new(StageType::Limit, json!(5), 1),
            PipelineStage::new(StageType::Sort, json!({ "count": -1 }), 2),
            PipelineStage::new(StageType::Lookup, json!({ "from": "customers", "as": "" }), 3),
            PipelineStage::new(StageType::Unwind, json!({ "path": "" }), 4).disabled(),
        ]);

        let r = validate_query(&q);
        assert!(!r.valid);
        assert_eq!(
            codes(&r),
            vec![
                "INVALID_STAGE_ORDER",
                "MISSING_GROUP_ID",
                "MISSING_LOOKUP_FIELD",
                "MISSING_LOOKUP_FIELD",
                "MISSING_LOOKUP_FIELD",
            ]
        );
        let lookup_fields: Vec<_> = r
            .errors
            .iter()
            .filter_map(|e| e.field.as_deref())
            .collect();
        assert_eq!(lookup_fields, vec!["localField", "foreignField", "as"]);
        assert_eq!(r.performance[0].kind, HintKind::Pipeline);
        assert_eq!(r.performance[0].severity, Severity::High);
    }

    #[test]
    fn empty_pipeline_is_a_warning() {
        let r = validate_query(&MongoQuery::new("orders", Operation::Aggregate));
        assert!(r.valid);
        assert_eq!(r.warnings[0].message, "Empty aggregation pipeline");
    }

    #[test]
    fn write_operations_need_bodies() {
        assert_eq!(
            codes(&validate_query(&MongoQuery::new("u", Operation::InsertOne))),
            vec!["MISSING_DOCUMENT"]
        );
        assert_eq!(
            codes(&validate_query(&MongoQuery::new("u", Operation::InsertMany))),
            vec!["MISSING_DOCUMENTS"]
        );
        let r = validate_query(&MongoQuery::new("u", Operation::UpdateOne));
        assert_eq!(codes(&r), vec!["MISSING_UPDATE"]);
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn broken_filter_is_reported() {
        let mut q = MongoQuery::new("users", Operation::Find);
        q.filter = Some(
            FlatFilter {
                conditions: vec![Condition::new("tags", Operator::Size, json!("many"))],
                logic: Logic::And,
            }
            .into(),
        );
        let r = validate_query(&q);
        assert_eq!(codes(&r), vec!["INVALID_FILTER"]);
        assert_eq!(r.errors[0].field.as_deref(), Some("tags"));
    }
}
