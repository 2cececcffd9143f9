//! Aggregation pipeline stages as stored by the query builder.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageType {
    #[serde(rename = "$match")]
    Match,
    #[serde(rename = "$group")]
    Group,
    #[serde(rename = "$sort")]
    Sort,
    #[serde(rename = "$limit")]
    Limit,
    #[serde(rename = "$skip")]
    Skip,
    #[serde(rename = "$project")]
    Project,
    #[serde(rename = "$unwind")]
    Unwind,
    #[serde(rename = "$lookup")]
    Lookup,
    #[serde(rename = "$facet")]
    Facet,
    #[serde(rename = "$bucket")]
    Bucket,
    #[serde(rename = "$bucketAuto")]
    BucketAuto,
    #[serde(rename = "$addFields")]
    AddFields,
    #[serde(rename = "$replaceRoot")]
    ReplaceRoot,
    #[serde(rename = "$replaceWith")]
    ReplaceWith,
    #[serde(rename = "$sample")]
    Sample,
    #[serde(rename = "$sortByCount")]
    SortByCount,
    #[serde(rename = "$redact")]
    Redact,
    #[serde(rename = "$geoNear")]
    GeoNear,
    #[serde(rename = "$indexStats")]
    IndexStats,
    #[serde(rename = "$collStats")]
    CollStats,
    #[serde(rename = "$out")]
    Out,
    #[serde(rename = "$merge")]
    Merge,
    #[serde(rename = "$unionWith")]
    UnionWith,
}

impl StageType {
    pub const ALL: [StageType; 23] = [
        StageType::Match,
        StageType::Group,
        StageType::Sort,
        StageType::Limit,
        StageType::Skip,
        StageType::Project,
        StageType::Unwind,
        StageType::Lookup,
        StageType::Facet,
        StageType::Bucket,
        StageType::BucketAuto,
        StageType::AddFields,
        StageType::ReplaceRoot,
        StageType::ReplaceWith,
        StageType::Sample,
        StageType::SortByCount,
        StageType::Redact,
        StageType::GeoNear,
        StageType::IndexStats,
        StageType::CollStats,
        StageType::Out,
        StageType::Merge,
        StageType::UnionWith,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageType::Match => "$match",
            StageType::Group => "$group",
            StageType::Sort => "$sort",
            StageType::Limit => "$limit",
            StageType::Skip => "$skip",
            StageType::Project => "$project",
            StageType::Unwind => "$unwind",
            StageType::Lookup => "$lookup",
            StageType::Facet => "$facet",
            StageType::Bucket => "$bucket",
            StageType::BucketAuto => "$bucketAuto",
            StageType::AddFields => "$addFields",
            StageType::ReplaceRoot => "$replaceRoot",
            StageType::ReplaceWith => "$replaceWith",
            StageType::Sample => "$sample",
            StageType::SortByCount => "$sortByCount",
            StageType::Redact => "$redact",
            StageType::GeoNear => "$geoNear",
            StageType::IndexStats => "$indexStats",
            StageType::CollStats => "$collStats",
            StageType::Out => "$out",
            StageType::Merge => "$merge",
            StageType::UnionWith => "$unionWith",
        }
    }

    /// Starter configuration for a freshly added stage.
    pub fn template(self) -> Value {
        match self {
            StageType::Match
            | StageType::Sort
            | StageType::Project
            | StageType::Facet
            | StageType::AddFields
            | StageType::IndexStats
            | StageType::CollStats => json!({}),
            StageType::Group => json!({ "_id": null }),
            StageType::Limit => json!(10),
            StageType::Skip => json!(0),
            StageType::Unwind => json!({ "path": "", "preserveNullAndEmptyArrays": false }),
            StageType::Lookup => json!({
                "from": "",
                "localField": "",
                "foreignField": "",
                "as": ""
            }),
            StageType::Bucket => json!({ "groupBy": "", "boundaries": [], "default": "Other" }),
            StageType::BucketAuto => json!({ "groupBy": "", "buckets": 5 }),
            StageType::ReplaceRoot => json!({ "newRoot": "" }),
            StageType::Sample => json!({ "size": 10 }),
            StageType::ReplaceWith
            | StageType::SortByCount
            | StageType::Redact
            | StageType::Out => json!(""),
            StageType::GeoNear => json!({
                "near": { "type": "Point", "coordinates": [0, 0] },
                "distanceField": "distance"
            }),
            StageType::Merge => json!({ "into": "" }),
            StageType::UnionWith => json!({ "coll": "" }),
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub stage: StageType,

    /// Opaque stage body, copied verbatim into the pipeline.
    #[serde(default)]
    pub config: Value,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub order: i64,
}

fn default_enabled() -> bool {
    true
}

impl PipelineStage {
    pub fn new(stage: StageType, config: Value, order: i64) -> Self {
        Self {
            id: None,
            stage,
            config,
            enabled: true,
            order,
        }
    }

    /// A stage pre-filled with its template.
    pub fn from_template(stage: StageType, order: i64) -> Self {
        Self::new(stage, stage.template(), order)
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_stage_round_trips_its_name() {
        for stage in StageType::ALL {
            let v = serde_json::to_value(stage).unwrap();
            assert_eq!(v, Value::String(stage.as_str().to_string()));
        }
    }

    #[test]
    fn stage_defaults_to_enabled() {
        let s: PipelineStage =
            serde_json::from_value(json!({ "stage": "$limit", "config": 5 })).unwrap();
        assert!(s.enabled);
        assert_eq!(s.order, 0);
        assert_eq!(s.config, json!(5));
    }

    #[test]
    fn lookup_template_has_required_keys() {
        let t = StageType::Lookup.template();
        for key in ["from", "localField", "foreignField", "as"] {
            assert!(t.get(key).is_some(), "missing {}", key);
        }
    }
}
