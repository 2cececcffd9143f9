//! Filter input shapes.
//!
//! Two encodings are accepted:
//!
//! Flat (what the query builder UI stores):
//! {
//!   "logic": "OR",
//!   "conditions": [
//!     { "field": "age", "operator": "$gte", "value": "18", "dataType": "number",
//!       "groupStart": true },
//!     { "field": "status", "operator": "$eq", "value": "active",
//!       "groupEnd": true, "logic": "AND" },
//!     { "field": "vip", "operator": "$exists", "value": true }
//!   ]
//! }
//!
//! Nested:
//! { "expr": { "or": [ { "and": [ {..}, {..} ] }, { "not": {..} } ] } }
//!
//! The flat form only supports one level of brackets; nested input has no
//! depth limit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$gte")]
    Gte,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$lte")]
    Lte,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$nin")]
    Nin,
    #[serde(rename = "$exists")]
    Exists,
    #[serde(rename = "$type")]
    Type,
    #[serde(rename = "$regex")]
    Regex,
    #[serde(rename = "$text")]
    Text,
    #[serde(rename = "$where")]
    Where,
    #[serde(rename = "$all")]
    All,
    #[serde(rename = "$elemMatch")]
    ElemMatch,
    #[serde(rename = "$size")]
    Size,
    #[serde(rename = "$mod")]
    Mod,
    #[serde(rename = "$geoWithin")]
    GeoWithin,
    #[serde(rename = "$geoIntersects")]
    GeoIntersects,
    #[serde(rename = "$near")]
    Near,
    #[serde(rename = "$nearSphere")]
    NearSphere,
}

/// Coarse grouping used by validation messages and coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCategory {
    Equality,
    Inequality,
    Ordering,
    SetMembership,
    Existence,
    TypeCheck,
    Evaluation,
    Array,
    Geospatial,
}

impl Operator {
    /// MongoDB spelling, e.g. `$gte`.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Exists => "$exists",
            Operator::Type => "$type",
            Operator::Regex => "$regex",
            Operator::Text => "$text",
            Operator::Where => "$where",
            Operator::All => "$all",
            Operator::ElemMatch => "$elemMatch",
            Operator::Size => "$size",
            Operator::Mod => "$mod",
            Operator::GeoWithin => "$geoWithin",
            Operator::GeoIntersects => "$geoIntersects",
            Operator::Near => "$near",
            Operator::NearSphere => "$nearSphere",
        }
    }

    pub fn category(self) -> OperatorCategory {
        use Operator::*;
        match self {
            Eq => OperatorCategory::Equality,
            Ne => OperatorCategory::Inequality,
            Gt | Gte | Lt | Lte => OperatorCategory::Ordering,
            In | Nin => OperatorCategory::SetMembership,
            Exists => OperatorCategory::Existence,
            Type => OperatorCategory::TypeCheck,
            Regex | Text | Where | Mod => OperatorCategory::Evaluation,
            All | ElemMatch | Size => OperatorCategory::Array,
            GeoWithin | GeoIntersects | Near | NearSphere => OperatorCategory::Geospatial,
        }
    }

    /// `$text` and `$where` apply to the whole document, not a field.
    pub fn is_document_level(self) -> bool {
        matches!(self, Operator::Text | Operator::Where)
    }

    /// MongoDB refuses these under `$not` and inside `$nor`.
    pub fn is_negatable(self) -> bool {
        !matches!(
            self,
            Operator::Text | Operator::Where | Operator::Near | Operator::NearSphere
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Array,
    Object,
    Null,
    Regex,
    Binary,
    Decimal128,
}

impl DataType {
    /// Alias accepted by `$type`.
    pub fn bson_alias(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "bool",
            DataType::Date => "date",
            DataType::ObjectId => "objectId",
            DataType::Array => "array",
            DataType::Object => "object",
            DataType::Null => "null",
            DataType::Regex => "regex",
            DataType::Binary => "binData",
            DataType::Decimal128 => "decimal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// One field/operator/value term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub field: String,

    pub operator: Operator,

    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub data_type: DataType,

    /// Only read on the condition that closes a group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Logic>,

    #[serde(default)]
    pub group_start: bool,

    #[serde(default)]
    pub group_end: bool,

    #[serde(default)]
    pub not: bool,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            id: None,
            field: field.into(),
            operator,
            value,
            data_type: DataType::String,
            logic: None,
            group_start: false,
            group_end: false,
            not: false,
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }

    pub fn opens_group(mut self) -> Self {
        self.group_start = true;
        self
    }

    pub fn closes_group(mut self, logic: Logic) -> Self {
        self.group_end = true;
        self.logic = Some(logic);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlatFilter {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub logic: Logic,
}

/// Nested filter expression; no grouping markers needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    And { and: Vec<FilterExpr> },
    Or { or: Vec<FilterExpr> },
    Not { not: Box<FilterExpr> },
    Condition(Condition),
}

/// Anything the compiler accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
    Nested { expr: FilterExpr },
    Flat(FlatFilter),
}

impl FilterInput {
    pub fn is_empty(&self) -> bool {
        match self {
            FilterInput::Flat(flat) => flat.conditions.is_empty(),
            FilterInput::Nested { expr } => match expr {
                FilterExpr::And { and } => and.is_empty(),
                FilterExpr::Or { or } => or.is_empty(),
                _ => false,
            },
        }
    }
}

impl From<FlatFilter> for FilterInput {
    fn from(flat: FlatFilter) -> Self {
        FilterInput::Flat(flat)
    }
}

impl From<FilterExpr> for FilterInput {
    fn from(expr: FilterExpr) -> Self {
        FilterInput::Nested { expr }
    }
}
