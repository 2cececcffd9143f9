//! Filter compiler: conditions in, boolean tree out.
//!
//! Two front ends feed the same tree:
//! - `compile_flat` walks the UI's flat list with group markers (one level)
//! - `compile_expr` builds directly from nested input (any depth)

pub mod coerce;
pub mod flat;
pub mod tree;

pub use flat::compile_flat;
pub use tree::{FilterNode, Predicate};

use crate::model::{Condition, FilterExpr, FilterInput, Logic, Operator};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("condition {position}: field name is required for {operator}")]
    EmptyField { position: usize, operator: Operator },

    #[error(
        "condition {position}: group opened while the group from condition {open_at} is still open (nested groups are not supported in the flat encoding)"
    )]
    NestedGroup { position: usize, open_at: usize },

    #[error("condition {position}: group end without a matching group start")]
    UnmatchedGroupEnd { position: usize },

    #[error("group opened at condition {start} is never closed")]
    UnclosedGroup { start: usize },

    #[error("{operator} cannot be negated")]
    UnsupportedNegation { operator: Operator },

    #[error("field '{field}': invalid value for {operator}: {reason}")]
    InvalidValue {
        field: String,
        operator: Operator,
        reason: String,
    },
}

impl CompileError {
    /// Field the error belongs to, if it is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            CompileError::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Compile either encoding.
pub fn compile(input: &FilterInput) -> Result<FilterNode, CompileError> {
    match input {
        FilterInput::Flat(flat) => compile_flat(flat),
        FilterInput::Nested { expr } => compile_expr(expr),
    }
}

/// Build the tree from nested input. Group markers on conditions are ignored
/// here; nesting is structural.
pub fn compile_expr(expr: &FilterExpr) -> Result<FilterNode, CompileError> {
    let mut position = 0;
    compile_expr_at(expr, &mut position)
}

fn compile_expr_at(expr: &FilterExpr, position: &mut usize) -> Result<FilterNode, CompileError> {
    match expr {
        FilterExpr::And { and } => Ok(FilterNode::combine(
            Logic::And,
            and.iter()
                .map(|e| compile_expr_at(e, position))
                .collect::<Result<_, _>>()?,
        )),
        FilterExpr::Or { or } => Ok(FilterNode::combine(
            Logic::Or,
            or.iter()
                .map(|e| compile_expr_at(e, position))
                .collect::<Result<_, _>>()?,
        )),
        FilterExpr::Not { not } => negate(compile_expr_at(not, position)?),
        FilterExpr::Condition(c) => {
            let node = leaf(c, *position)?;
            *position += 1;
            Ok(node)
        }
    }
}

/// One condition as a predicate, wrapped in NOT when negated.
pub(crate) fn leaf(cond: &Condition, position: usize) -> Result<FilterNode, CompileError> {
    if cond.field.trim().is_empty() && !cond.operator.is_document_level() {
        return Err(CompileError::EmptyField {
            position,
            operator: cond.operator,
        });
    }

    let value = coerce::coerce_value(cond)?;
    let options =
        (cond.operator == Operator::Regex).then(|| coerce::DEFAULT_REGEX_OPTIONS.to_string());

    let node = FilterNode::Predicate(Predicate {
        field: cond.field.trim().to_string(),
        operator: cond.operator,
        value,
        options,
    });

    if cond.not { negate(node) } else { Ok(node) }
}

fn negate(node: FilterNode) -> Result<FilterNode, CompileError> {
    match node.unnegatable_operator() {
        Some(operator) => Err(CompileError::UnsupportedNegation { operator }),
        None => Ok(node.negate()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pred(field: &str, op: Operator, value: serde_json::Value) -> FilterNode {
        FilterNode::Predicate(Predicate {
            field: field.to_string(),
            operator: op,
            value,
            options: None,
        })
    }

    #[test]
    fn nested_input_supports_arbitrary_depth() {
        let expr: FilterExpr = serde_json::from_value(json!({
            "or": [
                { "and": [
                    { "field": "a", "operator": "$eq", "value": "1" },
                    { "or": [
                        { "field": "b", "operator": "$gt", "value": "2" },
                        { "not": { "field": "c", "operator": "$eq", "value": "x" } }
                    ]}
                ]},
                { "field": "d", "operator": "$ne", "value": "y" }
            ]
        }))
        .unwrap();

        let tree = compile_expr(&expr).unwrap();
        assert_eq!(
            tree,
            FilterNode::Or(vec![
                FilterNode::And(vec![
                    pred("a", Operator::Eq, json!("1")),
                    FilterNode::Or(vec![
                        pred("b", Operator::Gt, json!(2)),
                        pred("c", Operator::Eq, json!("x")).negate(),
                    ]),
                ]),
                pred("d", Operator::Ne, json!("y")),
            ])
        );
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn nested_single_child_collapses() {
        let expr = FilterExpr::And {
            and: vec![FilterExpr::Condition(
                Condition::new("n", Operator::Lte, json!("5")).with_data_type(DataType::Number),
            )],
        };
        assert_eq!(compile_expr(&expr).unwrap(), pred("n", Operator::Lte, json!(5)));
    }

    #[test]
    fn nested_empty_is_empty_predicate() {
        let expr = FilterExpr::Or { or: vec![] };
        assert!(compile_expr(&expr).unwrap().is_empty());
    }

    #[test]
    fn document_level_operators_need_no_field() {
        let c = Condition::new("", Operator::Text, json!("coffee"));
        assert!(leaf(&c, 0).is_ok());

        let c = Condition::new("  ", Operator::Eq, json!("x"));
        assert_eq!(
            leaf(&c, 3).unwrap_err(),
            CompileError::EmptyField {
                position: 3,
                operator: Operator::Eq
            }
        );
    }

    #[test]
    fn text_and_near_cannot_be_negated() {
        let text = Condition::new("", Operator::Text, json!("coffee")).negated();
        assert_eq!(
            leaf(&text, 0).unwrap_err(),
            CompileError::UnsupportedNegation {
                operator: Operator::Text
            }
        );

        let expr: FilterExpr = serde_json::from_value(json!({
            "not": { "or": [
                { "field": "a", "operator": "$eq", "value": "x" },
                { "field": "loc", "operator": "$near", "value": { "$maxDistance": 10 } }
            ]}
        }))
        .unwrap();
        assert_eq!(
            compile_expr(&expr).unwrap_err(),
            CompileError::UnsupportedNegation {
                operator: Operator::Near
            }
        );

        let within = Condition::new("loc", Operator::GeoWithin, json!({})).negated();
        assert!(leaf(&within, 0).is_ok());
    }

    #[test]
    fn regex_gets_case_insensitive_option() {
        let c = Condition::new("name", Operator::Regex, json!("^jo"));
        match leaf(&c, 0).unwrap() {
            FilterNode::Predicate(p) => assert_eq!(p.options.as_deref(), Some("i")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
