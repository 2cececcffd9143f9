//! Flat condition list with `groupStart`/`groupEnd` markers.
//!
//! Single left-to-right pass. Ungrouped conditions go straight to the top
//! level; a bracketed run is buffered and closed into one combinator using
//! the `logic` of the closing condition (AND when absent). The top level is
//! joined with the filter's own logic when it holds more than one node.
//!
//! Only one level of brackets is representable. A second `groupStart` while
//! a group is open is rejected rather than guessed at.

use crate::compile::{CompileError, FilterNode, leaf};
use crate::model::FlatFilter;
use tracing::debug;

struct OpenGroup {
    start: usize,
    members: Vec<FilterNode>,
}

pub fn compile_flat(filter: &FlatFilter) -> Result<FilterNode, CompileError> {
    let mut top: Vec<FilterNode> = Vec::new();
    let mut open: Option<OpenGroup> = None;

    for (position, cond) in filter.conditions.iter().enumerate() {
        if cond.group_start {
            if let Some(g) = &open {
                return Err(CompileError::NestedGroup {
                    position,
                    open_at: g.start,
                });
            }
            open = Some(OpenGroup {
                start: position,
                members: Vec::new(),
            });
        }

        let node = leaf(cond, position)?;
        match open.as_mut() {
            Some(g) => g.members.push(node),
            None => top.push(node),
        }

        if cond.group_end {
            let g = open
                .take()
                .ok_or(CompileError::UnmatchedGroupEnd { position })?;
            let logic = cond.logic.unwrap_or_default();
            debug!(
                start = g.start,
                end = position,
                members = g.members.len(),
                ?logic,
                "closing group"
            );
            top.push(FilterNode::combine(logic, g.members));
        }
    }

    if let Some(g) = open {
        return Err(CompileError::UnclosedGroup { start: g.start });
    }

    Ok(FilterNode::combine(filter.logic, top))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Predicate;
    use crate::model::{Condition, DataType, Logic, Operator};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn pred(field: &str, op: Operator, value: Value) -> FilterNode {
        FilterNode::Predicate(Predicate {
            field: field.to_string(),
            operator: op,
            value,
            options: None,
        })
    }

    fn filter(logic: Logic, conditions: Vec<Condition>) -> FlatFilter {
        FlatFilter { conditions, logic }
    }

    #[test]
    fn empty_list_is_empty_predicate() {
        let tree = compile_flat(&FlatFilter::default()).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn single_condition_has_no_wrapper() {
        let f = filter(
            Logic::And,
            vec![Condition::new("status", Operator::Eq, json!("active"))],
        );
        assert_eq!(
            compile_flat(&f).unwrap(),
            pred("status", Operator::Eq, json!("active"))
        );
    }

    #[test]
    fn two_ungrouped_conditions_use_filter_logic() {
        let f = filter(
            Logic::Or,
            vec![
                Condition::new("a", Operator::Eq, json!("x")),
                Condition::new("b", Operator::Eq, json!("y")),
            ],
        );
        assert_eq!(
            compile_flat(&f).unwrap(),
            FilterNode::Or(vec![
                pred("a", Operator::Eq, json!("x")),
                pred("b", Operator::Eq, json!("y")),
            ])
        );
    }

    #[test]
    fn negated_condition_is_wrapped() {
        let f = filter(
            Logic::And,
            vec![Condition::new("status", Operator::Eq, json!("banned")).negated()],
        );
        assert_eq!(
            compile_flat(&f).unwrap(),
            pred("status", Operator::Eq, json!("banned")).negate()
        );
    }

    #[test]
    fn group_inside_top_level_or() {
        let f = filter(
            Logic::Or,
            vec![
                Condition::new("age", Operator::Gte, json!("18"))
                    .with_data_type(DataType::Number)
                    .opens_group(),
                Condition::new("country", Operator::Eq, json!("NL")).closes_group(Logic::And),
                Condition::new("vip", Operator::Eq, json!(true)).with_data_type(DataType::Boolean),
            ],
        );
        assert_eq!(
            compile_flat(&f).unwrap(),
            FilterNode::Or(vec![
                FilterNode::And(vec![
                    pred("age", Operator::Gte, json!(18)),
                    pred("country", Operator::Eq, json!("NL")),
                ]),
                pred("vip", Operator::Eq, json!(true)),
            ])
        );
    }

    #[test]
    fn group_logic_defaults_to_and() {
        let mut closing = Condition::new("b", Operator::Eq, json!("2"));
        closing.group_end = true;
        let f = filter(
            Logic::And,
            vec![
                Condition::new("a", Operator::Eq, json!("1")).opens_group(),
                closing,
            ],
        );
        assert!(matches!(compile_flat(&f).unwrap(), FilterNode::And(ref c) if c.len() == 2));
    }

    #[test]
    fn or_group_as_only_top_level_node() {
        let f = filter(
            Logic::And,
            vec![
                Condition::new("a", Operator::Eq, json!("1")).opens_group(),
                Condition::new("b", Operator::Eq, json!("2")).closes_group(Logic::Or),
            ],
        );
        assert_eq!(
            compile_flat(&f).unwrap(),
            FilterNode::Or(vec![
                pred("a", Operator::Eq, json!("1")),
                pred("b", Operator::Eq, json!("2")),
            ])
        );
    }

    #[test]
    fn numeric_range_bounds_stay_numbers() {
        let f = filter(
            Logic::And,
            vec![
                Condition::new("age", Operator::Gt, json!(5)),
                Condition::new("age", Operator::Lt, json!("9")),
            ],
        );
        assert_eq!(
            compile_flat(&f).unwrap(),
            FilterNode::And(vec![
                pred("age", Operator::Gt, json!(5)),
                pred("age", Operator::Lt, json!(9)),
            ])
        );
    }

    #[test]
    fn negated_near_is_rejected() {
        let f = filter(
            Logic::And,
            vec![
                Condition::new("name", Operator::Eq, json!("x")),
                Condition::new("loc", Operator::Near, json!({ "$maxDistance": 5 })).negated(),
            ],
        );
        assert_eq!(
            compile_flat(&f).unwrap_err(),
            CompileError::UnsupportedNegation {
                operator: Operator::Near
            }
        );
    }

    #[test]
    fn nested_brackets_are_rejected() {
        let f = filter(
            Logic::And,
            vec![
                Condition::new("a", Operator::Eq, json!("1")).opens_group(),
                Condition::new("b", Operator::Eq, json!("2")).opens_group(),
                Condition::new("c", Operator::Eq, json!("3")).closes_group(Logic::And),
            ],
        );
        assert_eq!(
            compile_flat(&f).unwrap_err(),
            CompileError::NestedGroup {
                position: 1,
                open_at: 0
            }
        );
    }

    #[test]
    fn unbalanced_markers_are_rejected() {
        let f = filter(
            Logic::And,
            vec![Condition::new("a", Operator::Eq, json!("1")).closes_group(Logic::Or)],
        );
        assert_eq!(
            compile_flat(&f).unwrap_err(),
            CompileError::UnmatchedGroupEnd { position: 0 }
        );

        let f = filter(
            Logic::And,
            vec![
                Condition::new("a", Operator::Eq, json!("1")),
                Condition::new("b", Operator::Eq, json!("2")).opens_group(),
            ],
        );
        assert_eq!(
            compile_flat(&f).unwrap_err(),
            CompileError::UnclosedGroup { start: 1 }
        );
    }
}
