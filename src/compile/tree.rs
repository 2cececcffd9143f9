//! The compiled boolean filter tree.

use crate::model::{Logic, Operator};
use serde::Serialize;
use serde_json::Value;

/// A single field test with its value already coerced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    /// Only set for `$regex`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterNode {
    #[serde(rename = "PREDICATE")]
    Predicate(Predicate),
    #[serde(rename = "AND")]
    And(Vec<FilterNode>),
    #[serde(rename = "OR")]
    Or(Vec<FilterNode>),
    #[serde(rename = "NOT")]
    Not(Box<FilterNode>),
}

impl FilterNode {
    /// Matches every document.
    pub fn empty() -> Self {
        FilterNode::And(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterNode::And(c) | FilterNode::Or(c) if c.is_empty())
    }

    pub fn negate(self) -> Self {
        FilterNode::Not(Box::new(self))
    }

    /// Join children under `logic`. No children gives the empty predicate and
    /// a single child is returned as-is.
    pub fn combine(logic: Logic, mut children: Vec<FilterNode>) -> Self {
        match children.len() {
            0 => FilterNode::empty(),
            1 => children.remove(0),
            _ => match logic {
                Logic::And => FilterNode::And(children),
                Logic::Or => FilterNode::Or(children),
            },
        }
    }

    /// Number of predicates in the tree.
    pub fn predicate_count(&self) -> usize {
        match self {
            FilterNode::Predicate(_) => 1,
            FilterNode::And(c) | FilterNode::Or(c) => c.iter().map(|n| n.predicate_count()).sum(),
            FilterNode::Not(inner) => inner.predicate_count(),
        }
    }

    /// Deepest nesting of AND/OR combinators; a bare predicate is depth 0
    /// and NOT adds no level.
    pub fn depth(&self) -> usize {
        match self {
            FilterNode::Predicate(_) => 0,
            FilterNode::And(c) | FilterNode::Or(c) => {
                1 + c.iter().map(|n| n.depth()).max().unwrap_or(0)
            }
            FilterNode::Not(inner) => inner.depth(),
        }
    }

    /// First operator in the tree that cannot sit under a negation.
    pub fn unnegatable_operator(&self) -> Option<Operator> {
        match self {
            FilterNode::Predicate(p) => (!p.operator.is_negatable()).then_some(p.operator),
            FilterNode::And(c) | FilterNode::Or(c) => {
                c.iter().find_map(FilterNode::unnegatable_operator)
            }
            FilterNode::Not(inner) => inner.unnegatable_operator(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn p(field: &str) -> FilterNode {
        FilterNode::Predicate(Predicate {
            field: field.to_string(),
            operator: Operator::Eq,
            value: json!(1),
            options: None,
        })
    }

    #[test]
    fn combine_collapses_trivial_cases() {
        assert!(FilterNode::combine(Logic::Or, vec![]).is_empty());
        assert_eq!(FilterNode::combine(Logic::Or, vec![p("a")]), p("a"));
        assert_eq!(
            FilterNode::combine(Logic::Or, vec![p("a"), p("b")]),
            FilterNode::Or(vec![p("a"), p("b")])
        );
    }

    #[test]
    fn counts_and_depth() {
        let tree = FilterNode::Or(vec![FilterNode::And(vec![p("a"), p("b")]), p("c").negate()]);
        assert_eq!(tree.predicate_count(), 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(p("x").negate().negate().depth(), 0);
    }

    #[test]
    fn finds_operators_that_refuse_negation() {
        let mut near = p("loc");
        if let FilterNode::Predicate(pred) = &mut near {
            pred.operator = Operator::Near;
        }
        let tree = FilterNode::And(vec![p("a"), FilterNode::Or(vec![p("b"), near])]);
        assert_eq!(tree.unnegatable_operator(), Some(Operator::Near));
        assert_eq!(p("a").negate().unnegatable_operator(), None);
    }

    #[test]
    fn serializes_as_logical_tree() {
        let tree = FilterNode::And(vec![p("a"), p("b").negate()]);
        let v = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            v,
            json!({ "AND": [
                { "PREDICATE": { "field": "a", "operator": "$eq", "value": 1 } },
                { "NOT": { "PREDICATE": { "field": "b", "operator": "$eq", "value": 1 } } }
            ]})
        );
    }
}
