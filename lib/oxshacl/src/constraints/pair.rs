//! Property pair constraints: `sh:equals`, `sh:disjoint`, `sh:lessThan` and
//! `sh:lessThanOrEquals`.
//!
//! The values of the shape (its path values, or the focus node itself for a node shape)
//! are compared with the objects of `focus property`. Ordering comparisons that are not
//! defined for a pair of values fail.

use oxrdf::{Graph, NamedNode, Term};
use std::cmp::Ordering;

use super::{node_result, property_result};
use crate::graph::objects;
use crate::literal::compare;
use crate::model::{ConstraintSet, NodeShape, PropertyShape};
use crate::report::{ResultDetail, ValidationResult};

/// Compares `values` with the values of each pair property.
///
/// Returns the failures with the offending value.
pub fn check(
    graph: &Graph,
    constraints: &ConstraintSet,
    focus: &Term,
    values: &[Term],
) -> Vec<(Term, ResultDetail)> {
    let mut failures = Vec::new();
    for property in &constraints.equals {
        let others = objects(graph, focus, property.as_ref());
        let detail = || ResultDetail::Equals {
            property: property.clone(),
        };
        failures.extend(
            values
                .iter()
                .filter(|value| !others.contains(value))
                .map(|value| (value.clone(), detail())),
        );
        failures.extend(
            others
                .iter()
                .filter(|other| !values.contains(other))
                .map(|other| (other.clone(), detail())),
        );
    }
    for property in &constraints.disjoint {
        let others = objects(graph, focus, property.as_ref());
        failures.extend(values.iter().filter(|value| others.contains(value)).map(|value| {
            (
                value.clone(),
                ResultDetail::Disjoint {
                    property: property.clone(),
                },
            )
        }));
    }
    for property in &constraints.less_than {
        failures.extend(ordered(graph, focus, values, property, Ordering::is_lt, |property| {
            ResultDetail::LessThan { property }
        }));
    }
    for property in &constraints.less_than_or_equals {
        failures.extend(ordered(graph, focus, values, property, Ordering::is_le, |property| {
            ResultDetail::LessThanOrEquals { property }
        }));
    }
    failures
}

/// One failure per (value, other value) pair not ordered as `accepts` requires.
fn ordered(
    graph: &Graph,
    focus: &Term,
    values: &[Term],
    property: &NamedNode,
    accepts: fn(Ordering) -> bool,
    detail: fn(NamedNode) -> ResultDetail,
) -> Vec<(Term, ResultDetail)> {
    let others = objects(graph, focus, property.as_ref());
    let mut failures = Vec::new();
    for value in values {
        for other in &others {
            let ordering = match (value, other) {
                (Term::Literal(value), Term::Literal(other)) => {
                    compare(value.as_ref(), other.as_ref())
                }
                _ => None,
            };
            if !ordering.is_some_and(accepts) {
                failures.push((value.clone(), detail(property.clone())));
            }
        }
    }
    failures
}

fn applies(constraints: &ConstraintSet) -> bool {
    !constraints.equals.is_empty()
        || !constraints.disjoint.is_empty()
        || !constraints.less_than.is_empty()
        || !constraints.less_than_or_equals.is_empty()
}

pub fn validate_property(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
) -> Vec<ValidationResult> {
    if !applies(&shape.constraints) {
        return Vec::new();
    }
    let values = shape.values(graph, focus);
    check(graph, &shape.constraints, focus, &values)
        .into_iter()
        .map(|(value, detail)| property_result(shape, focus, Some(&value), detail))
        .collect()
}

pub fn validate_node(graph: &Graph, focus: &Term, shape: &NodeShape) -> Vec<ValidationResult> {
    if !applies(&shape.constraints) {
        return Vec::new();
    }
    check(graph, &shape.constraints, focus, std::slice::from_ref(focus))
        .into_iter()
        .map(|(value, detail)| node_result(shape, focus, detail).with_value(value))
        .collect()
}
