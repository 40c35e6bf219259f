//! Value constraints: `sh:in`, `sh:hasValue` and the value range constraints.
//!
//! Membership uses RDF term equality. Ranges compare XSD values: a value that cannot be
//! compared with the bound (not a literal, ill-typed, unrelated datatype) fails.

use oxrdf::{Graph, Literal, Term};
use std::cmp::Ordering;

use super::{check_focus, check_values, node_result, property_result};
use crate::literal::compare;
use crate::model::{ConstraintSet, NodeShape, PropertyShape};
use crate::report::{ResultDetail, ValidationResult};

/// Checks one value against `sh:in` and the ranges.
pub fn check(constraints: &ConstraintSet, value: &Term) -> Vec<ResultDetail> {
    let mut failures = Vec::new();
    if let Some(allowed) = &constraints.in_values {
        if !allowed.contains(value) {
            failures.push(ResultDetail::In {
                allowed: allowed.clone(),
            });
        }
    }
    let ranges: [(
        &Option<Literal>,
        fn(Ordering) -> bool,
        fn(Literal) -> ResultDetail,
    ); 4] = [
        (
            &constraints.min_exclusive,
            Ordering::is_gt,
            |bound| ResultDetail::MinExclusive { bound },
        ),
        (
            &constraints.min_inclusive,
            Ordering::is_ge,
            |bound| ResultDetail::MinInclusive { bound },
        ),
        (
            &constraints.max_exclusive,
            Ordering::is_lt,
            |bound| ResultDetail::MaxExclusive { bound },
        ),
        (
            &constraints.max_inclusive,
            Ordering::is_le,
            |bound| ResultDetail::MaxInclusive { bound },
        ),
    ];
    for (bound, accepts, detail) in ranges {
        let Some(bound) = bound else {
            continue;
        };
        let ordering = match value {
            Term::Literal(literal) => compare(literal.as_ref(), bound.as_ref()),
            _ => None,
        };
        if !ordering.is_some_and(accepts) {
            failures.push(detail(bound.clone()));
        }
    }
    failures
}

fn applies(constraints: &ConstraintSet) -> bool {
    constraints.in_values.is_some()
        || constraints.min_exclusive.is_some()
        || constraints.min_inclusive.is_some()
        || constraints.max_exclusive.is_some()
        || constraints.max_inclusive.is_some()
}

pub fn validate_property(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
) -> Vec<ValidationResult> {
    let mut results = if applies(&shape.constraints) {
        check_values(graph, focus, shape, |value| check(&shape.constraints, value))
    } else {
        Vec::new()
    };
    if !shape.constraints.has_values.is_empty() {
        let values = shape.values(graph, focus);
        for expected in &shape.constraints.has_values {
            if !values.contains(expected) {
                results.push(property_result(
                    shape,
                    focus,
                    None,
                    ResultDetail::HasValue {
                        expected: expected.clone(),
                    },
                ));
            }
        }
    }
    results
}

pub fn validate_node(_graph: &Graph, focus: &Term, shape: &NodeShape) -> Vec<ValidationResult> {
    let mut results = if applies(&shape.constraints) {
        check_focus(focus, shape, |value| check(&shape.constraints, value))
    } else {
        Vec::new()
    };
    for expected in &shape.constraints.has_values {
        if expected != focus {
            results.push(node_result(
                shape,
                focus,
                ResultDetail::HasValue {
                    expected: expected.clone(),
                },
            ));
        }
    }
    results
}
