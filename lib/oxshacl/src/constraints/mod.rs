//! Primitive constraint components.
//!
//! Every module exposes `validate_property`, checking the value nodes of a property shape,
//! and, when the constraint makes sense on a single node, `validate_node`, checking the
//! focus node of a node shape. Both entry points call the same per-value check: they only
//! differ by the values checked and by the path attached to the results.

use oxrdf::{Graph, Term};

use crate::model::{NodeShape, PropertyShape};
use crate::report::{ResultDetail, ValidationResult};

pub mod cardinality;
pub mod closed;
pub mod pair;
pub mod qualified;
pub mod string;
pub mod types;
pub mod value;

/// Runs every primitive node level constraint of `shape` on `focus`.
pub fn validate_node(graph: &Graph, focus: &Term, shape: &NodeShape) -> Vec<ValidationResult> {
    let mut results = types::validate_node(graph, focus, shape);
    results.extend(string::validate_node(graph, focus, shape));
    results.extend(value::validate_node(graph, focus, shape));
    results.extend(pair::validate_node(graph, focus, shape));
    results.extend(closed::validate_node(graph, focus, shape));
    results
}

/// Runs every primitive constraint of `shape` on the values of `focus`.
pub fn validate_property(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
) -> Vec<ValidationResult> {
    let mut results = cardinality::validate_property(graph, focus, shape);
    results.extend(types::validate_property(graph, focus, shape));
    results.extend(string::validate_property(graph, focus, shape));
    results.extend(value::validate_property(graph, focus, shape));
    results.extend(qualified::validate_property(graph, focus, shape));
    results.extend(pair::validate_property(graph, focus, shape));
    results
}

/// Builds a node level result. The value is the focus node.
pub(crate) fn node_result(
    shape: &NodeShape,
    focus: &Term,
    detail: ResultDetail,
) -> ValidationResult {
    let message = shape
        .message
        .clone()
        .unwrap_or_else(|| detail.to_string());
    ValidationResult::new(focus.clone(), shape.id.clone(), detail)
        .with_value(focus.clone())
        .with_severity(shape.severity)
        .with_message(message)
}

/// Builds a property level result, carrying the shape path.
pub(crate) fn property_result(
    shape: &PropertyShape,
    focus: &Term,
    value: Option<&Term>,
    detail: ResultDetail,
) -> ValidationResult {
    let message = shape
        .message
        .clone()
        .unwrap_or_else(|| detail.to_string());
    let result = ValidationResult::new(focus.clone(), shape.id.clone(), detail)
        .with_path(shape.path.clone())
        .with_severity(shape.severity)
        .with_message(message);
    match value {
        Some(value) => result.with_value(value.clone()),
        None => result,
    }
}

/// Applies a per-value check to every value node of a property shape.
fn check_values<I: IntoIterator<Item = ResultDetail>>(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
    check: impl Fn(&Term) -> I,
) -> Vec<ValidationResult> {
    shape
        .values(graph, focus)
        .iter()
        .flat_map(|value| {
            check(value)
                .into_iter()
                .map(move |detail| property_result(shape, focus, Some(value), detail))
        })
        .collect()
}

/// Applies a per-value check to the focus node of a node shape.
fn check_focus<I: IntoIterator<Item = ResultDetail>>(
    focus: &Term,
    shape: &NodeShape,
    check: impl Fn(&Term) -> I,
) -> Vec<ValidationResult> {
    check(focus)
        .into_iter()
        .map(|detail| node_result(shape, focus, detail))
        .collect()
}
