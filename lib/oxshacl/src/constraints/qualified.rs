//! `sh:qualifiedValueShape` with `sh:qualifiedMinCount` and `sh:qualifiedMaxCount`.

use oxrdf::{Graph, Term};

use super::property_result;
use crate::graph::has_type;
use crate::model::{PropertyShape, QualifiedConstraint};
use crate::report::{ResultDetail, ValidationResult};

/// Checks the number of values that are direct instances of the qualifying class.
pub fn check(
    graph: &Graph,
    qualified: &QualifiedConstraint,
    values: &[Term],
) -> Vec<ResultDetail> {
    let count = values
        .iter()
        .filter(|value| has_type(graph, value, qualified.class.as_ref()))
        .count();
    let actual = u64::try_from(count).unwrap_or(u64::MAX);
    let mut failures = Vec::new();
    if let Some(min) = qualified.min_count.filter(|min| actual < *min) {
        failures.push(ResultDetail::QualifiedMinCount {
            class: qualified.class.clone(),
            min,
            actual: count,
        });
    }
    if let Some(max) = qualified.max_count.filter(|max| actual > *max) {
        failures.push(ResultDetail::QualifiedMaxCount {
            class: qualified.class.clone(),
            max,
            actual: count,
        });
    }
    failures
}

pub fn validate_property(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
) -> Vec<ValidationResult> {
    let Some(qualified) = &shape.constraints.qualified else {
        return Vec::new();
    };
    let values = shape.values(graph, focus);
    check(graph, qualified, &values)
        .into_iter()
        .map(|detail| property_result(shape, focus, None, detail))
        .collect()
}
