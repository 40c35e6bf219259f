//! `sh:minCount` and `sh:maxCount`.

use oxrdf::{Graph, Term};

use super::property_result;
use crate::model::{ConstraintSet, PropertyShape};
use crate::report::{ResultDetail, ValidationResult};

/// Checks a number of values against the bounds, both inclusive.
pub fn check(constraints: &ConstraintSet, count: usize) -> Vec<ResultDetail> {
    let actual = u64::try_from(count).unwrap_or(u64::MAX);
    let mut failures = Vec::new();
    if let Some(min) = constraints.min_count.filter(|min| actual < *min) {
        failures.push(ResultDetail::MinCount { min, actual: count });
    }
    if let Some(max) = constraints.max_count.filter(|max| actual > *max) {
        failures.push(ResultDetail::MaxCount { max, actual: count });
    }
    failures
}

pub fn validate_property(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
) -> Vec<ValidationResult> {
    if shape.constraints.min_count.is_none() && shape.constraints.max_count.is_none() {
        return Vec::new();
    }
    let count = shape.values(graph, focus).len();
    check(&shape.constraints, count)
        .into_iter()
        .map(|detail| property_result(shape, focus, None, detail))
        .collect()
}
