//! `sh:closed` and `sh:ignoredProperties`.

use oxrdf::{Graph, NamedNode, NamedNodeRef, Term};

use super::node_result;
use crate::graph::as_subject;
use crate::model::NodeShape;
use crate::path::PropertyPath;
use crate::report::{ResultDetail, ValidationResult};

/// Properties allowed on the focus nodes of a closed shape: the predicates of its
/// property shapes plus the ignored ones.
fn allowed_properties<'a>(
    shape: &'a NodeShape,
    ignored: &'a [NamedNode],
) -> Vec<NamedNodeRef<'a>> {
    shape
        .properties
        .iter()
        .filter_map(|property| property.path.as_predicate())
        .chain(ignored)
        .map(NamedNode::as_ref)
        .collect()
}

/// One result per triple of `focus` whose predicate is not allowed. The value is the
/// triple object and the path its predicate.
pub fn validate_node(graph: &Graph, focus: &Term, shape: &NodeShape) -> Vec<ValidationResult> {
    let (Some(ignored), Some(subject)) = (&shape.closed, as_subject(focus)) else {
        return Vec::new();
    };
    let allowed = allowed_properties(shape, ignored);
    graph
        .triples_for_subject(subject)
        .filter(|triple| !allowed.contains(&triple.predicate))
        .map(|triple| {
            let property = triple.predicate.into_owned();
            node_result(
                shape,
                focus,
                ResultDetail::Closed {
                    property: property.clone(),
                },
            )
            .with_path(PropertyPath::Predicate(property))
            .with_value(triple.object.into_owned())
        })
        .collect()
}
