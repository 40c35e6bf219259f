//! Value type constraints: `sh:datatype`, `sh:class` and `sh:nodeKind`.

use oxrdf::{Graph, Term};

use super::{check_focus, check_values};
use crate::graph::has_type;
use crate::literal::is_well_formed;
use crate::model::{ConstraintSet, NodeShape, PropertyShape};
use crate::report::{ResultDetail, ValidationResult};

/// Checks one value.
///
/// Classes are matched through direct `rdf:type` edges only. A literal of the expected
/// datatype but with an invalid lexical form fails the datatype constraint.
pub fn check(graph: &Graph, constraints: &ConstraintSet, value: &Term) -> Vec<ResultDetail> {
    let mut failures = Vec::new();
    if let Some(expected) = &constraints.datatype {
        let detail = match value {
            Term::Literal(literal) if literal.datatype() == expected.as_ref() => {
                (!is_well_formed(literal.as_ref())).then(|| ResultDetail::Datatype {
                    expected: expected.clone(),
                    actual: Some(expected.clone()),
                    ill_typed: true,
                })
            }
            Term::Literal(literal) => Some(ResultDetail::Datatype {
                expected: expected.clone(),
                actual: Some(literal.datatype().into_owned()),
                ill_typed: false,
            }),
            _ => Some(ResultDetail::Datatype {
                expected: expected.clone(),
                actual: None,
                ill_typed: false,
            }),
        };
        failures.extend(detail);
    }
    for class in &constraints.classes {
        if !has_type(graph, value, class.as_ref()) {
            failures.push(ResultDetail::Class {
                expected: class.clone(),
            });
        }
    }
    if let Some(kind) = constraints.node_kind.filter(|kind| !kind.matches(value)) {
        failures.push(ResultDetail::NodeKind { expected: kind });
    }
    failures
}

fn applies(constraints: &ConstraintSet) -> bool {
    constraints.datatype.is_some()
        || !constraints.classes.is_empty()
        || constraints.node_kind.is_some()
}

pub fn validate_property(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
) -> Vec<ValidationResult> {
    if !applies(&shape.constraints) {
        return Vec::new();
    }
    check_values(graph, focus, shape, |value| {
        check(graph, &shape.constraints, value)
    })
}

pub fn validate_node(graph: &Graph, focus: &Term, shape: &NodeShape) -> Vec<ValidationResult> {
    if !applies(&shape.constraints) {
        return Vec::new();
    }
    check_focus(focus, shape, |value| check(graph, &shape.constraints, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_util::{ex, graph_with};
    use crate::model::NodeKind;
    use oxrdf::vocab::{rdf, rdfs, xsd};
    use oxrdf::{BlankNode, Literal, Triple};

    #[test]
    fn test_datatype() {
        let constraints = ConstraintSet {
            datatype: Some(xsd::INTEGER.into_owned()),
            ..ConstraintSet::default()
        };
        let graph = Graph::new();
        let ok: Term = Literal::new_typed_literal("12", xsd::INTEGER).into();
        let ill_typed: Term = Literal::new_typed_literal("twelve", xsd::INTEGER).into();
        let string: Term = Literal::new_simple_literal("12").into();
        assert!(check(&graph, &constraints, &ok).is_empty());
        assert!(matches!(
            check(&graph, &constraints, &ill_typed).as_slice(),
            [ResultDetail::Datatype { ill_typed: true, .. }]
        ));
        assert_eq!(
            check(&graph, &constraints, &string),
            vec![ResultDetail::Datatype {
                expected: xsd::INTEGER.into_owned(),
                actual: Some(xsd::STRING.into_owned()),
                ill_typed: false,
            }]
        );
        assert_eq!(check(&graph, &constraints, &ex("a").into()).len(), 1);
    }

    #[test]
    fn test_class_has_no_subclass_inference() {
        let mut graph = Graph::new();
        graph.insert(&Triple::new(ex("a"), rdf::TYPE, ex("Student")));
        graph.insert(&Triple::new(ex("Student"), rdfs::SUB_CLASS_OF, ex("Person")));
        let constraints = ConstraintSet {
            classes: vec![ex("Person")],
            ..ConstraintSet::default()
        };
        assert_eq!(
            check(&graph, &constraints, &ex("a").into()),
            vec![ResultDetail::Class {
                expected: ex("Person")
            }]
        );
    }

    #[test]
    fn test_node_and_property_levels_agree() {
        let constraints = ConstraintSet {
            node_kind: Some(NodeKind::Iri),
            ..ConstraintSet::default()
        };
        let graph = graph_with([Term::from(ex("o")), BlankNode::default().into()]);

        let property =
            PropertyShape::new(ex("S"), ex("p")).with_constraints(constraints.clone());
        let results = validate_property(&graph, &ex("s").into(), &property);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].value, Some(Term::BlankNode(_))));

        let node = NodeShape::new(ex("N")).with_constraints(constraints);
        assert!(validate_node(&graph, &ex("s").into(), &node).is_empty());
        let results = validate_node(&graph, &BlankNode::default().into(), &node);
        assert_eq!(results.len(), 1);
        assert!(results[0].result_path.is_none());
    }
}
