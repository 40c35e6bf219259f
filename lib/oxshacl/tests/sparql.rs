//! SPARQL based constraints evaluated with the built-in engine.
#![cfg(feature = "sparql")]

use oxrdf::{Graph, Literal, NamedNode, Term, Triple};
use oxrdfio::{RdfFormat, RdfParser};
use oxshacl::{
    ConstraintComponent, QueryError, ResultDetail, Severity, ShaclParseError, ShaclValidator,
    ShapesGraph, ValidationReport, ValidatorOptions,
};
use std::time::{Duration, Instant};

const PREFIXES: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.org/> .

ex: sh:declare [ sh:prefix "ex" ; sh:namespace "http://example.org/"^^xsd:anyURI ] .
"#;

fn parse_turtle(turtle: &str) -> Graph {
    let mut graph = Graph::new();
    for quad in RdfParser::from_format(RdfFormat::Turtle)
        .for_reader(format!("{PREFIXES}{turtle}").as_bytes())
    {
        graph.insert(quad.expect("invalid Turtle").as_ref());
    }
    graph
}

fn validate(shapes: &str, data: &str) -> ValidationReport {
    let shapes = ShapesGraph::from_graph(&parse_turtle(shapes)).expect("invalid shapes");
    ShaclValidator::new(shapes)
        .validate(&parse_turtle(data))
        .expect("validation failed")
}

fn ex(name: &str) -> NamedNode {
    NamedNode::new(format!("http://example.org/{name}")).unwrap()
}

#[test]
fn test_select_constraint() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:sparql [
                sh:prefixes ex: ;
                sh:message "Negative age {?value}" ;
                sh:select """
                    SELECT $this ?value WHERE {
                        $this ex:age ?value .
                        FILTER(?value < 0)
                    }
                """
            ] .
    "#;
    let report = validate(
        shapes,
        r"
        ex:alice a ex:Person ; ex:age 30 .
        ex:bob a ex:Person ; ex:age -5 .
    ",
    );
    assert_eq!(report.len(), 1);
    let result = &report.results()[0];
    assert_eq!(result.focus_node, ex("bob").into());
    assert_eq!(result.value, Some(Literal::from(-5).into()));
    assert_eq!(result.message.as_deref(), Some("Negative age -5"));
    assert!(result.result_path.is_none());
    assert_eq!(
        result.source_constraint_component(),
        ConstraintComponent::Sparql
    );
}

#[test]
fn test_focus_is_projected_implicitly() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:sparql [
                sh:prefixes ex: ;
                sh:select "SELECT ?friend WHERE { $this ex:knows ?friend . FILTER NOT EXISTS { ?friend a ex:Person } }"
            ] .
    "#;
    let report = validate(
        shapes,
        r"
        ex:alice a ex:Person ; ex:knows ex:bob, ex:rex .
        ex:bob a ex:Person .
    ",
    );
    assert_eq!(report.len(), 1);
    let ResultDetail::Sparql { rows } = &report.results()[0].detail else {
        panic!("unexpected result {:?}", report.results()[0]);
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("friend"), Some(&Term::from(ex("rex"))));
    // Without ?value, the value is the focus node
    assert_eq!(report.results()[0].value, Some(ex("alice").into()));
}

#[test]
fn test_deactivated_constraint() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:sparql [
                sh:deactivated true ;
                sh:select "SELECT $this WHERE { $this a ?type }"
            ] .
    "#;
    assert!(validate(shapes, "ex:alice a ex:Person .").conforms());
}

#[test]
fn test_malformed_query_is_reported() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:severity sh:Warning ;
            sh:sparql [ sh:select "SELECT $this WHERE { $this ex:age" ] .
    "#;
    let report = validate(shapes, "ex:alice a ex:Person . ex:bob a ex:Person .");
    // Each focus node gets its own failure, the run itself completes
    assert_eq!(report.len(), 2);
    assert!(report.conforms());
    for result in report.results() {
        assert_eq!(result.severity, Severity::Warning);
        assert!(matches!(
            result.detail,
            ResultDetail::QueryFailure {
                error: QueryError::Syntax(_)
            }
        ));
    }
}

#[test]
fn test_ask_query_is_unsupported() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetNode ex:alice ;
            sh:sparql [ sh:select "ASK { $this ?p ?o }" ] .
    "#;
    let report = validate(shapes, "ex:alice a ex:Person .");
    assert_eq!(report.len(), 1);
    assert!(!report.conforms());
    assert!(matches!(
        report.results()[0].detail,
        ResultDetail::QueryFailure {
            error: QueryError::Unsupported(_)
        }
    ));
}

#[test]
fn test_missing_focus_placeholder() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetNode ex:alice ;
            sh:sparql [ sh:select "SELECT ?s WHERE { ?s ?p ?o }" ] .
    "#;
    assert!(matches!(
        ShapesGraph::from_graph(&parse_turtle(shapes)),
        Err(ShaclParseError::MissingPlaceholder { .. })
    ));
}

#[test]
fn test_slow_query_is_interrupted() {
    let shapes = r#"
        ex:Shape a sh:NodeShape ;
            sh:targetNode ex:s0 ;
            sh:sparql [ sh:select """
                SELECT $this WHERE {
                    ?a ?b ?c . ?d ?e ?f . ?g ?h ?i .
                    FILTER(STR(?a) = CONCAT(STR(?d), STR(?g), "z"))
                }
            """ ] .
    "#;
    let mut data = Graph::new();
    for i in 0..200 {
        data.insert(&Triple::new(
            ex(&format!("s{i}")),
            ex("p"),
            Literal::from(i),
        ));
    }
    let timeout = Duration::from_millis(20);
    let start = Instant::now();
    let report = ShaclValidator::new(ShapesGraph::from_graph(&parse_turtle(shapes)).unwrap())
        .with_options(ValidatorOptions::default().with_query_timeout(timeout))
        .validate(&data)
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(report.len(), 1);
    assert_eq!(
        report.results()[0].detail,
        ResultDetail::QueryFailure {
            error: QueryError::Timeout(timeout)
        }
    );
}
