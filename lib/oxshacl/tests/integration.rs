//! End to end validation of Turtle data against Turtle shapes.

use oxrdf::vocab::rdf;
use oxrdf::{Graph, Literal, NamedNode, Term};
use oxrdfio::{RdfFormat, RdfParser};
use oxshacl::vocab::sh;
use oxshacl::{
    ConstraintComponent, PropertyPath, ResultDetail, ShaclValidator, ShapeId, ShapesGraph,
    ValidationReport,
};

const PREFIXES: &str = r"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.org/> .
";

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

fn focus_nodes(report: &ValidationReport) -> Vec<Term> {
    let mut nodes = report
        .results()
        .iter()
        .map(|r| r.focus_node.clone())
        .collect::<Vec<_>>();
    nodes.sort_by_key(ToString::to_string);
    nodes
}

#[test]
fn test_empty_shapes_graph() {
    let report = ShaclValidator::new(ShapesGraph::new())
        .validate(&parse_turtle("ex:alice a ex:Person ."))
        .unwrap();
    assert!(report.conforms());
    assert!(report.is_empty());
}

#[test]
fn test_target_class_min_count() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:name ; sh:minCount 1 ] .
    ";
    assert!(validate(shapes, r#"ex:alice a ex:Person ; ex:name "Alice" ."#).conforms());

    let report = validate(shapes, "ex:alice a ex:Person .");
    assert!(!report.conforms());
    assert_eq!(report.violation_count(), 1);
    let result = &report.results()[0];
    assert_eq!(result.focus_node, ex("alice").into());
    assert_eq!(result.result_path, Some(PropertyPath::Predicate(ex("name"))));
    assert!(result.value.is_none());
    assert!(matches!(result.source_shape, ShapeId::Blank(_)));
    assert_eq!(
        result.source_constraint_component(),
        ConstraintComponent::MinCount
    );
}

#[test]
fn test_other_targets() {
    let shapes = r"
        ex:NodeTarget a sh:NodeShape ; sh:targetNode ex:alice ; sh:class ex:Person .
        ex:SubjectsTarget a sh:NodeShape ; sh:targetSubjectsOf ex:knows ; sh:class ex:Person .
        ex:ObjectsTarget a sh:NodeShape ; sh:targetObjectsOf ex:knows ; sh:class ex:Person .
    ";
    let report = validate(
        shapes,
        r"
        ex:alice ex:knows ex:bob .
        ex:bob a ex:Person .
    ",
    );
    assert_eq!(report.len(), 2);
    assert_eq!(
        focus_nodes(&report),
        [Term::from(ex("alice")), ex("alice").into()]
    );
}

#[test]
fn test_implicit_class_target() {
    let shapes = r"
        ex:Person a sh:NodeShape, rdfs:Class ;
            sh:property [ sh:path ex:name ; sh:minCount 1 ] .
    ";
    let report = validate(shapes, "ex:alice a ex:Person . ex:bob a ex:Robot .");
    assert_eq!(focus_nodes(&report), [Term::from(ex("alice"))]);
}

#[test]
fn test_no_subclass_inference() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ; sh:targetClass ex:Person ; sh:nodeKind sh:BlankNode .
    ";
    let report = validate(shapes, "ex:Student rdfs:subClassOf ex:Person . ex:alice a ex:Student .");
    assert!(report.conforms());
}

#[test]
fn test_datatype() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:age ; sh:datatype xsd:integer ] .
    ";
    let report = validate(
        shapes,
        r#"
        ex:a a ex:Person ; ex:age 42 .
        ex:b a ex:Person ; ex:age "forty"^^xsd:integer .
        ex:c a ex:Person ; ex:age "42" .
    "#,
    );
    assert_eq!(
        focus_nodes(&report),
        [Term::from(ex("b")), ex("c").into()]
    );
}

#[test]
fn test_string_constraints() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [
                sh:path ex:name ;
                sh:pattern "^[a-z]+$" ;
                sh:flags "i" ;
                sh:minLength 3 ;
                sh:maxLength 8
            ] .
    "#;
    let report = validate(
        shapes,
        r#"
        ex:a a ex:Person ; ex:name "Alice" .
        ex:b a ex:Person ; ex:name "Al1ce" .
        ex:c a ex:Person ; ex:name "Al" .
        ex:d a ex:Person ; ex:name "Bartholomew" .
    "#,
    );
    assert_eq!(report.len(), 3);
    let components = report
        .results()
        .iter()
        .map(|r| (r.focus_node.to_string(), r.source_constraint_component()))
        .collect::<Vec<_>>();
    assert!(components.contains(&(ex("b").to_string(), ConstraintComponent::Pattern)));
    assert!(components.contains(&(ex("c").to_string(), ConstraintComponent::MinLength)));
    assert!(components.contains(&(ex("d").to_string(), ConstraintComponent::MaxLength)));
}

#[test]
fn test_languages() {
    let shapes = r#"
        ex:LanguageShape a sh:NodeShape ;
            sh:targetSubjectsOf ex:label ;
            sh:property [ sh:path ex:label ; sh:languageIn ( "en" "fr" ) ; sh:uniqueLang true ] .
    "#;
    let report = validate(
        shapes,
        r#"ex:a ex:label "colour"@en-GB, "color"@en-US, "Farbe"@de ."#,
    );
    assert_eq!(report.len(), 1);
    assert_eq!(
        report.results()[0].source_constraint_component(),
        ConstraintComponent::LanguageIn
    );

    let report = validate(shapes, r#"ex:a ex:label "colour"@en, "color"@en, "couleur"@fr ."#);
    assert_eq!(report.len(), 1);
    assert_eq!(
        report.results()[0].detail,
        ResultDetail::UniqueLang {
            language: "en".into()
        }
    );
}

#[test]
fn test_value_ranges() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:age ; sh:minInclusive 0 ; sh:maxExclusive 150 ] .
    ";
    let report = validate(
        shapes,
        r#"
        ex:a a ex:Person ; ex:age 30 .
        ex:b a ex:Person ; ex:age 150 .
        ex:c a ex:Person ; ex:age -1.5 .
        ex:d a ex:Person ; ex:age "old" .
        ex:e a ex:Person ; ex:age 1.0e2 .
    "#,
    );
    assert_eq!(
        focus_nodes(&report),
        [
            Term::from(ex("b")),
            ex("c").into(),
            ex("d").into(),
            ex("d").into()
        ]
    );
    // A string is comparable with neither bound
    let mut components = report
        .results()
        .iter()
        .filter(|r| r.focus_node == ex("d").into())
        .map(|r| r.source_constraint_component().to_string())
        .collect::<Vec<_>>();
    components.sort();
    assert_eq!(
        components,
        ["MaxExclusiveConstraintComponent", "MinInclusiveConstraintComponent"]
    );
}

#[test]
fn test_malformed_count_does_not_discard_other_shapes() {
    let shapes = r#"
        ex:GoodShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:name ; sh:minCount 1 ] .
        ex:BadShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:email ; sh:minCount "lots" ; sh:maxCount 1 ] .
    "#;
    let report = validate(
        shapes,
        r#"ex:alice a ex:Person ; ex:email "a@example.org", "b@example.org" ."#,
    );
    let mut components = report
        .results()
        .iter()
        .map(|r| r.source_constraint_component())
        .collect::<Vec<_>>();
    components.sort_by_key(ToString::to_string);
    assert_eq!(
        components,
        [ConstraintComponent::MaxCount, ConstraintComponent::MinCount]
    );
}

#[test]
fn test_in_and_has_value() {
    let shapes = r"
        ex:ColorShape a sh:NodeShape ;
            sh:targetClass ex:Car ;
            sh:property [ sh:path ex:color ; sh:in ( ex:Red ex:Green ) ] ;
            sh:property [ sh:path ex:brand ; sh:hasValue ex:Acme ] .
    ";
    let report = validate(
        shapes,
        r"
        ex:a a ex:Car ; ex:color ex:Red ; ex:brand ex:Acme .
        ex:b a ex:Car ; ex:color ex:Blue ; ex:brand ex:Acme, ex:Other .
        ex:c a ex:Car ; ex:color ex:Green .
    ",
    );
    assert_eq!(report.len(), 2);
    let blue = report
        .results()
        .iter()
        .find(|r| r.source_constraint_component() == ConstraintComponent::In)
        .unwrap();
    assert_eq!(blue.focus_node, ex("b").into());
    assert_eq!(blue.value, Some(ex("Blue").into()));
    let missing_brand = report
        .results()
        .iter()
        .find(|r| r.source_constraint_component() == ConstraintComponent::HasValue)
        .unwrap();
    assert_eq!(missing_brand.focus_node, ex("c").into());
    assert!(missing_brand.value.is_none());
}

#[test]
fn test_property_pairs() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:givenName ; sh:equals ex:firstName ] ;
            sh:property [ sh:path ex:start ; sh:lessThan ex:end ] .
    ";
    let report = validate(
        shapes,
        r#"
        ex:a a ex:Person ; ex:givenName "A" ; ex:firstName "A" ;
            ex:start "2020-01-01"^^xsd:date ; ex:end "2021-01-01"^^xsd:date .
        ex:b a ex:Person ; ex:givenName "B" ; ex:firstName "C" ;
            ex:start "2022-01-01"^^xsd:date ; ex:end "2021-01-01"^^xsd:date .
    "#,
    );
    assert_eq!(focus_nodes(&report), vec![Term::from(ex("b")); 3]);
}

#[test]
fn test_closed() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:closed true ;
            sh:ignoredProperties ( rdf:type ) ;
            sh:property [ sh:path ex:name ] .
    ";
    let report = validate(shapes, r#"ex:a a ex:Person ; ex:name "A" ; ex:age 3 ."#);
    assert_eq!(report.len(), 1);
    let result = &report.results()[0];
    assert_eq!(result.result_path, Some(PropertyPath::Predicate(ex("age"))));
    assert_eq!(result.value, Some(Literal::from(3).into()));
}

#[test]
fn test_qualified_value_shape() {
    let shapes = r"
        ex:CarShape a sh:NodeShape ;
            sh:targetClass ex:Car ;
            sh:property [
                sh:path ex:part ;
                sh:qualifiedValueShape [ sh:class ex:Wheel ] ;
                sh:qualifiedMinCount 4 ;
                sh:qualifiedMaxCount 4
            ] .
    ";
    let report = validate(
        shapes,
        r"
        ex:car a ex:Car ; ex:part ex:w1, ex:w2, ex:w3, ex:seat .
        ex:w1 a ex:Wheel . ex:w2 a ex:Wheel . ex:w3 a ex:Wheel . ex:seat a ex:Seat .
    ",
    );
    assert_eq!(report.len(), 1);
    assert_eq!(
        report.results()[0].detail,
        ResultDetail::QualifiedMinCount {
            class: ex("Wheel"),
            min: 4,
            actual: 3
        }
    );
}

#[test]
fn test_complex_paths() {
    let shapes = r"
        ex:ParentShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path [ sh:inversePath ex:parent ] ; sh:minCount 1 ] ;
            sh:property [ sh:path ( ex:address ex:city ) ; sh:maxCount 1 ] ;
            sh:property [ sh:path [ sh:alternativePath ( ex:phone ex:email ) ] ; sh:minCount 1 ] .
    ";
    let report = validate(
        shapes,
        r#"
        ex:a a ex:Person ; ex:phone "1" ; ex:address [ ex:city ex:Paris ] .
        ex:b a ex:Person ; ex:parent ex:a ; ex:email "b@example.org" ;
            ex:address [ ex:city ex:Paris ], [ ex:city ex:Lyon ] .
    "#,
    );
    assert_eq!(report.len(), 2);
    let paths = report
        .results()
        .iter()
        .map(|r| r.result_path.clone())
        .collect::<Vec<_>>();
    assert!(paths.contains(&Some(PropertyPath::Inverse(Box::new(
        PropertyPath::Predicate(ex("parent"))
    )))));
    assert!(paths.contains(&Some(PropertyPath::Sequence(vec![
        PropertyPath::Predicate(ex("address")),
        PropertyPath::Predicate(ex("city")),
    ]))));
}

#[test]
fn test_severity_and_conformance() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:name ; sh:minCount 1 ; sh:severity sh:Warning ] ;
            sh:property [ sh:path ex:email ; sh:minCount 1 ; sh:severity sh:Info ] .
    ";
    let report = validate(shapes, "ex:a a ex:Person .");
    assert!(report.conforms());
    assert_eq!(report.warning_count(), 1);
    assert_eq!(report.info_count(), 1);
    assert_eq!(report.violation_count(), 0);
}

#[test]
fn test_deactivated_shape() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:deactivated true ;
            sh:property [ sh:path ex:name ; sh:minCount 1 ] .
    ";
    assert!(validate(shapes, "ex:a a ex:Person .").is_empty());
}

#[test]
fn test_custom_message() {
    let shapes = r#"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:name ; sh:minCount 1 ; sh:message "A name is required" ] .
    "#;
    let report = validate(shapes, "ex:a a ex:Person .");
    assert_eq!(
        report.results()[0].message.as_deref(),
        Some("A name is required")
    );
}

#[test]
fn test_report_graph() {
    let shapes = r"
        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:nodeKind sh:BlankNode ;
            sh:property [ sh:path ex:name ; sh:minCount 1 ] .
    ";
    let report = validate(shapes, "ex:a a ex:Person .");
    assert_eq!(report.len(), 2);
    let graph = report.to_graph();

    let report_node = graph
        .subjects_for_predicate_object(rdf::TYPE, sh::VALIDATION_REPORT)
        .next()
        .unwrap();
    assert_eq!(
        graph.object_for_subject_predicate(report_node, sh::CONFORMS),
        Some(Literal::from(false).as_ref().into())
    );
    assert_eq!(graph.triples_for_predicate(sh::RESULT).count(), 2);
    assert_eq!(graph.triples_for_predicate(sh::FOCUS_NODE).count(), 2);
    assert_eq!(graph.triples_for_predicate(sh::RESULT_SEVERITY).count(), 2);
    // Only the property result has a path, only the node result has a value
    assert_eq!(graph.triples_for_predicate(sh::RESULT_PATH).count(), 1);
    assert_eq!(graph.triples_for_predicate(sh::VALUE).count(), 1);
}
