use codspeed_criterion_compat::{
    BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Graph, Literal, NamedNode, Triple};
use oxshacl::{
    ConstraintSet, LogicalConstraints, NodeShape, PropertyShape, ShaclValidator, ShapesGraph,
    Target, ValidatorOptions,
};

fn ex(name: &str) -> NamedNode {
    NamedNode::new(format!("http://example.org/{name}")).unwrap()
}

/// People must have one string name and an age in [0, 150].
fn person_shapes() -> ShapesGraph {
    let shape = NodeShape::new(ex("PersonShape"))
        .with_target(Target::Class(ex("Person")))
        .with_property(
            PropertyShape::new(ex("NameShape"), ex("name")).with_constraints(ConstraintSet {
                min_count: Some(1),
                max_count: Some(1),
                datatype: Some(xsd::STRING.into_owned()),
                ..ConstraintSet::default()
            }),
        )
        .with_property(
            PropertyShape::new(ex("AgeShape"), ex("age")).with_constraints(ConstraintSet {
                min_inclusive: Some(Literal::from(0)),
                max_inclusive: Some(Literal::from(150)),
                ..ConstraintSet::default()
            }),
        );
    ShapesGraph::from_iter([shape])
}

/// The same constraints behind `sh:xone` references.
fn combinator_shapes() -> ShapesGraph {
    let mut shapes = ShapesGraph::new();
    shapes.add_node_shape(
        NodeShape::new(ex("PersonShape"))
            .with_target(Target::Class(ex("Person")))
            .with_logic(
                LogicalConstraints::default()
                    .with_xone([ex("Named").into(), ex("Anonymous").into()]),
            ),
    );
    shapes.add_node_shape(NodeShape::new(ex("Named")).with_property(
        PropertyShape::new(ex("NamedName"), ex("name")).with_constraints(ConstraintSet {
            min_count: Some(1),
            ..ConstraintSet::default()
        }),
    ));
    shapes.add_node_shape(NodeShape::new(ex("Anonymous")).with_property(
        PropertyShape::new(ex("AnonymousName"), ex("name")).with_constraints(ConstraintSet {
            max_count: Some(0),
            ..ConstraintSet::default()
        }),
    ));
    shapes
}

fn data(people: u32, noise: u32) -> Graph {
    let mut graph = Graph::new();
    for i in 0..people {
        let person = ex(&format!("person{i}"));
        graph.insert(&Triple::new(person.clone(), rdf::TYPE, ex("Person")));
        graph.insert(&Triple::new(
            person.clone(),
            ex("name"),
            Literal::new_simple_literal(format!("Person {i}")),
        ));
        graph.insert(&Triple::new(person, ex("age"), Literal::from(i % 200)));
    }
    for i in 0..noise {
        let thing = ex(&format!("thing{i}"));
        graph.insert(&Triple::new(thing.clone(), rdf::TYPE, ex("Thing")));
        graph.insert(&Triple::new(
            thing,
            ex("value"),
            Literal::new_simple_literal(format!("Thing {i}")),
        ));
    }
    graph
}

fn validation_vs_graph_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation vs graph size");
    let validator = ShaclValidator::new(person_shapes());
    for noise in [0, 1_000, 10_000] {
        let graph = data(10, noise);
        group.throughput(Throughput::Elements(graph.len().try_into().unwrap()));
        group.bench_with_input(BenchmarkId::from_parameter(graph.len()), &graph, |b, g| {
            b.iter(|| validator.validate(black_box(g)).unwrap());
        });
    }
    group.finish();
}

fn validation_vs_focus_nodes(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation vs focus nodes");
    for (name, shapes) in [
        ("primitive", person_shapes()),
        ("xone", combinator_shapes()),
    ] {
        for parallel in [false, true] {
            let validator = ShaclValidator::new(shapes.clone())
                .with_options(ValidatorOptions::new().with_parallel(parallel));
            for people in [100, 1_000] {
                let graph = data(people, 0);
                group.throughput(Throughput::Elements(people.into()));
                group.bench_with_input(
                    BenchmarkId::new(
                        format!("{name} {}", if parallel { "parallel" } else { "sequential" }),
                        people,
                    ),
                    &graph,
                    |b, g| b.iter(|| validator.validate(black_box(g)).unwrap()),
                );
            }
        }
    }
    group.finish();
}

criterion_group!(benches, validation_vs_graph_size, validation_vs_focus_nodes);
criterion_main!(benches);
