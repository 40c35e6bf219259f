//! SHACL property paths.
//!
//! A path maps a focus node to its value nodes. Value nodes are returned in discovery order
//! without duplicates. Transitive paths keep a visited set and so terminate on cyclic data.

use oxrdf::{Graph, NamedNode, Term, TermRef};
use rustc_hash::FxHashSet;
use std::fmt;

use crate::error::ShaclParseError;
use crate::graph::{as_subject, object, read_list};
use crate::vocab::sh;

/// Maximal nesting of path expressions accepted by [`PropertyPath::parse`].
const MAX_PATH_NESTING: usize = 64;

/// A SHACL property path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    /// A single predicate.
    Predicate(NamedNode),
    /// Paths followed one after the other.
    Sequence(Vec<PropertyPath>),
    /// Union of the values of each path.
    Alternative(Vec<PropertyPath>),
    /// The path followed backwards.
    Inverse(Box<PropertyPath>),
    /// Zero or more repetitions.
    ZeroOrMore(Box<PropertyPath>),
    /// One or more repetitions.
    OneOrMore(Box<PropertyPath>),
    /// Zero or one occurrence.
    ZeroOrOne(Box<PropertyPath>),
}

impl PropertyPath {
    /// Creates a predicate path.
    pub fn predicate(predicate: impl Into<NamedNode>) -> Self {
        Self::Predicate(predicate.into())
    }

    /// Returns the predicate if this is a predicate path.
    pub fn as_predicate(&self) -> Option<&NamedNode> {
        match self {
            Self::Predicate(p) => Some(p),
            _ => None,
        }
    }

    /// Reads the path whose root is `term` in the shapes graph.
    pub fn parse(
        graph: &Graph,
        term: &Term,
        shape: &Term,
        max_list_length: usize,
    ) -> Result<Self, ShaclParseError> {
        parse_path(graph, term, shape, max_list_length, 0)
    }

    /// Computes the value nodes of `focus`.
    pub fn evaluate(&self, graph: &Graph, focus: &Term) -> Vec<Term> {
        let mut values = Vec::new();
        let mut seen = FxHashSet::default();
        for value in self.step(graph, focus) {
            if seen.insert(value.clone()) {
                values.push(value);
            }
        }
        values
    }

    fn step(&self, graph: &Graph, focus: &Term) -> Vec<Term> {
        match self {
            Self::Predicate(p) => match as_subject(focus) {
                Some(subject) => graph
                    .objects_for_subject_predicate(subject, p)
                    .map(TermRef::into_owned)
                    .collect(),
                None => Vec::new(),
            },
            Self::Inverse(inner) => match inner.as_ref() {
                Self::Predicate(p) => graph
                    .subjects_for_predicate_object(p, focus)
                    .map(|s| s.into_owned().into())
                    .collect(),
                _ => inverse_of(inner, graph, focus),
            },
            Self::Sequence(steps) => {
                let mut current = vec![focus.clone()];
                for step in steps {
                    let mut next = Vec::new();
                    let mut seen = FxHashSet::default();
                    for node in &current {
                        for value in step.step(graph, node) {
                            if seen.insert(value.clone()) {
                                next.push(value);
                            }
                        }
                    }
                    current = next;
                }
                current
            }
            Self::Alternative(alternatives) => alternatives
                .iter()
                .flat_map(|alternative| alternative.step(graph, focus))
                .collect(),
            Self::ZeroOrMore(inner) => closure(inner, graph, focus, true),
            Self::OneOrMore(inner) => closure(inner, graph, focus, false),
            Self::ZeroOrOne(inner) => {
                let mut values = vec![focus.clone()];
                values.extend(inner.step(graph, focus));
                values
            }
        }
    }
}

impl From<NamedNode> for PropertyPath {
    fn from(predicate: NamedNode) -> Self {
        Self::Predicate(predicate)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(p) => write!(f, "{p}"),
            Self::Sequence(steps) => write_joined(f, steps, " / "),
            Self::Alternative(alternatives) => write_joined(f, alternatives, " | "),
            Self::Inverse(inner) => write!(f, "^{inner}"),
            Self::ZeroOrMore(inner) => write!(f, "({inner})*"),
            Self::OneOrMore(inner) => write!(f, "({inner})+"),
            Self::ZeroOrOne(inner) => write!(f, "({inner})?"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    paths: &[PropertyPath],
    separator: &str,
) -> fmt::Result {
    f.write_str("(")?;
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{path}")?;
    }
    f.write_str(")")
}

/// Nodes reached by following `path` backwards from `focus`.
///
/// Only used for complex inverse paths: every subject of the graph is tried as a start node.
fn inverse_of(path: &PropertyPath, graph: &Graph, focus: &Term) -> Vec<Term> {
    let mut starts = FxHashSet::default();
    let mut values = Vec::new();
    for triple in graph {
        let start: Term = triple.subject.into_owned().into();
        if starts.insert(start.clone()) && path.step(graph, &start).contains(focus) {
            values.push(start);
        }
    }
    values
}

fn closure(path: &PropertyPath, graph: &Graph, focus: &Term, reflexive: bool) -> Vec<Term> {
    let mut values = Vec::new();
    let mut visited = FxHashSet::default();
    if reflexive {
        visited.insert(focus.clone());
        values.push(focus.clone());
    }
    let mut stack = vec![focus.clone()];
    while let Some(node) = stack.pop() {
        for next in path.step(graph, &node) {
            if visited.insert(next.clone()) {
                values.push(next.clone());
                stack.push(next);
            }
        }
    }
    values
}

fn parse_path(
    graph: &Graph,
    term: &Term,
    shape: &Term,
    max_list_length: usize,
    nesting: usize,
) -> Result<PropertyPath, ShaclParseError> {
    if nesting > MAX_PATH_NESTING {
        return Err(ShaclParseError::invalid_property_path(
            shape.clone(),
            format!("path expressions are nested more than {MAX_PATH_NESTING} times"),
        ));
    }
    let blank = match term {
        Term::NamedNode(n) => return Ok(PropertyPath::Predicate(n.clone())),
        Term::BlankNode(_) => term,
        _ => {
            return Err(ShaclParseError::invalid_property_path(
                shape.clone(),
                format!("{term} is not a valid path"),
            ));
        }
    };
    let nested = |inner: Term| parse_path(graph, &inner, shape, max_list_length, nesting + 1);

    if let Some(list) = object(graph, blank, sh::ALTERNATIVE_PATH) {
        let alternatives = read_list(graph, &list, shape, max_list_length)?
            .into_iter()
            .map(nested)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(PropertyPath::Alternative(alternatives));
    }
    if let Some(inner) = object(graph, blank, sh::INVERSE_PATH) {
        return Ok(PropertyPath::Inverse(Box::new(nested(inner)?)));
    }
    if let Some(inner) = object(graph, blank, sh::ZERO_OR_MORE_PATH) {
        return Ok(PropertyPath::ZeroOrMore(Box::new(nested(inner)?)));
    }
    if let Some(inner) = object(graph, blank, sh::ONE_OR_MORE_PATH) {
        return Ok(PropertyPath::OneOrMore(Box::new(nested(inner)?)));
    }
    if let Some(inner) = object(graph, blank, sh::ZERO_OR_ONE_PATH) {
        return Ok(PropertyPath::ZeroOrOne(Box::new(nested(inner)?)));
    }
    let steps = read_list(graph, blank, shape, max_list_length)?;
    if steps.len() < 2 {
        return Err(ShaclParseError::invalid_property_path(
            shape.clone(),
            "a sequence path needs at least two members",
        ));
    }
    Ok(PropertyPath::Sequence(
        steps.into_iter().map(nested).collect::<Result<_, _>>()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::Triple;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new(format!("http://example.org/{name}")).unwrap()
    }

    fn chain() -> Graph {
        let mut graph = Graph::new();
        graph.insert(&Triple::new(ex("a"), ex("next"), ex("b")));
        graph.insert(&Triple::new(ex("b"), ex("next"), ex("c")));
        graph.insert(&Triple::new(ex("c"), ex("next"), ex("a")));
        graph
    }

    #[test]
    fn test_predicate_path() {
        let graph = chain();
        let path = PropertyPath::predicate(ex("next"));
        assert_eq!(path.evaluate(&graph, &ex("a").into()), vec![Term::from(ex("b"))]);
    }

    #[test]
    fn test_inverse_path() {
        let graph = chain();
        let path = PropertyPath::Inverse(Box::new(PropertyPath::predicate(ex("next"))));
        assert_eq!(path.evaluate(&graph, &ex("a").into()), vec![Term::from(ex("c"))]);
    }

    #[test]
    fn test_sequence_path() {
        let graph = chain();
        let next = PropertyPath::predicate(ex("next"));
        let path = PropertyPath::Sequence(vec![next.clone(), next]);
        assert_eq!(path.evaluate(&graph, &ex("a").into()), vec![Term::from(ex("c"))]);
    }

    #[test]
    fn test_closure_terminates_on_cycles() {
        let graph = chain();
        let path = PropertyPath::OneOrMore(Box::new(PropertyPath::predicate(ex("next"))));
        let values = path.evaluate(&graph, &ex("a").into());
        assert_eq!(values.len(), 3);
        assert!(values.contains(&ex("a").into()));
    }

    #[test]
    fn test_parse_inverse_path() {
        let mut graph = Graph::new();
        let root = oxrdf::BlankNode::default();
        graph.insert(&Triple::new(root.clone(), sh::INVERSE_PATH, ex("parent")));
        let shape: Term = ex("Shape").into();
        let path = PropertyPath::parse(&graph, &root.into(), &shape, 10).unwrap();
        assert_eq!(
            path,
            PropertyPath::Inverse(Box::new(PropertyPath::predicate(ex("parent"))))
        );
    }

    #[test]
    fn test_literal_is_not_a_path() {
        let graph = Graph::new();
        let shape: Term = ex("Shape").into();
        let literal: Term = oxrdf::Literal::new_simple_literal("p").into();
        assert!(matches!(
            PropertyPath::parse(&graph, &literal, &shape, 10),
            Err(ShaclParseError::InvalidPropertyPath { .. })
        ));
    }
}
