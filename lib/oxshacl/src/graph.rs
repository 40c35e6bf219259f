//! Lookups over the data and shapes graphs.

use oxrdf::vocab::rdf;
use oxrdf::{Graph, NamedNodeRef, NamedOrBlankNodeRef, Term, TermRef};
use rustc_hash::FxHashSet;

use crate::error::ShaclParseError;

/// Default maximal number of elements read from an RDF list.
pub const DEFAULT_MAX_LIST_LENGTH: usize = 1000;

/// Returns the term as a triple subject, if it can be one.
pub(crate) fn as_subject(term: &Term) -> Option<NamedOrBlankNodeRef<'_>> {
    match term {
        Term::NamedNode(n) => Some(NamedOrBlankNodeRef::NamedNode(n.as_ref())),
        Term::BlankNode(b) => Some(NamedOrBlankNodeRef::BlankNode(b.as_ref())),
        _ => None,
    }
}

/// Objects of the triples `term predicate ?o`, in graph order.
pub(crate) fn objects(graph: &Graph, term: &Term, predicate: NamedNodeRef<'_>) -> Vec<Term> {
    match as_subject(term) {
        Some(subject) => graph
            .objects_for_subject_predicate(subject, predicate)
            .map(TermRef::into_owned)
            .collect(),
        None => Vec::new(),
    }
}

/// Object of one triple `term predicate ?o`, if any.
pub(crate) fn object(graph: &Graph, term: &Term, predicate: NamedNodeRef<'_>) -> Option<Term> {
    graph
        .object_for_subject_predicate(as_subject(term)?, predicate)
        .map(TermRef::into_owned)
}

/// Is `term` a direct instance of `class` (`term rdf:type class`)?
///
/// Class hierarchies are not followed.
pub(crate) fn has_type(graph: &Graph, term: &Term, class: NamedNodeRef<'_>) -> bool {
    as_subject(term).is_some_and(|subject| {
        graph
            .objects_for_subject_predicate(subject, rdf::TYPE)
            .any(|t| t == TermRef::NamedNode(class))
    })
}

/// Reads the RDF list starting at `head`.
///
/// At most `max_length` elements are read and cycles are detected, so a malicious list
/// cannot make this loop. `shape` is only used to build errors.
pub(crate) fn read_list(
    graph: &Graph,
    head: &Term,
    shape: &Term,
    max_length: usize,
) -> Result<Vec<Term>, ShaclParseError> {
    let mut elements = Vec::new();
    let mut visited = FxHashSet::default();
    let mut current = head.clone();
    loop {
        if let Term::NamedNode(n) = &current {
            if n.as_ref() == rdf::NIL {
                return Ok(elements);
            }
        }
        if !visited.insert(current.clone()) {
            return Err(ShaclParseError::CircularList {
                shape: shape.clone(),
            });
        }
        if elements.len() >= max_length {
            return Err(ShaclParseError::ListTooLong {
                shape: shape.clone(),
                max_length,
            });
        }
        let first = object(graph, &current, rdf::FIRST)
            .ok_or_else(|| ShaclParseError::invalid_rdf_list(shape.clone(), "Missing rdf:first"))?;
        elements.push(first);
        current = object(graph, &current, rdf::REST)
            .ok_or_else(|| ShaclParseError::invalid_rdf_list(shape.clone(), "Missing rdf:rest"))?;
    }
}

/// Lexical form used by string based constraints.
pub(crate) fn lexical_form(term: &Term) -> Option<&str> {
    match term {
        Term::NamedNode(n) => Some(n.as_str()),
        Term::Literal(l) => Some(l.value()),
        _ => None,
    }
}
