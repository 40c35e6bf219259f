//! SHACL shape model.
//!
//! Shapes are immutable once built. Construction problems (a missing query placeholder,
//! invalid regex flags...) are reported by the constructors as [`ShaclParseError`] so that a
//! built model never fails during evaluation.
//!
//! - [`ShapeId`] identifies a shape (IRI or blank node).
//! - [`NodeShape`] and [`PropertyShape`] share a [`ConstraintSet`] and [`LogicalConstraints`].
//! - [`ShapesGraph`] is the collection handed to the validator.
//! - [`ShapeTable`] is the per-run lookup table used to resolve shape references.

use oxrdf::vocab::rdf;
use oxrdf::{BlankNode, Graph, Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, Term};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::ShaclParseError;
use crate::path::PropertyPath;
use crate::pattern::Pattern;
use crate::report::Severity;
use crate::vocab::sh;

/// Identifier of a shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeId {
    /// Shape identified by an IRI.
    Named(NamedNode),
    /// Anonymous shape.
    Blank(BlankNode),
}

impl ShapeId {
    /// Builds an identifier from a term, if it is an IRI or a blank node.
    pub fn from_term(term: &Term) -> Option<Self> {
        match term {
            Term::NamedNode(n) => Some(Self::Named(n.clone())),
            Term::BlankNode(b) => Some(Self::Blank(b.clone())),
            _ => None,
        }
    }

    /// The identifier as an RDF term.
    pub fn to_term(&self) -> Term {
        match self {
            Self::Named(n) => n.clone().into(),
            Self::Blank(b) => b.clone().into(),
        }
    }

    /// The IRI of the shape, if it has one.
    pub fn as_named(&self) -> Option<&NamedNode> {
        match self {
            Self::Named(n) => Some(n),
            Self::Blank(_) => None,
        }
    }
}

impl From<NamedNode> for ShapeId {
    fn from(node: NamedNode) -> Self {
        Self::Named(node)
    }
}

impl From<NamedNodeRef<'_>> for ShapeId {
    fn from(node: NamedNodeRef<'_>) -> Self {
        Self::Named(node.into_owned())
    }
}

impl From<BlankNode> for ShapeId {
    fn from(node: BlankNode) -> Self {
        Self::Blank(node)
    }
}

impl From<NamedOrBlankNode> for ShapeId {
    fn from(node: NamedOrBlankNode) -> Self {
        match node {
            NamedOrBlankNode::NamedNode(n) => Self::Named(n),
            NamedOrBlankNode::BlankNode(b) => Self::Blank(b),
        }
    }
}

impl From<ShapeId> for Term {
    fn from(id: ShapeId) -> Self {
        match id {
            ShapeId::Named(n) => n.into(),
            ShapeId::Blank(b) => b.into(),
        }
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(n) => write!(f, "{n}"),
            Self::Blank(b) => write!(f, "{b}"),
        }
    }
}

/// Rule selecting the focus nodes of a shape.
///
/// Class based targets only follow direct `rdf:type` edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Every instance of a class (`sh:targetClass`).
    Class(NamedNode),
    /// A given node (`sh:targetNode`).
    Node(Term),
    /// Every subject of a predicate (`sh:targetSubjectsOf`).
    SubjectsOf(NamedNode),
    /// Every object of a predicate (`sh:targetObjectsOf`).
    ObjectsOf(NamedNode),
}

impl Target {
    /// Nodes of `graph` selected by this target, in graph order.
    pub fn focus_nodes(&self, graph: &Graph) -> Vec<Term> {
        match self {
            Self::Class(class) => instances_of(graph, class.as_ref()),
            Self::Node(node) => vec![node.clone()],
            Self::SubjectsOf(predicate) => graph
                .triples_for_predicate(predicate)
                .map(|t| t.subject.into_owned().into())
                .collect(),
            Self::ObjectsOf(predicate) => graph
                .triples_for_predicate(predicate)
                .map(|t| t.object.into_owned())
                .collect(),
        }
    }
}

fn instances_of(graph: &Graph, class: NamedNodeRef<'_>) -> Vec<Term> {
    graph
        .subjects_for_predicate_object(rdf::TYPE, class)
        .map(|s| s.into_owned().into())
        .collect()
}

/// Focus nodes of a shape: its explicit targets, then the nodes typed with the shape IRI.
///
/// Duplicates are removed, first occurrence wins.
fn select_focus_nodes(id: &ShapeId, targets: &[Target], graph: &Graph) -> Vec<Term> {
    let mut seen = FxHashSet::default();
    let mut nodes = Vec::new();
    let implicit = id.as_named().map(|class| instances_of(graph, class.as_ref()));
    for node in targets
        .iter()
        .flat_map(|target| target.focus_nodes(graph))
        .chain(implicit.into_iter().flatten())
    {
        if seen.insert(node.clone()) {
            nodes.push(node);
        }
    }
    nodes
}

/// Kind of RDF term required by `sh:nodeKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Iri,
    BlankNode,
    Literal,
    BlankNodeOrIri,
    BlankNodeOrLiteral,
    IriOrLiteral,
}

impl NodeKind {
    /// Parses the `sh:nodeKind` value.
    pub fn from_iri(iri: NamedNodeRef<'_>) -> Option<Self> {
        [
            Self::Iri,
            Self::BlankNode,
            Self::Literal,
            Self::BlankNodeOrIri,
            Self::BlankNodeOrLiteral,
            Self::IriOrLiteral,
        ]
        .into_iter()
        .find(|kind| kind.iri() == iri)
    }

    /// The SHACL IRI of this node kind.
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::Iri => sh::IRI,
            Self::BlankNode => sh::BLANK_NODE,
            Self::Literal => sh::LITERAL,
            Self::BlankNodeOrIri => sh::BLANK_NODE_OR_IRI,
            Self::BlankNodeOrLiteral => sh::BLANK_NODE_OR_LITERAL,
            Self::IriOrLiteral => sh::IRI_OR_LITERAL,
        }
    }

    /// Is `term` of this kind?
    pub fn matches(self, term: &Term) -> bool {
        let (iri, blank, literal) = match term {
            Term::NamedNode(_) => (true, false, false),
            Term::BlankNode(_) => (false, true, false),
            Term::Literal(_) => (false, false, true),
            #[cfg(feature = "rdf-12")]
            _ => (false, false, false),
        };
        match self {
            Self::Iri => iri,
            Self::BlankNode => blank,
            Self::Literal => literal,
            Self::BlankNodeOrIri => blank || iri,
            Self::BlankNodeOrLiteral => blank || literal,
            Self::IriOrLiteral => iri || literal,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iri())
    }
}

/// `sh:qualifiedValueShape` restricted to a class test, with its counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedConstraint {
    /// Class the qualifying values must be direct instances of.
    pub class: NamedNode,
    pub min_count: Option<u64>,
    pub max_count: Option<u64>,
}

/// Primitive constraints shared by node and property shapes.
///
/// Every field is optional or empty by default. Cardinality, qualified and uniqueness
/// constraints are only meaningful on property shapes and are ignored on node shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    pub min_count: Option<u64>,
    pub max_count: Option<u64>,
    pub datatype: Option<NamedNode>,
    /// Each class is checked independently.
    pub classes: Vec<NamedNode>,
    pub node_kind: Option<NodeKind>,
    pub min_exclusive: Option<Literal>,
    pub min_inclusive: Option<Literal>,
    pub max_exclusive: Option<Literal>,
    pub max_inclusive: Option<Literal>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub patterns: Vec<Pattern>,
    /// Allowed language ranges, matched as in SPARQL `langMatches`.
    pub language_in: Option<Vec<String>>,
    pub unique_lang: bool,
    /// `sh:in`: the allowed values.
    pub in_values: Option<Vec<Term>>,
    /// `sh:hasValue`: every term must be among the values.
    pub has_values: Vec<Term>,
    pub qualified: Option<QualifiedConstraint>,
    pub equals: Vec<NamedNode>,
    pub disjoint: Vec<NamedNode>,
    pub less_than: Vec<NamedNode>,
    pub less_than_or_equals: Vec<NamedNode>,
}

impl ConstraintSet {
    /// Returns `true` if no constraint is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Logical combinators of a shape.
///
/// Reference lists keep their duplicates: `xone (S S)` counts `S` twice. A shape may carry
/// several lists of the same kind, each evaluated on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalConstraints {
    pub and: Vec<Vec<ShapeId>>,
    pub or: Vec<Vec<ShapeId>>,
    pub xone: Vec<Vec<ShapeId>>,
    pub not: Vec<ShapeId>,
    /// `sh:node` references.
    pub node: Vec<ShapeId>,
}

impl LogicalConstraints {
    /// Adds a `sh:and` list.
    #[must_use]
    pub fn with_and(mut self, shapes: impl IntoIterator<Item = ShapeId>) -> Self {
        self.and.push(shapes.into_iter().collect());
        self
    }

    /// Adds a `sh:or` list.
    #[must_use]
    pub fn with_or(mut self, shapes: impl IntoIterator<Item = ShapeId>) -> Self {
        self.or.push(shapes.into_iter().collect());
        self
    }

    /// Adds a `sh:xone` list.
    #[must_use]
    pub fn with_xone(mut self, shapes: impl IntoIterator<Item = ShapeId>) -> Self {
        self.xone.push(shapes.into_iter().collect());
        self
    }

    /// Adds a `sh:not` reference.
    #[must_use]
    pub fn with_not(mut self, shape: impl Into<ShapeId>) -> Self {
        self.not.push(shape.into());
        self
    }

    /// Adds a `sh:node` reference.
    #[must_use]
    pub fn with_node(mut self, shape: impl Into<ShapeId>) -> Self {
        self.node.push(shape.into());
        self
    }

    /// Returns `true` if there is no combinator.
    pub fn is_empty(&self) -> bool {
        self.and.is_empty()
            && self.or.is_empty()
            && self.xone.is_empty()
            && self.not.is_empty()
            && self.node.is_empty()
    }
}

/// A SPARQL based constraint (`sh:sparql`).
///
/// The query is a SELECT query mentioning the `$this` variable, which is pre-bound to the
/// focus node. Every solution is a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlConstraint {
    shape: ShapeId,
    message: Option<String>,
    query: String,
}

impl SparqlConstraint {
    /// Variable standing for the focus node in the query text.
    pub const FOCUS_VARIABLE: &'static str = "this";

    /// Builds a constraint, checking that the query mentions `$this`.
    pub fn new(
        shape: impl Into<ShapeId>,
        message: Option<String>,
        query: impl Into<String>,
    ) -> Result<Self, ShaclParseError> {
        let shape = shape.into();
        let query = query.into();
        if !mentions_focus_variable(&query) {
            return Err(ShaclParseError::MissingPlaceholder {
                shape: shape.to_term(),
                placeholder: "$this",
            });
        }
        Ok(Self {
            shape,
            message,
            query,
        })
    }

    /// The shape owning the constraint.
    pub fn shape(&self) -> &ShapeId {
        &self.shape
    }

    /// The `sh:message` of the constraint.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The query text.
    pub fn query(&self) -> &str {
        &self.query
    }
}

fn mentions_focus_variable(query: &str) -> bool {
    query.match_indices("$this").any(|(i, m)| {
        !query[i + m.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

/// A node shape.
#[derive(Debug, Clone)]
pub struct NodeShape {
    pub id: ShapeId,
    pub targets: Vec<Target>,
    /// Constraints applied to the focus node itself.
    pub constraints: ConstraintSet,
    pub logic: LogicalConstraints,
    pub properties: Vec<Arc<PropertyShape>>,
    pub sparql: Vec<SparqlConstraint>,
    /// `sh:closed`: the properties allowed in addition to the property shapes paths.
    pub closed: Option<Vec<NamedNode>>,
    pub severity: Severity,
    pub deactivated: bool,
    pub message: Option<String>,
    pub name: Option<String>,
}

impl NodeShape {
    pub fn new(id: impl Into<ShapeId>) -> Self {
        Self {
            id: id.into(),
            targets: Vec::new(),
            constraints: ConstraintSet::default(),
            logic: LogicalConstraints::default(),
            properties: Vec::new(),
            sparql: Vec::new(),
            closed: None,
            severity: Severity::Violation,
            deactivated: false,
            message: None,
            name: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn with_logic(mut self, logic: LogicalConstraints) -> Self {
        self.logic = logic;
        self
    }

    #[must_use]
    pub fn with_property(mut self, property: impl Into<Arc<PropertyShape>>) -> Self {
        self.properties.push(property.into());
        self
    }

    #[must_use]
    pub fn with_sparql(mut self, constraint: SparqlConstraint) -> Self {
        self.sparql.push(constraint);
        self
    }

    /// Makes the shape closed, allowing the property shapes predicates and `ignored`.
    #[must_use]
    pub fn with_closed(mut self, ignored: impl IntoIterator<Item = NamedNode>) -> Self {
        self.closed = Some(ignored.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_deactivated(mut self, deactivated: bool) -> Self {
        self.deactivated = deactivated;
        self
    }

    /// Focus nodes selected in `graph` by the targets and by implicit class targeting.
    pub fn focus_nodes(&self, graph: &Graph) -> Vec<Term> {
        if self.deactivated {
            return Vec::new();
        }
        select_focus_nodes(&self.id, &self.targets, graph)
    }
}

/// A property shape. Its constraints apply to the values reached through `path`.
#[derive(Debug, Clone)]
pub struct PropertyShape {
    pub id: ShapeId,
    pub path: PropertyPath,
    /// Targets, used only when the property shape is validated on its own.
    pub targets: Vec<Target>,
    pub constraints: ConstraintSet,
    /// Combinators, evaluated once per value.
    pub logic: LogicalConstraints,
    pub severity: Severity,
    pub deactivated: bool,
    pub message: Option<String>,
    pub name: Option<String>,
}

impl PropertyShape {
    pub fn new(id: impl Into<ShapeId>, path: impl Into<PropertyPath>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            targets: Vec::new(),
            constraints: ConstraintSet::default(),
            logic: LogicalConstraints::default(),
            severity: Severity::Violation,
            deactivated: false,
            message: None,
            name: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn with_logic(mut self, logic: LogicalConstraints) -> Self {
        self.logic = logic;
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_deactivated(mut self, deactivated: bool) -> Self {
        self.deactivated = deactivated;
        self
    }

    /// The value nodes of `focus`.
    pub fn values(&self, graph: &Graph, focus: &Term) -> Vec<Term> {
        self.path.evaluate(graph, focus)
    }

    /// Focus nodes selected in `graph`, when validated as a top-level shape.
    pub fn focus_nodes(&self, graph: &Graph) -> Vec<Term> {
        if self.deactivated {
            return Vec::new();
        }
        select_focus_nodes(&self.id, &self.targets, graph)
    }
}

/// A resolved shape reference.
#[derive(Debug, Clone)]
pub enum Shape {
    Node(Arc<NodeShape>),
    Property(Arc<PropertyShape>),
}

impl Shape {
    pub fn id(&self) -> &ShapeId {
        match self {
            Self::Node(s) => &s.id,
            Self::Property(s) => &s.id,
        }
    }

    pub fn is_deactivated(&self) -> bool {
        match self {
            Self::Node(s) => s.deactivated,
            Self::Property(s) => s.deactivated,
        }
    }
}

/// The shapes to validate a data graph against.
///
/// Shapes keep their insertion order, which is the order results are reported in. Adding a
/// shape with an identifier already present replaces the previous one.
#[derive(Debug, Clone, Default)]
pub struct ShapesGraph {
    node_shapes: Vec<Arc<NodeShape>>,
    property_shapes: Vec<Arc<PropertyShape>>,
    index: FxHashMap<ShapeId, ShapeSlot>,
}

#[derive(Debug, Clone, Copy)]
enum ShapeSlot {
    Node(usize),
    Property(usize),
}

impl ShapesGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node shape.
    pub fn add_node_shape(&mut self, shape: impl Into<Arc<NodeShape>>) {
        let shape = shape.into();
        match self.index.get(&shape.id) {
            Some(ShapeSlot::Node(i)) => self.node_shapes[*i] = shape,
            _ => {
                self.remove_property_shape(&shape.id);
                self.index
                    .insert(shape.id.clone(), ShapeSlot::Node(self.node_shapes.len()));
                self.node_shapes.push(shape);
            }
        }
    }

    /// Adds a property shape validated on its own, with its own targets.
    pub fn add_property_shape(&mut self, shape: impl Into<Arc<PropertyShape>>) {
        let shape = shape.into();
        match self.index.get(&shape.id) {
            Some(ShapeSlot::Property(i)) => self.property_shapes[*i] = shape,
            Some(ShapeSlot::Node(_)) => {
                tracing::warn!(
                    shape = %shape.id,
                    "a node shape with the same identifier is already defined, the property shape is ignored"
                );
            }
            None => {
                self.index.insert(
                    shape.id.clone(),
                    ShapeSlot::Property(self.property_shapes.len()),
                );
                self.property_shapes.push(shape);
            }
        }
    }

    fn remove_property_shape(&mut self, id: &ShapeId) {
        if let Some(ShapeSlot::Property(i)) = self.index.remove(id) {
            self.property_shapes.remove(i);
            for slot in self.index.values_mut() {
                if let ShapeSlot::Property(j) = slot {
                    if *j > i {
                        *j -= 1;
                    }
                }
            }
        }
    }

    pub fn node_shape(&self, id: &ShapeId) -> Option<&Arc<NodeShape>> {
        match self.index.get(id)? {
            ShapeSlot::Node(i) => self.node_shapes.get(*i),
            ShapeSlot::Property(_) => None,
        }
    }

    pub fn property_shape(&self, id: &ShapeId) -> Option<&Arc<PropertyShape>> {
        match self.index.get(id)? {
            ShapeSlot::Property(i) => self.property_shapes.get(*i),
            ShapeSlot::Node(_) => None,
        }
    }

    /// Node shapes in insertion order.
    pub fn node_shapes(&self) -> impl Iterator<Item = &Arc<NodeShape>> {
        self.node_shapes.iter()
    }

    /// Top-level property shapes in insertion order.
    pub fn property_shapes(&self) -> impl Iterator<Item = &Arc<PropertyShape>> {
        self.property_shapes.iter()
    }

    pub fn len(&self) -> usize {
        self.node_shapes.len() + self.property_shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<NodeShape> for ShapesGraph {
    fn from_iter<I: IntoIterator<Item = NodeShape>>(iter: I) -> Self {
        let mut shapes = Self::new();
        for shape in iter {
            shapes.add_node_shape(shape);
        }
        shapes
    }
}

/// Lookup table from shape identifiers to shapes, built for one validation run.
///
/// Holds every shape of a [`ShapesGraph`], including the property shapes nested in node
/// shapes, so any of them can be the target of a shape reference.
#[derive(Debug, Default)]
pub struct ShapeTable {
    shapes: FxHashMap<ShapeId, Shape>,
}

impl ShapeTable {
    pub fn new(shapes: &ShapesGraph) -> Self {
        let mut table = Self::default();
        for shape in shapes.node_shapes() {
            for property in &shape.properties {
                table
                    .shapes
                    .entry(property.id.clone())
                    .or_insert_with(|| Shape::Property(Arc::clone(property)));
            }
        }
        for shape in shapes.property_shapes() {
            table
                .shapes
                .insert(shape.id.clone(), Shape::Property(Arc::clone(shape)));
        }
        for shape in shapes.node_shapes() {
            table
                .shapes
                .insert(shape.id.clone(), Shape::Node(Arc::clone(shape)));
        }
        table
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
