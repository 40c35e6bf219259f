//! Reads the shape model from an in-memory shapes graph.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{Graph, Literal, NamedNode, NamedNodeRef, Term};
use oxsdatatypes::{Boolean, Integer};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ShaclParseError;
use crate::graph::{DEFAULT_MAX_LIST_LENGTH, object, objects, read_list};
use crate::literal::is_well_formed;
use crate::model::{
    ConstraintSet, LogicalConstraints, NodeKind, NodeShape, PropertyShape, QualifiedConstraint,
    ShapeId, ShapesGraph, SparqlConstraint, Target,
};
use crate::path::PropertyPath;
use crate::pattern::{Pattern, PatternLimits};
use crate::report::Severity;
use crate::vocab::sh;

/// A parser of shapes graphs.
///
/// Shapes are discovered from their `rdf:type` (`sh:NodeShape`, `sh:PropertyShape`), from
/// their target declarations, and then transitively through every shape reference, so a
/// shape only used inside `sh:and` or `sh:node` does not need to be typed. A shape with a
/// `sh:path` is a property shape, any other shape is a node shape.
///
/// ```
/// use oxrdf::vocab::rdf;
/// use oxrdf::{Graph, NamedNodeRef, Triple};
/// use oxshacl::ShapesParser;
/// use oxshacl::vocab::sh;
///
/// let shape = NamedNodeRef::new("http://example.com/PersonShape")?;
/// let mut graph = Graph::new();
/// graph.insert(&Triple::new(shape, rdf::TYPE, sh::NODE_SHAPE));
/// graph.insert(&Triple::new(
///     shape,
///     sh::TARGET_CLASS,
///     NamedNodeRef::new("http://example.com/Person")?,
/// ));
///
/// let shapes = ShapesParser::new().with_max_list_length(100).parse(&graph)?;
/// assert_eq!(shapes.len(), 1);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct ShapesParser {
    max_list_length: usize,
    pattern_limits: PatternLimits,
}

impl Default for ShapesParser {
    fn default() -> Self {
        Self {
            max_list_length: DEFAULT_MAX_LIST_LENGTH,
            pattern_limits: PatternLimits::default(),
        }
    }
}

impl ShapesParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximal number of elements read from an RDF list. Longer lists are an error.
    pub fn with_max_list_length(mut self, max_list_length: usize) -> Self {
        self.max_list_length = max_list_length;
        self
    }

    /// Limits applied when compiling `sh:pattern` regular expressions.
    pub fn with_pattern_limits(mut self, pattern_limits: PatternLimits) -> Self {
        self.pattern_limits = pattern_limits;
        self
    }

    /// Builds the shapes defined in `graph`.
    pub fn parse(self, graph: &Graph) -> Result<ShapesGraph, ShaclParseError> {
        let mut loader = Loader {
            graph,
            options: self,
            shapes: ShapesGraph::new(),
            queue: VecDeque::new(),
            seen: FxHashSet::default(),
            nested: FxHashMap::default(),
        };
        for root in roots(graph) {
            loader.enqueue(root);
        }
        while let Some(term) = loader.queue.pop_front() {
            loader.load_shape(&term)?;
        }
        tracing::debug!(shapes = loader.shapes.len(), "shapes graph loaded");
        Ok(loader.shapes)
    }
}

impl ShapesGraph {
    /// Builds the shapes defined in `graph` with the default [`ShapesParser`] options.
    pub fn from_graph(graph: &Graph) -> Result<Self, ShaclParseError> {
        ShapesParser::new().parse(graph)
    }
}

/// Shapes declared explicitly: typed, or carrying a target.
fn roots(graph: &Graph) -> Vec<Term> {
    let mut roots = Vec::new();
    for class in [sh::NODE_SHAPE, sh::PROPERTY_SHAPE] {
        roots.extend(
            graph
                .subjects_for_predicate_object(rdf::TYPE, class)
                .map(|s| Term::from(s.into_owned())),
        );
    }
    for predicate in [
        sh::TARGET_CLASS,
        sh::TARGET_NODE,
        sh::TARGET_SUBJECTS_OF,
        sh::TARGET_OBJECTS_OF,
    ] {
        roots.extend(
            graph
                .triples_for_predicate(predicate)
                .map(|t| Term::from(t.subject.into_owned())),
        );
    }
    roots
}

struct Loader<'a> {
    graph: &'a Graph,
    options: ShapesParser,
    shapes: ShapesGraph,
    queue: VecDeque<Term>,
    seen: FxHashSet<Term>,
    // Property shapes parsed under `sh:property`, shared between their owners.
    nested: FxHashMap<Term, Arc<PropertyShape>>,
}

impl Loader<'_> {
    fn enqueue(&mut self, term: Term) {
        if self.seen.insert(term.clone()) {
            self.queue.push_back(term);
        }
    }

    fn load_shape(&mut self, term: &Term) -> Result<(), ShaclParseError> {
        if object(self.graph, term, sh::PATH).is_some() {
            if self.has_type(term, sh::NODE_SHAPE) {
                return Err(ShaclParseError::invalid_shape(
                    term.clone(),
                    "a sh:NodeShape cannot have a sh:path",
                ));
            }
            let shape = self.property_shape(term)?;
            self.shapes.add_property_shape(shape);
        } else {
            let shape = self.node_shape(term)?;
            self.shapes.add_node_shape(shape);
        }
        Ok(())
    }

    fn node_shape(&mut self, term: &Term) -> Result<NodeShape, ShaclParseError> {
        let mut shape = NodeShape::new(shape_id(term)?);
        shape.targets = self.targets(term)?;
        shape.constraints = self.constraints(term)?;
        shape.logic = self.logic(term)?;
        for property in objects(self.graph, term, sh::PROPERTY) {
            shape.properties.push(self.nested_property_shape(term, &property)?);
        }
        for constraint in objects(self.graph, term, sh::SPARQL) {
            if self.boolean(&constraint, sh::DEACTIVATED)? == Some(true) {
                continue;
            }
            shape
                .sparql
                .push(self.sparql_constraint(&shape.id, &constraint)?);
        }
        if self.boolean(term, sh::CLOSED)? == Some(true) {
            let ignored = match object(self.graph, term, sh::IGNORED_PROPERTIES) {
                Some(head) => self
                    .list(&head, term)?
                    .into_iter()
                    .map(|t| expect_iri(term, sh::IGNORED_PROPERTIES, t))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            shape.closed = Some(ignored);
        }
        self.metadata(term, &mut shape.severity, &mut shape.deactivated)?;
        shape.message = self.string(term, sh::MESSAGE)?;
        shape.name = self.string(term, sh::NAME)?;
        Ok(shape)
    }

    fn nested_property_shape(
        &mut self,
        owner: &Term,
        term: &Term,
    ) -> Result<Arc<PropertyShape>, ShaclParseError> {
        if let Some(shape) = self.nested.get(term) {
            return Ok(Arc::clone(shape));
        }
        if object(self.graph, term, sh::PATH).is_none() {
            return Err(ShaclParseError::invalid_property_value(
                owner.clone(),
                sh::PROPERTY,
                "a property shape with a sh:path",
                term.clone(),
            ));
        }
        let shape = Arc::new(self.property_shape(term)?);
        self.nested.insert(term.clone(), Arc::clone(&shape));
        Ok(shape)
    }

    fn property_shape(&mut self, term: &Term) -> Result<PropertyShape, ShaclParseError> {
        let path = object(self.graph, term, sh::PATH).ok_or_else(|| {
            ShaclParseError::invalid_shape(term.clone(), "property shape without sh:path")
        })?;
        let path = PropertyPath::parse(self.graph, &path, term, self.options.max_list_length)?;
        let mut shape = PropertyShape::new(shape_id(term)?, path);
        shape.targets = self.targets(term)?;
        shape.constraints = self.constraints(term)?;
        shape.logic = self.logic(term)?;
        if object(self.graph, term, sh::SPARQL).is_some() {
            tracing::warn!(
                shape = %term,
                "sh:sparql is only supported on node shapes, it is ignored"
            );
        }
        self.metadata(term, &mut shape.severity, &mut shape.deactivated)?;
        shape.message = self.string(term, sh::MESSAGE)?;
        shape.name = self.string(term, sh::NAME)?;
        Ok(shape)
    }

    fn targets(&self, term: &Term) -> Result<Vec<Target>, ShaclParseError> {
        let mut targets = Vec::new();
        for class in objects(self.graph, term, sh::TARGET_CLASS) {
            targets.push(Target::Class(expect_iri(term, sh::TARGET_CLASS, class)?));
        }
        for node in objects(self.graph, term, sh::TARGET_NODE) {
            targets.push(Target::Node(node));
        }
        for predicate in objects(self.graph, term, sh::TARGET_SUBJECTS_OF) {
            targets.push(Target::SubjectsOf(expect_iri(
                term,
                sh::TARGET_SUBJECTS_OF,
                predicate,
            )?));
        }
        for predicate in objects(self.graph, term, sh::TARGET_OBJECTS_OF) {
            targets.push(Target::ObjectsOf(expect_iri(
                term,
                sh::TARGET_OBJECTS_OF,
                predicate,
            )?));
        }
        Ok(targets)
    }

    fn constraints(&self, term: &Term) -> Result<ConstraintSet, ShaclParseError> {
        let mut constraints = ConstraintSet {
            min_count: self.count(term, sh::MIN_COUNT),
            max_count: self.count(term, sh::MAX_COUNT),
            min_exclusive: self.bound(term, sh::MIN_EXCLUSIVE)?,
            min_inclusive: self.bound(term, sh::MIN_INCLUSIVE)?,
            max_exclusive: self.bound(term, sh::MAX_EXCLUSIVE)?,
            max_inclusive: self.bound(term, sh::MAX_INCLUSIVE)?,
            min_length: self.count(term, sh::MIN_LENGTH),
            max_length: self.count(term, sh::MAX_LENGTH),
            unique_lang: self.boolean(term, sh::UNIQUE_LANG)?.unwrap_or(false),
            has_values: objects(self.graph, term, sh::HAS_VALUE),
            ..ConstraintSet::default()
        };
        if let Some(datatype) = object(self.graph, term, sh::DATATYPE) {
            constraints.datatype = Some(expect_iri(term, sh::DATATYPE, datatype)?);
        }
        constraints.classes = self.iris(term, sh::CLASS)?;
        if let Some(kind) = object(self.graph, term, sh::NODE_KIND) {
            constraints.node_kind = match &kind {
                Term::NamedNode(iri) => NodeKind::from_iri(iri.as_ref()),
                _ => None,
            };
            if constraints.node_kind.is_none() {
                tracing::warn!(
                    shape = %term,
                    %kind,
                    "unknown node kind, the constraint is ignored"
                );
            }
        }
        let flags = self.string(term, sh::FLAGS)?;
        for pattern in objects(self.graph, term, sh::PATTERN) {
            let Term::Literal(pattern) = pattern else {
                return Err(ShaclParseError::invalid_property_value(
                    term.clone(),
                    sh::PATTERN,
                    "a string literal",
                    pattern,
                ));
            };
            constraints.patterns.push(Pattern::with_limits(
                pattern.value(),
                flags.clone(),
                self.options.pattern_limits,
            )?);
        }
        if let Some(head) = object(self.graph, term, sh::LANGUAGE_IN) {
            constraints.language_in = Some(
                self.list(&head, term)?
                    .into_iter()
                    .map(|t| match t {
                        Term::Literal(l) => Ok(l.value().to_owned()),
                        t => Err(ShaclParseError::invalid_property_value(
                            term.clone(),
                            sh::LANGUAGE_IN,
                            "a list of language tags",
                            t,
                        )),
                    })
                    .collect::<Result<_, _>>()?,
            );
        }
        if let Some(head) = object(self.graph, term, sh::IN) {
            constraints.in_values = Some(self.list(&head, term)?);
        }
        if let Some(qualified) = object(self.graph, term, sh::QUALIFIED_VALUE_SHAPE) {
            match object(self.graph, &qualified, sh::CLASS) {
                Some(Term::NamedNode(class)) => {
                    constraints.qualified = Some(QualifiedConstraint {
                        class,
                        min_count: self.count(term, sh::QUALIFIED_MIN_COUNT),
                        max_count: self.count(term, sh::QUALIFIED_MAX_COUNT),
                    });
                }
                _ => tracing::warn!(
                    shape = %term,
                    %qualified,
                    "sh:qualifiedValueShape is only supported with a single sh:class, it is ignored"
                ),
            }
        }
        constraints.equals = self.iris(term, sh::EQUALS)?;
        constraints.disjoint = self.iris(term, sh::DISJOINT)?;
        constraints.less_than = self.iris(term, sh::LESS_THAN)?;
        constraints.less_than_or_equals = self.iris(term, sh::LESS_THAN_OR_EQUALS)?;
        Ok(constraints)
    }

    /// Reads the combinators and queues the referenced shapes.
    fn logic(&mut self, term: &Term) -> Result<LogicalConstraints, ShaclParseError> {
        let mut logic = LogicalConstraints::default();
        for (predicate, lists) in [
            (sh::AND, &mut logic.and),
            (sh::OR, &mut logic.or),
            (sh::XONE, &mut logic.xone),
        ] {
            for head in objects(self.graph, term, predicate) {
                let shapes = self
                    .list(&head, term)?
                    .iter()
                    .map(shape_id)
                    .collect::<Result<Vec<_>, _>>()?;
                lists.push(shapes);
            }
        }
        for reference in objects(self.graph, term, sh::NOT) {
            logic.not.push(shape_id(&reference)?);
        }
        for reference in objects(self.graph, term, sh::NODE) {
            logic.node.push(shape_id(&reference)?);
        }
        let references = logic
            .and
            .iter()
            .chain(&logic.or)
            .chain(&logic.xone)
            .flatten()
            .chain(&logic.not)
            .chain(&logic.node)
            .map(ShapeId::to_term)
            .collect::<Vec<_>>();
        for reference in references {
            self.enqueue(reference);
        }
        Ok(logic)
    }

    fn sparql_constraint(
        &self,
        shape: &ShapeId,
        constraint: &Term,
    ) -> Result<SparqlConstraint, ShaclParseError> {
        let select = self.string(constraint, sh::SELECT)?.ok_or_else(|| {
            ShaclParseError::invalid_shape(shape.to_term(), "sh:sparql without sh:select")
        })?;
        let mut declarations = Vec::new();
        for prefixes in objects(self.graph, constraint, sh::PREFIXES) {
            for declaration in objects(self.graph, &prefixes, sh::DECLARE) {
                let prefix = self.string(&declaration, sh::PREFIX)?;
                let namespace = match object(self.graph, &declaration, sh::NAMESPACE_PROPERTY) {
                    Some(Term::Literal(l)) => Some(l.value().to_owned()),
                    Some(Term::NamedNode(n)) => Some(n.into_string()),
                    _ => None,
                };
                let (Some(prefix), Some(namespace)) = (prefix, namespace) else {
                    return Err(ShaclParseError::invalid_shape(
                        shape.to_term(),
                        "sh:declare without sh:prefix and sh:namespace",
                    ));
                };
                declarations.push(format!("PREFIX {prefix}: <{namespace}>\n"));
            }
        }
        let mut query = declarations.concat();
        query.push_str(&select);
        SparqlConstraint::new(shape.clone(), self.string(constraint, sh::MESSAGE)?, query)
    }

    fn metadata(
        &self,
        term: &Term,
        severity: &mut Severity,
        deactivated: &mut bool,
    ) -> Result<(), ShaclParseError> {
        if let Some(value) = object(self.graph, term, sh::SEVERITY) {
            let iri = expect_iri(term, sh::SEVERITY, value)?;
            *severity = Severity::from_iri(iri.as_ref()).unwrap_or_else(|| {
                tracing::warn!(
                    shape = %term,
                    severity = %iri,
                    "unknown severity, sh:Violation is used"
                );
                Severity::Violation
            });
        }
        *deactivated = self.boolean(term, sh::DEACTIVATED)?.unwrap_or(false);
        Ok(())
    }

    fn list(&self, head: &Term, shape: &Term) -> Result<Vec<Term>, ShaclParseError> {
        read_list(self.graph, head, shape, self.options.max_list_length)
    }

    fn has_type(&self, term: &Term, class: NamedNodeRef<'_>) -> bool {
        objects(self.graph, term, rdf::TYPE)
            .iter()
            .any(|t| *t == Term::from(class))
    }

    fn iris(
        &self,
        term: &Term,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Vec<NamedNode>, ShaclParseError> {
        objects(self.graph, term, predicate)
            .into_iter()
            .map(|t| expect_iri(term, predicate, t))
            .collect()
    }

    fn string(
        &self,
        term: &Term,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Option<String>, ShaclParseError> {
        match object(self.graph, term, predicate) {
            None => Ok(None),
            Some(Term::Literal(l)) => Ok(Some(l.value().to_owned())),
            Some(value) => Err(ShaclParseError::invalid_property_value(
                term.clone(),
                predicate,
                "a literal",
                value,
            )),
        }
    }

    /// A non-negative `xsd:integer`.
    ///
    /// Anything else is logged and the constraint is dropped, the rest of the shape is kept.
    fn count(&self, term: &Term, predicate: NamedNodeRef<'_>) -> Option<u64> {
        let value = object(self.graph, term, predicate)?;
        let count = match &value {
            Term::Literal(l) => Integer::from_str(l.value())
                .ok()
                .and_then(|i| u64::try_from(i64::from(i)).ok()),
            _ => None,
        };
        if count.is_none() {
            tracing::warn!(
                shape = %term,
                property = %predicate,
                %value,
                "not a non-negative integer, the constraint is ignored"
            );
        }
        count
    }

    fn boolean(
        &self,
        term: &Term,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Option<bool>, ShaclParseError> {
        let Some(value) = object(self.graph, term, predicate) else {
            return Ok(None);
        };
        let parsed = match &value {
            Term::Literal(l) if l.datatype() == xsd::BOOLEAN => {
                Boolean::from_str(l.value()).ok().map(bool::from)
            }
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            ShaclParseError::invalid_property_value(term.clone(), predicate, "a boolean", value)
        })
    }

    /// A range bound. Ill-typed bounds are kept: every value then fails the constraint.
    fn bound(
        &self,
        term: &Term,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Option<Literal>, ShaclParseError> {
        match object(self.graph, term, predicate) {
            None => Ok(None),
            Some(Term::Literal(bound)) => {
                if !is_well_formed(bound.as_ref()) {
                    tracing::warn!(
                        shape = %term,
                        %bound,
                        "ill-typed range bound, no value will conform"
                    );
                }
                Ok(Some(bound))
            }
            Some(value) => Err(ShaclParseError::invalid_property_value(
                term.clone(),
                predicate,
                "a literal",
                value,
            )),
        }
    }
}

fn shape_id(term: &Term) -> Result<ShapeId, ShaclParseError> {
    ShapeId::from_term(term).ok_or_else(|| {
        ShaclParseError::invalid_shape(term.clone(), "a shape must be an IRI or a blank node")
    })
}

fn expect_iri(
    shape: &Term,
    predicate: NamedNodeRef<'_>,
    value: Term,
) -> Result<NamedNode, ShaclParseError> {
    match value {
        Term::NamedNode(iri) => Ok(iri),
        value => Err(ShaclParseError::invalid_property_value(
            shape.clone(),
            predicate,
            "an IRI",
            value,
        )),
    }
}
