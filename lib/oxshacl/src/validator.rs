//! The validation orchestrator.

use oxrdf::{Graph, Term};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::constraints;
use crate::error::{ShaclError, ShaclValidationError};
use crate::graph::DEFAULT_MAX_LIST_LENGTH;
use crate::loader::ShapesParser;
use crate::logical::{self, Recursion, ShapeEvaluator, VerdictCache};
use crate::model::{NodeShape, PropertyShape, Shape, ShapeId, ShapeTable, ShapesGraph};
use crate::pattern::PatternLimits;
use crate::report::{ValidationReport, ValidationResult};
#[cfg(feature = "sparql")]
use crate::sparql::SparqlEngine;
use crate::sparql::{self, QueryEngine};

/// Options of a [`ShaclValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ValidatorOptions {
    max_recursion_depth: usize,
    max_list_length: usize,
    query_timeout: Duration,
    parallel: bool,
    pattern_limits: PatternLimits,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: 50,
            max_list_length: DEFAULT_MAX_LIST_LENGTH,
            query_timeout: Duration::from_secs(10),
            parallel: true,
            pattern_limits: PatternLimits::default(),
        }
    }
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximal nesting of shape references followed by `sh:and`, `sh:or`, `sh:xone`,
    /// `sh:not` and `sh:node`.
    pub fn with_max_recursion_depth(mut self, max_recursion_depth: usize) -> Self {
        self.max_recursion_depth = max_recursion_depth;
        self
    }

    /// Maximal number of elements read from an RDF list of the shapes graph.
    pub fn with_max_list_length(mut self, max_list_length: usize) -> Self {
        self.max_list_length = max_list_length;
        self
    }

    /// Time budget of each SPARQL constraint query.
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Validates the focus nodes of a shape in parallel (the default).
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Limits applied when compiling `sh:pattern` regular expressions.
    pub fn with_pattern_limits(mut self, pattern_limits: PatternLimits) -> Self {
        self.pattern_limits = pattern_limits;
        self
    }

    pub fn max_recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }

    pub fn max_list_length(&self) -> usize {
        self.max_list_length
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn pattern_limits(&self) -> PatternLimits {
        self.pattern_limits
    }

    /// A [`ShapesParser`] applying the list and pattern limits of these options.
    pub fn shapes_parser(&self) -> ShapesParser {
        ShapesParser::new()
            .with_max_list_length(self.max_list_length)
            .with_pattern_limits(self.pattern_limits)
    }
}

/// A flag to cancel a running validation from another thread.
///
/// The validator checks it before validating each focus node and then returns
/// [`ShaclValidationError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Validates data graphs against a [`ShapesGraph`].
///
/// ```
/// use oxrdf::vocab::rdf;
/// use oxrdf::{Graph, Literal, NamedNode, Triple};
/// use oxshacl::{NodeShape, ShaclValidator, ShapesGraph, Target, ValidatorOptions};
///
/// let person = NamedNode::new("http://example.com/Person")?;
/// let shape = NodeShape::new(NamedNode::new("http://example.com/PersonShape")?)
///     .with_target(Target::Class(person.clone()))
///     .with_closed([rdf::TYPE.into_owned()]);
/// let validator = ShaclValidator::new(ShapesGraph::from_iter([shape]))
///     .with_options(ValidatorOptions::new().with_parallel(false));
///
/// let alice = NamedNode::new("http://example.com/alice")?;
/// let mut data = Graph::new();
/// data.insert(&Triple::new(alice.clone(), rdf::TYPE, person));
/// assert!(validator.validate(&data)?.conforms());
///
/// let age = NamedNode::new("http://example.com/age")?;
/// data.insert(&Triple::new(alice, age, Literal::from(42)));
/// assert!(!validator.validate(&data)?.conforms());
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct ShaclValidator {
    shapes: ShapesGraph,
    options: ValidatorOptions,
    query_engine: Option<Arc<dyn QueryEngine>>,
    cancellation: Option<CancellationFlag>,
}

impl ShaclValidator {
    pub fn new(shapes: ShapesGraph) -> Self {
        Self {
            shapes,
            options: ValidatorOptions::default(),
            query_engine: None,
            cancellation: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs the SPARQL constraints with `engine`.
    ///
    /// Without it, and with the `sparql` feature enabled, a [`SparqlEngine`] over the
    /// validated graph is used.
    #[must_use]
    pub fn with_query_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.query_engine = Some(engine);
        self
    }

    #[must_use]
    pub fn with_cancellation_flag(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn shapes(&self) -> &ShapesGraph {
        &self.shapes
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validates `data` against every shape.
    ///
    /// All constraints are evaluated: the report holds every result, in shape then focus
    /// node order. Errors are only returned if the validation is cancelled.
    pub fn validate(&self, data: &Graph) -> Result<ValidationReport, ShaclError> {
        let table = ShapeTable::new(&self.shapes);
        #[cfg(feature = "sparql")]
        let local_engine;
        #[cfg_attr(not(feature = "sparql"), expect(unused_mut))]
        let mut engine = self.query_engine.as_deref();
        #[cfg(feature = "sparql")]
        if engine.is_none() && self.shapes.node_shapes().any(|s| !s.sparql.is_empty()) {
            local_engine = SparqlEngine::new(data);
            engine = Some(&local_engine);
        }
        let context = ValidationContext {
            data,
            table: &table,
            engine,
            options: &self.options,
        };

        let mut report = ValidationReport::new();
        for shape in self.shapes.node_shapes() {
            let focus_nodes = shape.focus_nodes(data);
            report.extend(self.for_each_focus(&focus_nodes, |focus| {
                let cache = VerdictCache::default();
                context.validate_node_shape(focus, shape, &Recursion::with_cache(&cache))
            })?);
        }
        for shape in self.shapes.property_shapes() {
            let focus_nodes = shape.focus_nodes(data);
            report.extend(self.for_each_focus(&focus_nodes, |focus| {
                let cache = VerdictCache::default();
                context.validate_property_shape(focus, shape, &Recursion::with_cache(&cache))
            })?);
        }
        tracing::debug!(
            shapes = self.shapes.len(),
            results = report.len(),
            violations = report.violation_count(),
            conforms = report.conforms(),
            "SHACL validation done"
        );
        Ok(report)
    }

    fn for_each_focus(
        &self,
        focus_nodes: &[Term],
        validate: impl Fn(&Term) -> Vec<ValidationResult> + Sync,
    ) -> Result<Vec<ValidationResult>, ShaclError> {
        let task = |focus: &Term| {
            if self.cancellation.as_ref().is_some_and(CancellationFlag::is_cancelled) {
                return Err(ShaclError::from(ShaclValidationError::Cancelled));
            }
            Ok(validate(focus))
        };
        let per_focus = if self.options.parallel {
            focus_nodes
                .par_iter()
                .map(task)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            focus_nodes
                .iter()
                .map(task)
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(per_focus.into_iter().flatten().collect())
    }
}

impl fmt::Debug for ShaclValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaclValidator")
            .field("shapes", &self.shapes)
            .field("options", &self.options)
            .field("has_query_engine", &self.query_engine.is_some())
            .finish_non_exhaustive()
    }
}

/// Read-only state of one validation run.
struct ValidationContext<'a> {
    data: &'a Graph,
    table: &'a ShapeTable,
    engine: Option<&'a dyn QueryEngine>,
    options: &'a ValidatorOptions,
}

impl ValidationContext<'_> {
    fn validate_node_shape(
        &self,
        focus: &Term,
        shape: &NodeShape,
        recursion: &Recursion<'_>,
    ) -> Vec<ValidationResult> {
        let mut results = constraints::validate_node(self.data, focus, shape);
        results.extend(logical::validate_node(self, focus, shape, recursion));
        results.extend(sparql::validate_node(
            self.engine,
            focus,
            shape,
            self.options.query_timeout,
        ));
        for property in &shape.properties {
            if !property.deactivated {
                results.extend(self.validate_property_shape(focus, property, recursion));
            }
        }
        results
    }

    fn validate_property_shape(
        &self,
        focus: &Term,
        shape: &PropertyShape,
        recursion: &Recursion<'_>,
    ) -> Vec<ValidationResult> {
        let mut results = constraints::validate_property(self.data, focus, shape);
        results.extend(logical::validate_property(
            self, self.data, focus, shape, recursion,
        ));
        results
    }
}

impl ShapeEvaluator for ValidationContext<'_> {
    fn shape_results(
        &self,
        subject: &Term,
        shape: &ShapeId,
        recursion: &Recursion<'_>,
    ) -> Option<Vec<ValidationResult>> {
        let shape = self.table.get(shape)?;
        if shape.is_deactivated() {
            return Some(Vec::new());
        }
        Some(match shape {
            Shape::Node(shape) => self.validate_node_shape(subject, shape, recursion),
            Shape::Property(shape) => self.validate_property_shape(subject, shape, recursion),
        })
    }

    fn max_depth(&self) -> usize {
        self.options.max_recursion_depth
    }
}
