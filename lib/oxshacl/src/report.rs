//! Validation results and reports.
//!
//! A [`ValidationReport`] keeps its conformance flag in sync with its results: it is
//! recomputed on every insertion and is `false` iff some result has the
//! [`Severity::Violation`] severity.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{BlankNode, Graph, Literal, NamedNode, NamedNodeRef, Term, Triple};
use std::fmt;

use crate::logical::CombinatorKind;
use crate::model::{NodeKind, ShapeId};
use crate::path::PropertyPath;
use crate::sparql::{QueryError, QueryRow};
use crate::vocab::sh;

/// Severity of a validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    /// The only severity making the data graph non conforming.
    #[default]
    Violation,
    Warning,
    Info,
}

impl Severity {
    /// The SHACL IRI of the severity.
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::Violation => sh::VIOLATION,
            Self::Warning => sh::WARNING,
            Self::Info => sh::INFO,
        }
    }

    /// Parses a `sh:severity` value.
    pub fn from_iri(iri: NamedNodeRef<'_>) -> Option<Self> {
        [Self::Violation, Self::Warning, Self::Info]
            .into_iter()
            .find(|severity| severity.iri() == iri)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Violation => "violation",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

/// SHACL constraint components, as reported in `sh:sourceConstraintComponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConstraintComponent {
    MinCount,
    MaxCount,
    Datatype,
    Class,
    NodeKind,
    MinExclusive,
    MinInclusive,
    MaxExclusive,
    MaxInclusive,
    MinLength,
    MaxLength,
    Pattern,
    LanguageIn,
    UniqueLang,
    In,
    HasValue,
    QualifiedMinCount,
    QualifiedMaxCount,
    Equals,
    Disjoint,
    LessThan,
    LessThanOrEquals,
    Closed,
    And,
    Or,
    Xone,
    Not,
    Node,
    Sparql,
}

impl ConstraintComponent {
    /// The IRI of the component.
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::MinCount => sh::MIN_COUNT_CONSTRAINT_COMPONENT,
            Self::MaxCount => sh::MAX_COUNT_CONSTRAINT_COMPONENT,
            Self::Datatype => sh::DATATYPE_CONSTRAINT_COMPONENT,
            Self::Class => sh::CLASS_CONSTRAINT_COMPONENT,
            Self::NodeKind => sh::NODE_KIND_CONSTRAINT_COMPONENT,
            Self::MinExclusive => sh::MIN_EXCLUSIVE_CONSTRAINT_COMPONENT,
            Self::MinInclusive => sh::MIN_INCLUSIVE_CONSTRAINT_COMPONENT,
            Self::MaxExclusive => sh::MAX_EXCLUSIVE_CONSTRAINT_COMPONENT,
            Self::MaxInclusive => sh::MAX_INCLUSIVE_CONSTRAINT_COMPONENT,
            Self::MinLength => sh::MIN_LENGTH_CONSTRAINT_COMPONENT,
            Self::MaxLength => sh::MAX_LENGTH_CONSTRAINT_COMPONENT,
            Self::Pattern => sh::PATTERN_CONSTRAINT_COMPONENT,
            Self::LanguageIn => sh::LANGUAGE_IN_CONSTRAINT_COMPONENT,
            Self::UniqueLang => sh::UNIQUE_LANG_CONSTRAINT_COMPONENT,
            Self::In => sh::IN_CONSTRAINT_COMPONENT,
            Self::HasValue => sh::HAS_VALUE_CONSTRAINT_COMPONENT,
            Self::QualifiedMinCount => sh::QUALIFIED_MIN_COUNT_CONSTRAINT_COMPONENT,
            Self::QualifiedMaxCount => sh::QUALIFIED_MAX_COUNT_CONSTRAINT_COMPONENT,
            Self::Equals => sh::EQUALS_CONSTRAINT_COMPONENT,
            Self::Disjoint => sh::DISJOINT_CONSTRAINT_COMPONENT,
            Self::LessThan => sh::LESS_THAN_CONSTRAINT_COMPONENT,
            Self::LessThanOrEquals => sh::LESS_THAN_OR_EQUALS_CONSTRAINT_COMPONENT,
            Self::Closed => sh::CLOSED_CONSTRAINT_COMPONENT,
            Self::And => sh::AND_CONSTRAINT_COMPONENT,
            Self::Or => sh::OR_CONSTRAINT_COMPONENT,
            Self::Xone => sh::XONE_CONSTRAINT_COMPONENT,
            Self::Not => sh::NOT_CONSTRAINT_COMPONENT,
            Self::Node => sh::NODE_CONSTRAINT_COMPONENT,
            Self::Sparql => sh::SPARQL_CONSTRAINT_COMPONENT,
        }
    }
}

impl fmt::Display for ConstraintComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let iri = self.iri().as_str();
        f.write_str(iri.strip_prefix(sh::NAMESPACE).unwrap_or(iri))
    }
}

/// What failed, with the values relevant to each kind of constraint.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ResultDetail {
    MinCount {
        min: u64,
        actual: usize,
    },
    MaxCount {
        max: u64,
        actual: usize,
    },
    /// `actual` is the datatype of the value, `None` if it is not a literal.
    Datatype {
        expected: NamedNode,
        actual: Option<NamedNode>,
        ill_typed: bool,
    },
    Class {
        expected: NamedNode,
    },
    NodeKind {
        expected: NodeKind,
    },
    MinExclusive {
        bound: Literal,
    },
    MinInclusive {
        bound: Literal,
    },
    MaxExclusive {
        bound: Literal,
    },
    MaxInclusive {
        bound: Literal,
    },
    /// `actual` is `None` for values without a lexical form (blank nodes).
    MinLength {
        min: u64,
        actual: Option<usize>,
    },
    MaxLength {
        max: u64,
        actual: Option<usize>,
    },
    Pattern {
        pattern: String,
        flags: Option<String>,
    },
    LanguageIn {
        languages: Vec<String>,
    },
    UniqueLang {
        language: String,
    },
    In {
        allowed: Vec<Term>,
    },
    HasValue {
        expected: Term,
    },
    QualifiedMinCount {
        class: NamedNode,
        min: u64,
        actual: usize,
    },
    QualifiedMaxCount {
        class: NamedNode,
        max: u64,
        actual: usize,
    },
    Equals {
        property: NamedNode,
    },
    Disjoint {
        property: NamedNode,
    },
    LessThan {
        property: NamedNode,
    },
    LessThanOrEquals {
        property: NamedNode,
    },
    Closed {
        property: NamedNode,
    },
    /// A logical combinator failed. `passed` is the number of references the subject
    /// conformed to, duplicates counted.
    Combinator {
        kind: CombinatorKind,
        shapes: Vec<ShapeId>,
        passed: usize,
    },
    /// The SPARQL constraint returned solutions.
    Sparql {
        rows: Vec<QueryRow>,
    },
    /// The SPARQL constraint could not be evaluated.
    QueryFailure {
        error: QueryError,
    },
}

impl ResultDetail {
    /// The constraint component that produced this result.
    pub fn component(&self) -> ConstraintComponent {
        match self {
            Self::MinCount { .. } => ConstraintComponent::MinCount,
            Self::MaxCount { .. } => ConstraintComponent::MaxCount,
            Self::Datatype { .. } => ConstraintComponent::Datatype,
            Self::Class { .. } => ConstraintComponent::Class,
            Self::NodeKind { .. } => ConstraintComponent::NodeKind,
            Self::MinExclusive { .. } => ConstraintComponent::MinExclusive,
            Self::MinInclusive { .. } => ConstraintComponent::MinInclusive,
            Self::MaxExclusive { .. } => ConstraintComponent::MaxExclusive,
            Self::MaxInclusive { .. } => ConstraintComponent::MaxInclusive,
            Self::MinLength { .. } => ConstraintComponent::MinLength,
            Self::MaxLength { .. } => ConstraintComponent::MaxLength,
            Self::Pattern { .. } => ConstraintComponent::Pattern,
            Self::LanguageIn { .. } => ConstraintComponent::LanguageIn,
            Self::UniqueLang { .. } => ConstraintComponent::UniqueLang,
            Self::In { .. } => ConstraintComponent::In,
            Self::HasValue { .. } => ConstraintComponent::HasValue,
            Self::QualifiedMinCount { .. } => ConstraintComponent::QualifiedMinCount,
            Self::QualifiedMaxCount { .. } => ConstraintComponent::QualifiedMaxCount,
            Self::Equals { .. } => ConstraintComponent::Equals,
            Self::Disjoint { .. } => ConstraintComponent::Disjoint,
            Self::LessThan { .. } => ConstraintComponent::LessThan,
            Self::LessThanOrEquals { .. } => ConstraintComponent::LessThanOrEquals,
            Self::Closed { .. } => ConstraintComponent::Closed,
            Self::Combinator { kind, .. } => kind.component(),
            Self::Sparql { .. } | Self::QueryFailure { .. } => ConstraintComponent::Sparql,
        }
    }
}

impl fmt::Display for ResultDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinCount { min, actual } => {
                write!(f, "Expected at least {min} value(s), found {actual}")
            }
            Self::MaxCount { max, actual } => {
                write!(f, "Expected at most {max} value(s), found {actual}")
            }
            Self::Datatype {
                expected,
                ill_typed: true,
                ..
            } => write!(f, "Value is an ill-typed {expected} literal"),
            Self::Datatype {
                expected,
                actual: Some(actual),
                ..
            } => write!(f, "Value has datatype {actual}, expected {expected}"),
            Self::Datatype { expected, .. } => {
                write!(f, "Value is not a literal, expected datatype {expected}")
            }
            Self::Class { expected } => write!(f, "Value is not an instance of {expected}"),
            Self::NodeKind { expected } => write!(f, "Value is not of node kind {expected}"),
            Self::MinExclusive { bound } => write!(f, "Value is not greater than {bound}"),
            Self::MinInclusive { bound } => {
                write!(f, "Value is not greater than or equal to {bound}")
            }
            Self::MaxExclusive { bound } => write!(f, "Value is not less than {bound}"),
            Self::MaxInclusive { bound } => {
                write!(f, "Value is not less than or equal to {bound}")
            }
            Self::MinLength { min, actual } => match actual {
                Some(actual) => write!(f, "Value has length {actual}, expected at least {min}"),
                None => write!(f, "Value has no string form, expected length at least {min}"),
            },
            Self::MaxLength { max, actual } => match actual {
                Some(actual) => write!(f, "Value has length {actual}, expected at most {max}"),
                None => write!(f, "Value has no string form, expected length at most {max}"),
            },
            Self::Pattern { pattern, flags } => match flags {
                Some(flags) => write!(f, "Value does not match /{pattern}/{flags}"),
                None => write!(f, "Value does not match /{pattern}/"),
            },
            Self::LanguageIn { languages } => {
                write!(f, "Language tag not in [{}]", languages.join(", "))
            }
            Self::UniqueLang { language } => {
                write!(f, "Language tag \"{language}\" is used by several values")
            }
            Self::In { allowed } => {
                f.write_str("Value is not in [")?;
                for (i, value) in allowed.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::HasValue { expected } => write!(f, "Missing expected value {expected}"),
            Self::QualifiedMinCount { class, min, actual } => write!(
                f,
                "Expected at least {min} value(s) of class {class}, found {actual}"
            ),
            Self::QualifiedMaxCount { class, max, actual } => write!(
                f,
                "Expected at most {max} value(s) of class {class}, found {actual}"
            ),
            Self::Equals { property } => write!(f, "Values differ from the values of {property}"),
            Self::Disjoint { property } => write!(f, "Value is also a value of {property}"),
            Self::LessThan { property } => {
                write!(f, "Value is not less than the values of {property}")
            }
            Self::LessThanOrEquals { property } => write!(
                f,
                "Value is not less than or equal to the values of {property}"
            ),
            Self::Closed { property } => write!(f, "Property {property} is not allowed"),
            Self::Combinator {
                kind,
                shapes,
                passed,
            } => write!(
                f,
                "{kind} constraint failed: conforms to {passed} of {} shape(s)",
                shapes.len()
            ),
            Self::Sparql { rows } => write!(f, "SPARQL constraint returned {} row(s)", rows.len()),
            Self::QueryFailure { error } => write!(f, "SPARQL constraint failed: {error}"),
        }
    }
}

/// A single validation result.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub focus_node: Term,
    /// The path of the property shape, `None` for node level results.
    pub result_path: Option<PropertyPath>,
    /// The value node that failed.
    pub value: Option<Term>,
    pub source_shape: ShapeId,
    pub severity: Severity,
    pub message: Option<String>,
    pub detail: ResultDetail,
}

impl ValidationResult {
    /// Creates a violation with no path, value or message.
    pub fn new(focus_node: Term, source_shape: ShapeId, detail: ResultDetail) -> Self {
        Self {
            focus_node,
            result_path: None,
            value: None,
            source_shape,
            severity: Severity::Violation,
            message: None,
            detail,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: PropertyPath) -> Self {
        self.result_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: Term) -> Self {
        self.value = Some(value);
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

    /// The constraint component that produced this result.
    pub fn source_constraint_component(&self) -> ConstraintComponent {
        self.detail.component()
    }
}

/// A SHACL validation report.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    conforms: bool,
    results: Vec<ValidationResult>,
}

impl ValidationReport {
    /// Creates an empty, conforming, report.
    pub fn new() -> Self {
        Self {
            conforms: true,
            results: Vec::new(),
        }
    }

    /// Returns `true` iff no result has the [`Severity::Violation`] severity.
    pub fn conforms(&self) -> bool {
        self.conforms
    }

    /// The results, in the order they were added.
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ValidationResult> {
        self.results
    }

    /// Appends a result and updates the conformance flag.
    pub fn add_result(&mut self, result: ValidationResult) {
        self.conforms &= result.severity != Severity::Violation;
        self.results.push(result);
    }

    /// Appends all the results of `other`.
    pub fn merge(&mut self, other: Self) {
        self.extend(other.results);
    }

    pub fn violation_count(&self) -> usize {
        self.count(Severity::Violation)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    fn count(&self, severity: Severity) -> usize {
        self.results
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Serializes the report to an RDF graph using the SHACL vocabulary.
    ///
    /// Absent optional values (path, value, message) produce no triple.
    pub fn to_graph(&self) -> Graph {
        let mut graph = Graph::new();
        let report = BlankNode::default();
        graph.insert(&Triple::new(
            report.clone(),
            rdf::TYPE,
            sh::VALIDATION_REPORT,
        ));
        graph.insert(&Triple::new(
            report.clone(),
            sh::CONFORMS,
            Literal::new_typed_literal(self.conforms.to_string(), xsd::BOOLEAN),
        ));
        for result in &self.results {
            let node = BlankNode::default();
            graph.insert(&Triple::new(report.clone(), sh::RESULT, node.clone()));
            graph.insert(&Triple::new(node.clone(), rdf::TYPE, sh::VALIDATION_RESULT));
            graph.insert(&Triple::new(
                node.clone(),
                sh::FOCUS_NODE,
                result.focus_node.clone(),
            ));
            if let Some(path) = &result.result_path {
                let path = write_path(&mut graph, path);
                graph.insert(&Triple::new(node.clone(), sh::RESULT_PATH, path));
            }
            if let Some(value) = &result.value {
                graph.insert(&Triple::new(node.clone(), sh::VALUE, value.clone()));
            }
            graph.insert(&Triple::new(
                node.clone(),
                sh::SOURCE_SHAPE,
                result.source_shape.to_term(),
            ));
            graph.insert(&Triple::new(
                node.clone(),
                sh::SOURCE_CONSTRAINT_COMPONENT,
                result.source_constraint_component().iri(),
            ));
            graph.insert(&Triple::new(
                node.clone(),
                sh::RESULT_SEVERITY,
                result.severity.iri(),
            ));
            if let Some(message) = &result.message {
                graph.insert(&Triple::new(
                    node,
                    sh::RESULT_MESSAGE,
                    Literal::new_simple_literal(message),
                ));
            }
        }
        graph
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<ValidationResult> for ValidationReport {
    fn extend<I: IntoIterator<Item = ValidationResult>>(&mut self, iter: I) {
        for result in iter {
            self.add_result(result);
        }
    }
}

impl FromIterator<ValidationResult> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = ValidationResult>>(iter: I) -> Self {
        let mut report = Self::new();
        report.extend(iter);
        report
    }
}

/// Writes the SHACL encoding of `path` and returns its root.
fn write_path(graph: &mut Graph, path: &PropertyPath) -> Term {
    let (predicate, inner) = match path {
        PropertyPath::Predicate(p) => return p.clone().into(),
        PropertyPath::Sequence(steps) => {
            let steps = steps.iter().map(|s| write_path(graph, s)).collect::<Vec<_>>();
            return write_list(graph, steps);
        }
        PropertyPath::Alternative(alternatives) => {
            let alternatives = alternatives
                .iter()
                .map(|a| write_path(graph, a))
                .collect::<Vec<_>>();
            let list = write_list(graph, alternatives);
            let root = BlankNode::default();
            graph.insert(&Triple::new(root.clone(), sh::ALTERNATIVE_PATH, list));
            return root.into();
        }
        PropertyPath::Inverse(inner) => (sh::INVERSE_PATH, inner),
        PropertyPath::ZeroOrMore(inner) => (sh::ZERO_OR_MORE_PATH, inner),
        PropertyPath::OneOrMore(inner) => (sh::ONE_OR_MORE_PATH, inner),
        PropertyPath::ZeroOrOne(inner) => (sh::ZERO_OR_ONE_PATH, inner),
    };
    let inner = write_path(graph, inner);
    let root = BlankNode::default();
    graph.insert(&Triple::new(root.clone(), predicate, inner));
    root.into()
}

fn write_list(graph: &mut Graph, elements: Vec<Term>) -> Term {
    let mut head: Term = rdf::NIL.into_owned().into();
    for element in elements.into_iter().rev() {
        let cell = BlankNode::default();
        graph.insert(&Triple::new(cell.clone(), rdf::FIRST, element));
        graph.insert(&Triple::new(cell.clone(), rdf::REST, head));
        head = cell.into();
    }
    head
}
