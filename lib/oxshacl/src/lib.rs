#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]
#![doc(html_logo_url = "https://raw.githubusercontent.com/oxigraph/oxigraph/main/logo.svg")]

pub mod constraints;
mod error;
mod graph;
mod literal;
mod loader;
pub mod logical;
mod model;
mod path;
mod pattern;
mod report;
pub mod sparql;
mod validator;
pub mod vocab;

pub use crate::error::{ShaclError, ShaclParseError, ShaclValidationError};
pub use crate::graph::DEFAULT_MAX_LIST_LENGTH;
pub use crate::loader::ShapesParser;
pub use crate::logical::CombinatorKind;
pub use crate::model::{
    ConstraintSet, LogicalConstraints, NodeKind, NodeShape, PropertyShape, QualifiedConstraint,
    Shape, ShapeId, ShapeTable, ShapesGraph, SparqlConstraint, Target,
};
pub use crate::path::PropertyPath;
pub use crate::pattern::{Pattern, PatternLimits, PatternRejection};
pub use crate::report::{
    ConstraintComponent, ResultDetail, Severity, ValidationReport, ValidationResult,
};
#[cfg(feature = "sparql")]
pub use crate::sparql::SparqlEngine;
pub use crate::sparql::{QueryEngine, QueryError, QueryRow};
pub use crate::validator::{CancellationFlag, ShaclValidator, ValidatorOptions};

/// Validates `data` against `shapes` with the default [`ValidatorOptions`].
pub fn validate(shapes: &ShapesGraph, data: &oxrdf::Graph) -> Result<ValidationReport, ShaclError> {
    ShaclValidator::new(shapes.clone()).validate(data)
}
