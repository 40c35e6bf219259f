//! Error types for SHACL shape loading and validation.

use oxrdf::{NamedNode, Term};

/// Main error type for SHACL operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShaclError {
    /// Error building the shape model.
    #[error(transparent)]
    Parse(#[from] ShaclParseError),

    /// Error during validation.
    #[error(transparent)]
    Validation(#[from] ShaclValidationError),
}

/// Error raised while building shapes, either from an RDF graph or programmatically.
///
/// These errors are raised at construction time only: a shape model that was built
/// successfully never causes an evaluation error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShaclParseError {
    /// Invalid shape definition.
    #[error("Invalid shape definition for {shape}: {message}")]
    InvalidShape { shape: Term, message: String },

    /// Invalid property value.
    #[error(
        "Invalid value for property {property} in shape {shape}: expected {expected}, got {actual}"
    )]
    InvalidPropertyValue {
        shape: Term,
        property: NamedNode,
        expected: String,
        actual: Term,
    },

    /// Invalid property path.
    #[error("Invalid property path in shape {shape}: {message}")]
    InvalidPropertyPath { shape: Term, message: String },

    /// Invalid RDF list.
    #[error("Invalid RDF list in shape {shape}: {message}")]
    InvalidRdfList { shape: Term, message: String },

    /// The RDF list loops back on itself.
    #[error("Circular RDF list in shape {shape}")]
    CircularList { shape: Term },

    /// The RDF list is longer than the configured maximum.
    #[error("RDF list in shape {shape} is longer than {max_length} elements")]
    ListTooLong { shape: Term, max_length: usize },

    /// A SPARQL constraint query without the focus node placeholder.
    #[error("The query of the SPARQL constraint of {shape} does not mention {placeholder}")]
    MissingPlaceholder {
        shape: Term,
        placeholder: &'static str,
    },

    /// Invalid regular expression flags.
    #[error("Invalid regex flags '{flags}' for pattern '{pattern}'")]
    InvalidRegexFlags { pattern: String, flags: String },
}

/// Error type for validation operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShaclValidationError {
    /// The validation run has been cancelled.
    #[error("The SHACL validation has been cancelled")]
    Cancelled,

    /// Internal error.
    #[error("Internal validation error: {message}")]
    Internal { message: String },
}

impl ShaclParseError {
    /// Creates an invalid shape error.
    pub fn invalid_shape(shape: impl Into<Term>, message: impl Into<String>) -> Self {
        Self::InvalidShape {
            shape: shape.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid property value error.
    pub fn invalid_property_value(
        shape: impl Into<Term>,
        property: impl Into<NamedNode>,
        expected: impl Into<String>,
        actual: impl Into<Term>,
    ) -> Self {
        Self::InvalidPropertyValue {
            shape: shape.into(),
            property: property.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an invalid property path error.
    pub fn invalid_property_path(shape: impl Into<Term>, message: impl Into<String>) -> Self {
        Self::InvalidPropertyPath {
            shape: shape.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid RDF list error.
    pub fn invalid_rdf_list(shape: impl Into<Term>, message: impl Into<String>) -> Self {
        Self::InvalidRdfList {
            shape: shape.into(),
            message: message.into(),
        }
    }
}

impl ShaclValidationError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
