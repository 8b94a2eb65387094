use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::qname::QualifiedName;

/// Main library error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Parse(Diagnostic),

    #[error("Schema error: {details}")]
    Schema { details: String },

    #[error("Document does not validate: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Couldn't find node: {name}")]
    NotFound { name: QualifiedName },

    #[error("Found more than one matching node: {name} ({count} matches)")]
    AmbiguousMatch { name: QualifiedName, count: usize },

    #[error("Write error: {details}")]
    Write { details: String },

    #[error("Invalid query '{expression}': {details}")]
    InvalidQuery { expression: String, details: String },

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },
}

impl XmlError {
    pub(crate) fn schema(details: impl Into<String>) -> Self {
        XmlError::Schema {
            details: details.into(),
        }
    }

    pub(crate) fn write(details: impl Into<String>) -> Self {
        XmlError::Write {
            details: details.into(),
        }
    }

    pub(crate) fn internal(details: impl Into<String>) -> Self {
        XmlError::LibXml2Internal {
            details: details.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, XmlError>;
