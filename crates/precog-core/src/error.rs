//! Error types for precog-core
//!
//! Ordinary validation failures are never errors here; they travel as
//! [`ValidationOutcome::Failure`](crate::ValidationOutcome). The types below
//! cover programming misuse only.

use thiserror::Error;

/// Fatal schema misuse (malformed schema document, broken rule definition)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema document could not be compiled
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A rule was declared with an unusable definition
    #[error("Invalid rule at '{path}': {reason}")]
    InvalidRule { path: String, reason: String },

    /// Additional validation step failed to run
    #[error("Additional validation failed to run: {0}")]
    Additional(String),
}

impl SchemaError {
    /// Create an invalid schema error
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        SchemaError::InvalidSchema(msg.into())
    }

    /// Create an invalid rule error
    pub fn invalid_rule(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidRule {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while reading or writing a field path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Empty path or empty segment (e.g. `a..b`)
    #[error("Empty field path segment in '{0}'")]
    EmptySegment(String),

    /// A scalar sits where a container is needed
    #[error("Cannot descend into scalar at '{at}' while resolving '{path}'")]
    NotAContainer { path: String, at: String },

    /// A non-numeric segment was used to index an array
    #[error("Segment '{segment}' is not an array index in '{path}'")]
    NotAnIndex { path: String, segment: String },

    /// An array index too far past the end of the array to pad up to
    #[error("Index {index} is out of range in '{path}' (array length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
}
