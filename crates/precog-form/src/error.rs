//! Error types for form sessions
//!
//! [`FormError`] is cloneable: one debounced validation run can answer many
//! collapsed `validate` calls with the same result.

use precog_core::{ErrorBag, PathError, SchemaError};
use thiserror::Error;

/// Errors from session operations and validation runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    /// Submit or validate was called while the form was busy
    #[error("Form is currently disabled.")]
    Disabled,

    /// A debounced run fired while another validation pass was in flight
    #[error("Form already submitted for validation.")]
    ValidationInFlight,

    /// A pending debounced run was cancelled before it fired
    #[error("Validation was cancelled before it ran")]
    ValidationCancelled,

    /// The validation task ended without reporting back
    #[error("Validation task ended without reporting a result")]
    ValidationAborted,

    /// The data failed validation
    #[error("{message}")]
    Invalid { message: String, errors: ErrorBag },

    /// Initial data (or a patch) was not an object
    #[error("Form data must be an object, received {0}")]
    NotAnObject(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Failed to decode form data: {0}")]
    Decode(String),
}

impl FormError {
    /// Path-keyed errors when this is a validation failure
    pub fn validation_errors(&self) -> Option<&ErrorBag> {
        match self {
            FormError::Invalid { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Whether this is an expected, recoverable condition
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            FormError::Schema(_) | FormError::NotAnObject(_) | FormError::Path(_)
        )
    }
}

/// Errors rejecting a submit
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Form(#[from] FormError),

    /// `on_before` declined the submission
    #[error("Submission canceled")]
    Cancelled,

    /// The submit callback failed
    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}

impl SubmitError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SubmitError::Cancelled)
    }

    /// Path-keyed errors when submit failed validation
    pub fn validation_errors(&self) -> Option<&ErrorBag> {
        match self {
            SubmitError::Form(err) => err.validation_errors(),
            _ => None,
        }
    }
}
