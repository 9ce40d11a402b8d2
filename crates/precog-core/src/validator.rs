//! Validator adapter
//!
//! Normalizes a schema (or schema factory) plus an optional additional
//! validation step into one asynchronous operation:
//!
//! `validate(data, keys) -> ValidationOutcome`
//!
//! The adapter is stateless. It knows nothing about touched fields or
//! debouncing; that belongs to the form session.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::outcome::{ErrorBag, Issue, ValidationOutcome, DEFAULT_FORM_ERROR_MESSAGE};
use crate::schema::{ParseResult, Schema, SchemaSource};

/// Second validation step, run only after the schema parse succeeded.
///
/// Receives the schema's output data and returns the final output or the
/// failures, like [`Schema::safe_parse`].
#[async_trait]
pub trait AdditionalValidation: Send + Sync {
    async fn validate(&self, data: &Value) -> Result<ParseResult, SchemaError>;
}

#[async_trait]
impl<T: AdditionalValidation + ?Sized> AdditionalValidation for Arc<T> {
    async fn validate(&self, data: &Value) -> Result<ParseResult, SchemaError> {
        (**self).validate(data).await
    }
}

/// Schema-to-outcome normalization layer
#[derive(Clone)]
pub struct ValidatorAdapter {
    source: SchemaSource,
    additional: Option<Arc<dyn AdditionalValidation>>,
    form_error_message: String,
}

impl ValidatorAdapter {
    /// Create an adapter over a schema source
    pub fn new(source: impl Into<SchemaSource>) -> Self {
        Self {
            source: source.into(),
            additional: None,
            form_error_message: DEFAULT_FORM_ERROR_MESSAGE.to_string(),
        }
    }

    /// Create an adapter over a single schema
    pub fn from_schema(schema: impl Schema + 'static) -> Self {
        Self::new(SchemaSource::new(schema))
    }

    /// Add a second validation step
    pub fn with_additional(mut self, additional: impl AdditionalValidation + 'static) -> Self {
        self.additional = Some(Arc::new(additional));
        self
    }

    /// Override the form-level failure message
    pub fn with_form_error_message(mut self, message: impl Into<String>) -> Self {
        self.form_error_message = message.into();
        self
    }

    pub fn form_error_message(&self) -> &str {
        &self.form_error_message
    }

    /// Validate `data`, optionally reporting only the paths listed in `keys`.
    ///
    /// With a key filter, paths outside `keys` are dropped from the reported
    /// errors. If every failing path was dropped the outcome is a `Failure`
    /// with an empty error set, which [`ValidationOutcome::passed`] treats as
    /// passing for that slice.
    pub async fn validate(
        &self,
        data: &Value,
        keys: Option<&[String]>,
    ) -> Result<ValidationOutcome, SchemaError> {
        let schema = self.source.resolve();

        let parsed = match schema.safe_parse(data)? {
            Ok(parsed) => parsed,
            Err(issues) => return Ok(self.failure(&issues, keys)),
        };

        let Some(additional) = &self.additional else {
            return Ok(ValidationOutcome::Success { data: parsed });
        };

        match additional.validate(&parsed).await? {
            Ok(data) => Ok(ValidationOutcome::Success { data }),
            Err(issues) => Ok(self.failure(&issues, keys)),
        }
    }

    fn failure(&self, issues: &[Issue], keys: Option<&[String]>) -> ValidationOutcome {
        let mut errors = ErrorBag::from_issues(issues);

        if let Some(keys) = keys {
            errors.retain(|path| keys.iter().any(|k| k == path));
        }

        tracing::debug!(
            issue_count = issues.len(),
            reported = errors.len(),
            filtered = keys.is_some(),
            "Validation failed"
        );

        ValidationOutcome::Failure {
            errors,
            message: self.form_error_message.clone(),
            keys: keys.map(<[String]>::to_vec),
        }
    }
}

impl fmt::Debug for ValidatorAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorAdapter")
            .field("source", &self.source)
            .field("additional", &self.additional.is_some())
            .field("form_error_message", &self.form_error_message)
            .finish()
    }
}
