//! Schema capability
//!
//! The validation engine itself is pluggable: anything that can take a data
//! value and answer "valid, here is the output" or "invalid, here are the
//! `(path, message)` failures" implements [`Schema`].
//!
//! Two engines ship with the crate:
//! - [`RuleSchema`]: declarative per-field rules with custom messages
//! - [`JsonSchema`]: adapter over the `jsonschema` crate

pub mod json_schema;
pub mod rules;

pub use json_schema::JsonSchema;
pub use rules::{FieldRule, Refinement, RuleSchema};

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::outcome::Issue;

/// Non-throwing parse result: validated output or the list of failures
pub type ParseResult = Result<Value, Vec<Issue>>;

/// A schema engine
pub trait Schema: Send + Sync {
    /// Parse `data` without treating validation failure as an error.
    ///
    /// `Err(SchemaError)` is reserved for a broken schema, never for bad data.
    fn safe_parse(&self, data: &Value) -> Result<ParseResult, SchemaError>;
}

impl<S: Schema + ?Sized> Schema for Arc<S> {
    fn safe_parse(&self, data: &Value) -> Result<ParseResult, SchemaError> {
        (**self).safe_parse(data)
    }
}

type SchemaFactory = dyn Fn() -> Arc<dyn Schema> + Send + Sync;

/// Where the adapter gets its schema from
#[derive(Clone)]
pub enum SchemaSource {
    /// One schema for the adapter's lifetime
    Static(Arc<dyn Schema>),
    /// Re-invoked on every validation call (schemas closing over locale etc.)
    Factory(Arc<SchemaFactory>),
}

impl SchemaSource {
    /// Wrap a schema
    pub fn new(schema: impl Schema + 'static) -> Self {
        SchemaSource::Static(Arc::new(schema))
    }

    /// Wrap a schema factory
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Schema> + Send + Sync + 'static,
    {
        SchemaSource::Factory(Arc::new(factory))
    }

    /// Resolve the schema for one validation call
    pub fn resolve(&self) -> Arc<dyn Schema> {
        match self {
            SchemaSource::Static(schema) => Arc::clone(schema),
            SchemaSource::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Static(_) => write!(f, "SchemaSource::Static"),
            SchemaSource::Factory(_) => write!(f, "SchemaSource::Factory"),
        }
    }
}

impl From<Arc<dyn Schema>> for SchemaSource {
    fn from(schema: Arc<dyn Schema>) -> Self {
        SchemaSource::Static(schema)
    }
}

/// Closure-backed schema
pub struct FnSchema<F> {
    parse: F,
}

impl<F> FnSchema<F>
where
    F: Fn(&Value) -> ParseResult + Send + Sync,
{
    pub fn new(parse: F) -> Self {
        Self { parse }
    }
}

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> ParseResult + Send + Sync,
{
    fn safe_parse(&self, data: &Value) -> Result<ParseResult, SchemaError> {
        Ok((self.parse)(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fn_schema() {
        let schema = FnSchema::new(|data: &Value| {
            if data.get("name").is_some() {
                Ok(data.clone())
            } else {
                Err(vec![Issue::at("name", "Required")])
            }
        });

        assert!(schema.safe_parse(&json!({"name": "x"})).unwrap().is_ok());
        let issues = schema.safe_parse(&json!({})).unwrap().unwrap_err();
        assert_eq!(issues[0].dot_path(), "name");
    }

    #[test]
    fn test_factory_is_reinvoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = SchemaSource::factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(FnSchema::new(|data: &Value| Ok(data.clone()))) as Arc<dyn Schema>
        });

        source.resolve();
        source.resolve();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
