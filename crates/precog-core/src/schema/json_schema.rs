//! JSON Schema engine
//!
//! Wraps a compiled `jsonschema` validator. Failure paths come from the
//! instance pointer of each error, converted to dot paths. A missing
//! required property is reported at the property itself, not its parent.

use jsonschema::error::ValidationErrorKind;
use serde_json::Value;

use super::{ParseResult, Schema};
use crate::error::SchemaError;
use crate::outcome::Issue;
use crate::path;

/// Schema backed by a JSON Schema document
pub struct JsonSchema {
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compile a schema document (draft auto-detected)
    pub fn compile(document: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(document)
            .map_err(|e| SchemaError::invalid_schema(e.to_string()))?;
        Ok(Self { validator })
    }
}

impl Schema for JsonSchema {
    fn safe_parse(&self, data: &Value) -> Result<ParseResult, SchemaError> {
        let issues: Vec<Issue> = self
            .validator
            .iter_errors(data)
            .map(|error| {
                let mut dot_path = path::from_pointer(&error.instance_path.to_string());
                // `required` and `dependentRequired` both report through this kind
                if let ValidationErrorKind::Required { property } = &error.kind {
                    let property = match property {
                        Value::String(name) => name.clone(),
                        other => other.to_string(),
                    };
                    dot_path = if dot_path.is_empty() {
                        property
                    } else {
                        format!("{}.{}", dot_path, property)
                    };
                }
                Issue::at(&dot_path, error.to_string())
            })
            .collect();

        if issues.is_empty() {
            Ok(Ok(data.clone()))
        } else {
            Ok(Err(issues))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "type": "object",
            "properties": {
                "age": { "type": "number", "minimum": 18 },
                "tags": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["age"]
        })
    }

    #[test]
    fn test_valid_instance() {
        let schema = JsonSchema::compile(&document()).unwrap();
        let data = json!({"age": 20, "tags": ["a"]});
        assert_eq!(schema.safe_parse(&data).unwrap(), Ok(data));
    }

    #[test]
    fn test_failure_paths_are_dot_paths() {
        let schema = JsonSchema::compile(&document()).unwrap();
        let issues = schema
            .safe_parse(&json!({"age": 10, "tags": ["a", 2]}))
            .unwrap()
            .unwrap_err();

        let mut paths: Vec<String> = issues.iter().map(Issue::dot_path).collect();
        paths.sort();
        assert_eq!(paths, vec!["age", "tags.1"]);
    }

    #[test]
    fn test_missing_required_property_is_reported_at_the_property() {
        let schema = JsonSchema::compile(&document()).unwrap();
        let issues = schema.safe_parse(&json!({})).unwrap().unwrap_err();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].dot_path(), "age");
    }

    #[test]
    fn test_missing_nested_and_dependent_properties() {
        let schema = JsonSchema::compile(&json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {
                "address": {
                    "type": "object",
                    "required": ["city"]
                }
            },
            "dependentRequired": { "password": ["passwordConfirmation"] }
        }))
        .unwrap();
        let issues = schema
            .safe_parse(&json!({"address": {}, "password": "hunter22"}))
            .unwrap()
            .unwrap_err();

        let mut paths: Vec<String> = issues.iter().map(Issue::dot_path).collect();
        paths.sort();
        assert_eq!(paths, vec!["address.city", "passwordConfirmation"]);
    }

    #[tokio::test]
    async fn test_scoped_validation_sees_missing_required_property() {
        let adapter = crate::ValidatorAdapter::from_schema(JsonSchema::compile(&document()).unwrap());
        let keys = vec!["age".to_string()];
        let outcome = adapter.validate(&json!({}), Some(keys.as_slice())).await.unwrap();

        assert!(!outcome.passed());
    }

    #[test]
    fn test_malformed_document() {
        let result = JsonSchema::compile(&json!({"type": "no-such-type"}));
        assert!(matches!(result, Err(SchemaError::InvalidSchema(_))));
    }
}
