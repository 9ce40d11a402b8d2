//! Declarative rule schema
//!
//! Rules are declared per field path and evaluated in declaration order.
//! Each check can carry its own message; otherwise a default message is used.
//!
//! ```rust
//! use precog_core::schema::{FieldRule, RuleSchema};
//!
//! let schema = RuleSchema::new()
//!     .field(FieldRule::new("name").string().min_length(3))
//!     .field(
//!         FieldRule::new("age")
//!             .number()
//!             .min(18.0)
//!             .message("This field cannot be less than 18"),
//!     )
//!     .field(FieldRule::new("tags.*").string());
//! ```
//!
//! A `*` segment fans out over every element of an array (or every value of
//! an object). Refinements run only once every field rule has passed.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::{ParseResult, Schema};
use crate::error::SchemaError;
use crate::outcome::Issue;
use crate::path::{self, Segment};

/// JSON value kinds a field can be required to have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::String => write!(f, "string"),
            ValueKind::Number => write!(f, "number"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Array => write!(f, "array"),
            ValueKind::Object => write!(f, "object"),
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One check applied to a field value
#[derive(Debug, Clone)]
enum Check {
    Kind(ValueKind),
    Min(f64),
    Max(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Email,
    OneOf(Vec<Value>),
}

#[derive(Debug, Clone)]
struct Constraint {
    check: Check,
    message: Option<String>,
}

/// Rules for one field path
#[derive(Debug, Clone)]
pub struct FieldRule {
    path: String,
    required: bool,
    required_message: Option<String>,
    constraints: Vec<Constraint>,
    invalid: Option<String>,
}

impl FieldRule {
    /// Start a rule for `path`; fields are required unless marked optional
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required: true,
            required_message: None,
            constraints: Vec::new(),
            invalid: None,
        }
    }

    /// Allow the field to be absent or null
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Message used when the field is missing
    pub fn required_message(mut self, message: impl Into<String>) -> Self {
        self.required_message = Some(message.into());
        self
    }

    pub fn string(self) -> Self {
        self.push(Check::Kind(ValueKind::String))
    }

    pub fn number(self) -> Self {
        self.push(Check::Kind(ValueKind::Number))
    }

    pub fn integer(self) -> Self {
        self.push(Check::Kind(ValueKind::Integer))
    }

    pub fn boolean(self) -> Self {
        self.push(Check::Kind(ValueKind::Boolean))
    }

    pub fn array(self) -> Self {
        self.push(Check::Kind(ValueKind::Array))
    }

    pub fn object(self) -> Self {
        self.push(Check::Kind(ValueKind::Object))
    }

    /// Numeric lower bound (inclusive)
    pub fn min(self, min: f64) -> Self {
        self.push(Check::Min(min))
    }

    /// Numeric upper bound (inclusive)
    pub fn max(self, max: f64) -> Self {
        self.push(Check::Max(max))
    }

    /// Minimum string length (in characters) or array length
    pub fn min_length(self, len: usize) -> Self {
        self.push(Check::MinLength(len))
    }

    /// Maximum string length (in characters) or array length
    pub fn max_length(self, len: usize) -> Self {
        self.push(Check::MaxLength(len))
    }

    /// String must match `pattern`. A pattern that fails to compile makes
    /// the whole schema unusable at parse time.
    pub fn pattern(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => self.push(Check::Pattern(regex)),
            Err(e) => {
                self.invalid = Some(format!("invalid pattern '{}': {}", pattern, e));
                self
            }
        }
    }

    pub fn email(self) -> Self {
        self.push(Check::Email)
    }

    /// Value must equal one of `allowed`
    pub fn one_of(self, allowed: impl IntoIterator<Item = Value>) -> Self {
        self.push(Check::OneOf(allowed.into_iter().collect()))
    }

    /// Override the message of the most recently added check
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.constraints.last_mut() {
            last.message = Some(message.into());
        } else {
            self.required_message = Some(message.into());
        }
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn push(mut self, check: Check) -> Self {
        self.constraints.push(Constraint {
            check,
            message: None,
        });
        self
    }

    fn evaluate(&self, concrete_path: &str, value: Option<&Value>, issues: &mut Vec<Issue>) {
        let value = match value {
            Some(Value::Null) | None => {
                if self.required {
                    let message = self
                        .required_message
                        .clone()
                        .unwrap_or_else(|| "Required".to_string());
                    issues.push(Issue::at(concrete_path, message));
                }
                return;
            }
            Some(value) => value,
        };

        for constraint in &self.constraints {
            if let Some(default_message) = check_value(&constraint.check, value) {
                let message = constraint.message.clone().unwrap_or(default_message);
                issues.push(Issue::at(concrete_path, message));

                // Later checks assume the type held
                if matches!(constraint.check, Check::Kind(_)) {
                    return;
                }
            }
        }
    }
}

/// Returns the default failure message when `value` fails `check`
fn check_value(check: &Check, value: &Value) -> Option<String> {
    match check {
        Check::Kind(kind) => (!kind.matches(value))
            .then(|| format!("Expected {}, received {}", kind, kind_name(value))),
        Check::Min(min) => value
            .as_f64()
            .filter(|v| v < min)
            .map(|_| format!("Number must be greater than or equal to {}", min)),
        Check::Max(max) => value
            .as_f64()
            .filter(|v| v > max)
            .map(|_| format!("Number must be less than or equal to {}", max)),
        Check::MinLength(len) => match value {
            Value::String(s) if s.chars().count() < *len => Some(format!(
                "String must contain at least {} character(s)",
                len
            )),
            Value::Array(items) if items.len() < *len => Some(format!(
                "Array must contain at least {} element(s)",
                len
            )),
            _ => None,
        },
        Check::MaxLength(len) => match value {
            Value::String(s) if s.chars().count() > *len => Some(format!(
                "String must contain at most {} character(s)",
                len
            )),
            Value::Array(items) if items.len() > *len => Some(format!(
                "Array must contain at most {} element(s)",
                len
            )),
            _ => None,
        },
        Check::Pattern(regex) => value
            .as_str()
            .filter(|s| !regex.is_match(s))
            .map(|_| "Invalid".to_string()),
        Check::Email => value
            .as_str()
            .filter(|s| !looks_like_email(s))
            .map(|_| "Invalid email".to_string()),
        Check::OneOf(allowed) => (!allowed.contains(value)).then(|| {
            let expected: Vec<String> = allowed.iter().map(Value::to_string).collect();
            format!(
                "Invalid enum value. Expected {}, received {}",
                expected.join(" | "),
                value
            )
        }),
    }
}

fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = s.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

type RefineFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Cross-field check reported at a chosen path
#[derive(Clone)]
pub struct Refinement {
    path: String,
    message: String,
    check: Arc<RefineFn>,
}

impl Refinement {
    /// `check` returns true when the data is acceptable
    pub fn new<F>(path: impl Into<String>, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            message: message.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refinement")
            .field("path", &self.path)
            .field("message", &self.message)
            .finish()
    }
}

/// Schema built from field rules and refinements
#[derive(Debug, Clone, Default)]
pub struct RuleSchema {
    fields: Vec<FieldRule>,
    refinements: Vec<Refinement>,
}

impl RuleSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field rule
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Add a cross-field refinement
    pub fn refine(mut self, refinement: Refinement) -> Self {
        self.refinements.push(refinement);
        self
    }

    /// Declared field rules
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }
}

impl Schema for RuleSchema {
    fn safe_parse(&self, data: &Value) -> Result<ParseResult, SchemaError> {
        if !data.is_object() {
            return Err(SchemaError::invalid_schema(format!(
                "rule schemas validate objects, received {}",
                kind_name(data)
            )));
        }

        let mut issues = Vec::new();

        for rule in &self.fields {
            if let Some(reason) = &rule.invalid {
                return Err(SchemaError::invalid_rule(&rule.path, reason));
            }

            let segments = path::split(&rule.path)
                .map_err(|e| SchemaError::invalid_rule(&rule.path, e.to_string()))?;

            for concrete in expand(data, &segments) {
                rule.evaluate(&concrete, path::get(data, &concrete), &mut issues);
            }
        }

        if issues.is_empty() {
            for refinement in &self.refinements {
                if !(refinement.check)(data) {
                    issues.push(Issue::at(&refinement.path, refinement.message.clone()));
                }
            }
        }

        if issues.is_empty() {
            Ok(Ok(data.clone()))
        } else {
            Ok(Err(issues))
        }
    }
}

/// Expand `*` segments against the data into concrete dot paths
fn expand(data: &Value, segments: &[Segment]) -> Vec<String> {
    let mut out = Vec::new();
    expand_into(Some(data), segments, &mut Vec::new(), &mut out);
    out
}

fn expand_into(
    current: Option<&Value>,
    segments: &[Segment],
    prefix: &mut Vec<String>,
    out: &mut Vec<String>,
) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(path::join(prefix));
        return;
    };

    if matches!(head, Segment::Key(key) if key == "*") {
        let children: Vec<(String, &Value)> = match current {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            _ => Vec::new(),
        };
        for (key, child) in children {
            prefix.push(key);
            expand_into(Some(child), rest, prefix, out);
            prefix.pop();
        }
        return;
    }

    let key = head.to_string();
    let next = match current {
        Some(Value::Object(map)) => map.get(&key),
        Some(Value::Array(items)) => match head {
            Segment::Index(i) => items.get(*i),
            Segment::Key(_) => None,
        },
        _ => None,
    };
    prefix.push(key);
    expand_into(next, rest, prefix, out);
    prefix.pop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user_schema() -> RuleSchema {
        RuleSchema::new()
            .field(FieldRule::new("name").string())
            .field(
                FieldRule::new("age")
                    .number()
                    .min(18.0)
                    .message("This field cannot be less than 18"),
            )
            .field(FieldRule::new("address.city").string())
            .field(FieldRule::new("tags").array().min_length(2))
            .field(FieldRule::new("tags.*").string())
    }

    fn paths(issues: &[Issue]) -> Vec<String> {
        issues.iter().map(Issue::dot_path).collect()
    }

    #[test]
    fn test_valid_data_passes_through() {
        let data = json!({
            "name": "John",
            "age": 25,
            "address": { "city": "New York" },
            "tags": ["a", "b"],
        });
        let parsed = user_schema().safe_parse(&data).unwrap();
        assert_eq!(parsed, Ok(data));
    }

    #[test]
    fn test_custom_message_and_wildcards() {
        let data = json!({
            "name": "John",
            "age": 10,
            "address": { "city": "New York" },
            "tags": ["a", null, 3],
        });
        let issues = user_schema().safe_parse(&data).unwrap().unwrap_err();

        assert_eq!(paths(&issues), vec!["age", "tags.1", "tags.2"]);
        assert_eq!(issues[0].message, "This field cannot be less than 18");
        assert_eq!(issues[1].message, "Required");
        assert_eq!(issues[2].message, "Expected string, received number");
    }

    #[test]
    fn test_type_failure_stops_field_checks() {
        let data = json!({
            "name": null,
            "age": "ten",
            "address": {},
            "tags": ["a"],
        });
        let issues = user_schema().safe_parse(&data).unwrap().unwrap_err();

        assert_eq!(paths(&issues), vec!["name", "age", "address.city", "tags"]);
        assert_eq!(issues[1].message, "Expected number, received string");
        assert_eq!(issues[3].message, "Array must contain at least 2 element(s)");
    }

    #[test]
    fn test_optional_field() {
        let schema = RuleSchema::new().field(FieldRule::new("nickname").optional().string());
        assert!(schema.safe_parse(&json!({})).unwrap().is_ok());
        assert!(schema.safe_parse(&json!({"nickname": 1})).unwrap().is_err());
    }

    #[test]
    fn test_email_pattern_and_enum() {
        let schema = RuleSchema::new()
            .field(FieldRule::new("email").string().email())
            .field(FieldRule::new("code").string().pattern("^[A-Z]{3}$"))
            .field(FieldRule::new("plan").one_of([json!("free"), json!("pro")]));

        let ok = json!({"email": "a@b.io", "code": "ABC", "plan": "pro"});
        assert!(schema.safe_parse(&ok).unwrap().is_ok());

        let bad = json!({"email": "not-an-email", "code": "abc", "plan": "gold"});
        let issues = schema.safe_parse(&bad).unwrap().unwrap_err();
        assert_eq!(paths(&issues), vec!["email", "code", "plan"]);
        assert_eq!(issues[0].message, "Invalid email");
    }

    #[test]
    fn test_refinement_runs_after_fields_pass() {
        let schema = RuleSchema::new()
            .field(FieldRule::new("password").string().min_length(8))
            .field(FieldRule::new("passwordConfirmation").string().min_length(8))
            .refine(Refinement::new(
                "passwordConfirmation",
                "Passwords do not match",
                |data| data.get("password") == data.get("passwordConfirmation"),
            ));

        let mismatch = json!({"password": "12345678", "passwordConfirmation": "87654321"});
        let issues = schema.safe_parse(&mismatch).unwrap().unwrap_err();
        assert_eq!(issues, vec![Issue::at("passwordConfirmation", "Passwords do not match")]);

        let short = json!({"password": "1", "passwordConfirmation": "2"});
        let issues = schema.safe_parse(&short).unwrap().unwrap_err();
        assert_eq!(paths(&issues), vec!["password", "passwordConfirmation"]);
    }

    #[test]
    fn test_invalid_pattern_is_schema_error() {
        let schema = RuleSchema::new().field(FieldRule::new("code").pattern("(unclosed"));
        let err = schema.safe_parse(&json!({"code": "x"})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRule { .. }));
    }

    #[test]
    fn test_non_object_data_is_schema_error() {
        let err = user_schema().safe_parse(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }
}
