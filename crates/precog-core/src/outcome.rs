//! Validation outcome types
//!
//! A schema engine reports raw [`Issue`]s; the validator adapter folds them
//! into an insertion-ordered [`ErrorBag`] and wraps the result in a
//! [`ValidationOutcome`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::path;

/// Default message attached to a failed form validation
pub const DEFAULT_FORM_ERROR_MESSAGE: &str = "Invalid form data";

/// A single failure reported by a schema engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Path segments to the failing value (`["tags", "0"]`)
    pub path: Vec<String>,
    /// Human-readable message
    pub message: String,
}

impl Issue {
    /// Create an issue from path segments
    pub fn new<S: Into<String>>(path: impl IntoIterator<Item = S>, message: impl Into<String>) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Create an issue from a dot path
    pub fn at(dot_path: &str, message: impl Into<String>) -> Self {
        let path = if dot_path.is_empty() {
            Vec::new()
        } else {
            dot_path.split('.').map(str::to_string).collect()
        };
        Self {
            path,
            message: message.into(),
        }
    }

    /// Dot-joined path
    pub fn dot_path(&self) -> String {
        path::join(&self.path)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.dot_path(), self.message)
    }
}

/// Insertion-ordered mapping from field path to error messages.
///
/// The first message recorded for a path is the one surfaced by
/// [`ErrorBag::get`]; all messages are kept for the grouped wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBag {
    entries: IndexMap<String, Vec<String>>,
}

impl ErrorBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold issues into a bag, keeping their order
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut bag = Self::new();
        for issue in issues {
            bag.push(issue.dot_path(), issue.message.clone());
        }
        bag
    }

    /// Record a message for a path
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(path.into())
            .or_default()
            .push(message.into());
    }

    /// First message for a path
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .get(path)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// First message of the first path
    pub fn first_message(&self) -> Option<&str> {
        self.entries
            .values()
            .next()
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths in insertion order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(path, first message)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(path, messages)| {
            messages.first().map(|m| (path.as_str(), m.as_str()))
        })
    }

    /// Every message grouped by path, as sent over the wire
    pub fn grouped(&self) -> &IndexMap<String, Vec<String>> {
        &self.entries
    }

    /// Keep only the paths accepted by `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|path, _| keep(path));
    }
}

/// Result of running the validator adapter
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Schema (and additional validation) passed
    Success {
        /// Validated output data
        data: Value,
    },
    /// At least one check failed
    Failure {
        /// Failing paths, filtered to the requested keys when a filter was given
        errors: ErrorBag,
        /// Form-level message
        message: String,
        /// The key filter that was applied, if any
        keys: Option<Vec<String>>,
    },
}

impl ValidationOutcome {
    /// Whether the outcome should be treated as passing.
    ///
    /// A filtered failure whose error set came out empty passes: the failing
    /// paths were all outside the requested keys.
    pub fn passed(&self) -> bool {
        match self {
            ValidationOutcome::Success { .. } => true,
            ValidationOutcome::Failure { errors, .. } => errors.is_empty(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success { .. })
    }

    /// Error bag, empty on success
    pub fn errors(&self) -> ErrorBag {
        match self {
            ValidationOutcome::Success { .. } => ErrorBag::new(),
            ValidationOutcome::Failure { errors, .. } => errors.clone(),
        }
    }

    /// Validated data, when the schema passed
    pub fn data(&self) -> Option<&Value> {
        match self {
            ValidationOutcome::Success { data } => Some(data),
            ValidationOutcome::Failure { .. } => None,
        }
    }
}
