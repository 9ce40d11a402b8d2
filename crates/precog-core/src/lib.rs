//! Precog Core
//!
//! Shared building blocks for precognitive forms: the client-side form
//! session and the server-side request guard validate with the same schema
//! through the same adapter.
//!
//! ## Modules
//!
//! - `path`: dot-joined field paths, leaf enumeration, nested get/set
//! - `outcome`: issues, the ordered error bag, validation outcomes
//! - `schema`: the [`Schema`] capability plus the rule and JSON Schema engines
//! - `validator`: the [`ValidatorAdapter`]
//!
//! ## Example
//!
//! ```rust
//! use precog_core::schema::{FieldRule, RuleSchema};
//! use precog_core::ValidatorAdapter;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let validator = ValidatorAdapter::from_schema(
//!     RuleSchema::new().field(FieldRule::new("age").number().min(18.0)),
//! );
//!
//! let outcome = validator.validate(&json!({"age": 10}), None).await.unwrap();
//! assert_eq!(outcome.errors().get("age"), Some("Number must be greater than or equal to 18"));
//! # }
//! ```

pub mod error;
pub mod outcome;
pub mod path;
pub mod schema;
pub mod validator;

pub use error::{PathError, SchemaError};
pub use outcome::{ErrorBag, Issue, ValidationOutcome, DEFAULT_FORM_ERROR_MESSAGE};
pub use schema::{FnSchema, JsonSchema, ParseResult, RuleSchema, Schema, SchemaSource};
pub use validator::{AdditionalValidation, ValidatorAdapter};
