//! Precog Form
//!
//! Stateful form sessions: owned field data, touched and error tracking,
//! trailing-edge debounced validation and a submit lifecycle with
//! `on_before` / `on_success` / `on_error` hooks.
//!
//! ## Modules
//!
//! - `session`: the [`FormSession`] engine
//! - `submit`: [`SubmitOptions`] and [`SubmitPhase`]
//! - `debounce`: the re-armable timer behind [`FormSession::validate`]
//! - `observer`: the [`StateObserver`] capability used for re-rendering
//! - `config`: [`FormConfig`]
//!
//! ## Example
//!
//! ```rust
//! use precog_core::schema::{FieldRule, RuleSchema};
//! use precog_core::ValidatorAdapter;
//! use precog_form::{FormConfig, FormSession, SubmitOptions};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let validator = ValidatorAdapter::from_schema(
//!     RuleSchema::new().field(FieldRule::new("age").number().min(18.0)),
//! );
//! let form = FormSession::new(
//!     validator,
//!     json!({"age": 21}),
//!     |data| async move { Ok(data["age"].clone()) },
//!     FormConfig::default(),
//! )
//! .unwrap();
//!
//! let response = form.submit(SubmitOptions::new()).await.unwrap();
//! assert_eq!(response, json!(21));
//! assert!(form.valid(&[]));
//! # }
//! ```

pub mod config;
pub mod debounce;
pub mod error;
pub mod observer;
pub mod session;
pub mod submit;

pub use config::{ConfigError, FormConfig};
pub use debounce::ValidationHandle;
pub use error::{FormError, SubmitError};
pub use observer::{NoopObserver, RecordingObserver, StateChange, StateObserver, WatchObserver};
pub use session::{FormSession, FormSessionBuilder, InitialData, SubmitFn};
pub use submit::{SubmitOptions, SubmitPhase};
