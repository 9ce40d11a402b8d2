//! Precog Server
//!
//! Server half of precognitive validation for axum. A route wrapped in a
//! [`PrecognitiveHandler`] validates the request body with the same schema
//! the client form uses. Speculative requests (`Precognitive: true`) get
//! field-scoped feedback without the real handler ever running.
//!
//! ## Modules
//!
//! - `headers`: wire header names and parsing helpers
//! - `guard`: the handler wrapper and [`handle_validation_failure`]
//! - `error`: [`PrecognitiveError`] (422) and [`ServerError`]
//! - `config`: [`ServerConfig`]
//! - `playground`: a registration endpoint showing the guard end to end

pub mod config;
pub mod error;
pub mod guard;
pub mod headers;
pub mod playground;

pub use config::ServerConfig;
pub use error::{FailureBody, PrecognitiveError, ServerError};
pub use guard::{
    handle_validation_failure, HookError, PrecognitiveHandler, RequestEvent, RequestHook,
    ValidateJson, DEFAULT_BODY_LIMIT,
};
pub use headers::{is_precognitive, precognitive_keys, PRECOGNITIVE, PRECOGNITIVE_KEYS, PRECOGNITIVE_SUCCESS};
