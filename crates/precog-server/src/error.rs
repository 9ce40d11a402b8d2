//! Error responses
//!
//! - [`PrecognitiveError`]: the 422 validation failure, `{ error, errors }`
//! - [`ServerError`]: everything else the guard or the playground can fail with

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use precog_core::{ErrorBag, Issue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::headers::APPLICATION_JSON;

/// Message used when a failure carries no issues
pub const FALLBACK_MESSAGE: &str = "Validation error";

/// JSON body of a 422 response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBody {
    /// First message
    pub error: String,
    /// Every message, grouped by dotted path
    pub errors: IndexMap<String, Vec<String>>,
}

/// Validation failure rendered as a 422 response
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct PrecognitiveError {
    message: String,
    errors: ErrorBag,
    headers: HeaderMap,
}

impl PrecognitiveError {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let errors = ErrorBag::from_issues(issues);
        let message = errors.first_message().unwrap_or(FALLBACK_MESSAGE).to_string();
        Self {
            message,
            errors,
            headers: HeaderMap::new(),
        }
    }

    /// Attach response headers accumulated before the failure
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> &ErrorBag {
        &self.errors
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }

    pub fn body(&self) -> FailureBody {
        FailureBody {
            error: self.message.clone(),
            errors: self.errors.grouped().clone(),
        }
    }
}

impl IntoResponse for PrecognitiveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.body();
        let mut headers = self.headers;
        headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);

        (status, headers, Json(body)).into_response()
    }
}

/// Error body for non-validation failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::BodyTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::Io(_) => "IO_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Config(_) | ServerError::Io(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Internal server error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorInfo {
            code: self.error_code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
