//! Precognitive request guard
//!
//! A [`PrecognitiveHandler`] runs a route in three phases:
//!
//! 1. `on_request` hooks, in order. A [`HookError::Validation`] raised here
//!    is intercepted and handed to [`handle_validation_failure`].
//! 2. The handler. Precognitive probes that got this far short-circuit with
//!    `204 No Content` and the real handler never runs.
//! 3. `on_before_response`, a pass-through over the handler's response.
//!
//! ## Failure branching
//!
//! | Request                              | Outcome                                        |
//! |--------------------------------------|------------------------------------------------|
//! | not precognitive                     | 422 with every error                           |
//! | precognitive, no `Precognitive-Keys` | 422 with every error, `Precognitive-success: false` |
//! | precognitive, keys cover a failure   | 422 with covered errors only, keys echoed      |
//! | precognitive, keys cover nothing     | failure suppressed, request proceeds           |

use async_trait::async_trait;
use axum::body::{self, Bytes};
use axum::extract::Request;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use precog_core::{path, Issue, SchemaError, ValidationOutcome, ValidatorAdapter};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{PrecognitiveError, ServerError};
use crate::headers::{
    is_precognitive, precognitive_keys, precognitive_keys_header, APPLICATION_JSON, FALSE,
    PRECOGNITIVE, PRECOGNITIVE_KEYS, PRECOGNITIVE_SUCCESS, TRUE,
};

/// Default cap on buffered request bodies
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Errors raised by `on_request` hooks
#[derive(Error, Debug)]
pub enum HookError {
    /// Schema validation failed; intercepted by the guard
    #[error("Validation failed with {} issue(s)", .0.len())]
    Validation(Vec<Issue>),

    /// Any other failure, returned to the client as-is
    #[error("Request rejected with status {}", .0.status())]
    Rejected(Response),
}

impl HookError {
    pub fn reject(response: impl IntoResponse) -> Self {
        HookError::Rejected(response.into_response())
    }
}

impl From<ServerError> for HookError {
    fn from(err: ServerError) -> Self {
        HookError::reject(err)
    }
}

/// Branch on a validation failure raised during `on_request`.
///
/// Writes the precognitive response headers into `response_headers`.
/// Returns `Ok(())` when the failure is suppressed because none of the
/// requested keys covers a failing path.
pub fn handle_validation_failure(
    issues: &[Issue],
    request_headers: &HeaderMap,
    response_headers: &mut HeaderMap,
) -> Result<(), PrecognitiveError> {
    if !is_precognitive(request_headers) {
        response_headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
        debug!(issues = issues.len(), "Validation failed");
        return Err(PrecognitiveError::from_issues(issues).with_headers(response_headers.clone()));
    }

    response_headers.insert(PRECOGNITIVE, TRUE);

    // A header with no usable keys (blank or only commas) scopes nothing
    let Some(keys) = precognitive_keys(request_headers) else {
        response_headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
        response_headers.insert(PRECOGNITIVE_SUCCESS, FALSE);
        debug!(issues = issues.len(), "Precognitive validation failed");
        return Err(PrecognitiveError::from_issues(issues).with_headers(response_headers.clone()));
    };

    if let Some(raw_keys) = precognitive_keys_header(request_headers) {
        response_headers.insert(PRECOGNITIVE_KEYS, raw_keys.clone());
    }

    let covered: Vec<Issue> = issues
        .iter()
        .filter(|issue| {
            let issue_path = issue.dot_path();
            keys.iter().any(|key| path::covers(key, &issue_path))
        })
        .cloned()
        .collect();

    if covered.is_empty() {
        debug!(keys = ?keys, "Precognitive keys passed");
        return Ok(());
    }

    response_headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
    response_headers.insert(PRECOGNITIVE_SUCCESS, FALSE);
    debug!(keys = ?keys, issues = covered.len(), "Precognitive validation failed");
    Err(PrecognitiveError::from_issues(&covered).with_headers(response_headers.clone()))
}

/// A buffered request moving through the guard
#[derive(Debug)]
pub struct RequestEvent {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    response_headers: HeaderMap,
}

impl RequestEvent {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            response_headers: HeaderMap::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_precognitive(&self) -> bool {
        is_precognitive(&self.headers)
    }

    /// Headers merged into whatever response this request ends with
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ServerError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ServerError::BadRequest(format!("Invalid JSON: {}", e)))
    }

    /// Decode the body as a JSON object, the shape form data always has
    pub fn json_object(&self) -> Result<Value, ServerError> {
        let value: Value = if self.body.is_empty() {
            Value::Object(Default::default())
        } else {
            self.json()?
        };

        if value.is_object() {
            Ok(value)
        } else {
            Err(ServerError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ))
        }
    }
}

/// One `on_request` phase step
#[async_trait]
pub trait RequestHook: Send + Sync {
    async fn on_request(&self, event: &mut RequestEvent) -> Result<(), HookError>;
}

#[async_trait]
impl<F> RequestHook for F
where
    F: Fn(&mut RequestEvent) -> Result<(), HookError> + Send + Sync,
{
    async fn on_request(&self, event: &mut RequestEvent) -> Result<(), HookError> {
        self(event)
    }
}

/// Validates the JSON body through a [`ValidatorAdapter`], so the server
/// checks a request with the same schema the client form uses
#[derive(Debug, Clone)]
pub struct ValidateJson {
    validator: ValidatorAdapter,
}

impl ValidateJson {
    pub fn new(validator: ValidatorAdapter) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl RequestHook for ValidateJson {
    async fn on_request(&self, event: &mut RequestEvent) -> Result<(), HookError> {
        let data = event.json_object()?;

        match self.validator.validate(&data, None).await {
            Ok(ValidationOutcome::Success { .. }) => Ok(()),
            Ok(ValidationOutcome::Failure { errors, .. }) => {
                let issues = errors
                    .grouped()
                    .iter()
                    .flat_map(|(path, messages)| messages.iter().map(move |m| Issue::at(path, m.as_str())))
                    .collect();
                Err(HookError::Validation(issues))
            }
            Err(err) => Err(schema_failure(err)),
        }
    }
}

fn schema_failure(err: SchemaError) -> HookError {
    ServerError::Internal(err.to_string()).into()
}

type HandlerFn = Arc<dyn Fn(RequestEvent) -> BoxFuture<'static, Response> + Send + Sync>;
type ResponseFn = Arc<dyn Fn(&mut Response) + Send + Sync>;

/// Route handler wrapped in the precognitive guard
#[derive(Clone)]
pub struct PrecognitiveHandler {
    on_request: Vec<Arc<dyn RequestHook>>,
    handler: HandlerFn,
    on_before_response: Option<ResponseFn>,
    body_limit: usize,
}

impl PrecognitiveHandler {
    /// Wrap the real handler. It receives the buffered request and never
    /// runs for precognitive probes.
    pub fn new<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(RequestEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            on_request: Vec::new(),
            handler: Arc::new(move |event| {
                let handler = Arc::clone(&handler);
                Box::pin(async move { handler(event).await.into_response() })
            }),
            on_before_response: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Append an `on_request` hook; hooks run in the order added
    pub fn on_request(mut self, hook: impl RequestHook + 'static) -> Self {
        self.on_request.push(Arc::new(hook));
        self
    }

    /// Append a hook validating the JSON body
    pub fn validate_json(self, validator: ValidatorAdapter) -> Self {
        self.on_request(ValidateJson::new(validator))
    }

    /// Inspect or adjust the handler's response before it is sent
    pub fn on_before_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Response) + Send + Sync + 'static,
    {
        self.on_before_response = Some(Arc::new(hook));
        self
    }

    /// Largest request body that will be buffered
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Axum handler closure, usable with `axum::routing::post` and friends
    pub fn into_handler(
        self,
    ) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
        let guard = Arc::new(self);
        move |request| {
            let guard = Arc::clone(&guard);
            Box::pin(async move { guard.call(request).await })
        }
    }

    /// Run one request through the three phases
    pub async fn call(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let body = match body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, limit = self.body_limit, "Failed to buffer request body");
                return ServerError::BodyTooLarge(err.to_string()).into_response();
            }
        };
        let mut event = RequestEvent::new(parts.method, parts.uri, parts.headers, body);

        for hook in &self.on_request {
            match hook.on_request(&mut event).await {
                Ok(()) => {}
                Err(HookError::Validation(issues)) => {
                    if let Err(err) =
                        handle_validation_failure(&issues, &event.headers, &mut event.response_headers)
                    {
                        return err.into_response();
                    }
                }
                Err(HookError::Rejected(response)) => return response,
            }
        }

        let mut response = if event.is_precognitive() {
            info!(uri = %event.uri, "Precognitive request passed, skipping handler");
            let mut response = StatusCode::NO_CONTENT.into_response();
            let headers = response.headers_mut();
            headers.extend(std::mem::take(&mut event.response_headers));
            headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
            headers.insert(PRECOGNITIVE, TRUE);
            headers.insert(PRECOGNITIVE_SUCCESS, TRUE);
            response
        } else {
            let extra = std::mem::take(&mut event.response_headers);
            let mut response = (self.handler)(event).await;
            response.headers_mut().extend(extra);
            response
        };

        if let Some(hook) = &self.on_before_response {
            hook(&mut response);
        }
        response
    }
}

impl fmt::Debug for PrecognitiveHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrecognitiveHandler")
            .field("on_request", &self.on_request.len())
            .field("on_before_response", &self.on_before_response.is_some())
            .field("body_limit", &self.body_limit)
            .finish()
    }
}
