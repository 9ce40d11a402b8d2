//! Submit lifecycle types
//!
//! ```text
//! Idle -> Validating -> Gating -> Submitting -> Succeeding -> Idle
//!             |            |           |
//!             |            |           +-> Erroring -> Idle
//!             |            +-> (cancelled) -> Idle
//!             +-> Erroring -> Idle
//! ```

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;

use crate::error::SubmitError;

/// Where a submit currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPhase {
    #[default]
    Idle,
    /// Immediate whole-form validation
    Validating,
    /// Waiting on `on_before`
    Gating,
    /// Submit callback in flight (`processing` is true)
    Submitting,
    /// Running `on_success`
    Succeeding,
    /// Running `on_error`
    Erroring,
}

impl fmt::Display for SubmitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitPhase::Idle => write!(f, "idle"),
            SubmitPhase::Validating => write!(f, "validating"),
            SubmitPhase::Gating => write!(f, "gating"),
            SubmitPhase::Submitting => write!(f, "submitting"),
            SubmitPhase::Succeeding => write!(f, "succeeding"),
            SubmitPhase::Erroring => write!(f, "erroring"),
        }
    }
}

pub(crate) type OnBefore = Box<dyn FnOnce(Value) -> BoxFuture<'static, bool> + Send>;
pub(crate) type OnSuccess<R> = Box<dyn FnOnce(R, Value) -> BoxFuture<'static, R> + Send>;
pub(crate) type OnError = Box<dyn FnOnce(SubmitError, Value) -> BoxFuture<'static, SubmitError> + Send>;

/// Hooks for one submit call
pub struct SubmitOptions<R> {
    pub(crate) on_before: Option<OnBefore>,
    pub(crate) on_success: Option<OnSuccess<R>>,
    pub(crate) on_error: Option<OnError>,
}

impl<R> Default for SubmitOptions<R> {
    fn default() -> Self {
        Self {
            on_before: None,
            on_success: None,
            on_error: None,
        }
    }
}

impl<R: Send + 'static> SubmitOptions<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate run after validation passed; resolving to `false` cancels the submit
    pub fn on_before<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(Value) -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.on_before = Some(Box::new(move |data| Box::pin(hook(data))));
        self
    }

    /// Transform the callback response; its output is what `submit` resolves to
    pub fn on_success<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(R, Value) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        self.on_success = Some(Box::new(move |resp, data| Box::pin(hook(resp, data))));
        self
    }

    /// Recovery hook; receives the error and the current data, returns the
    /// error `submit` rejects with
    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(SubmitError, Value) -> Fut + Send + 'static,
        Fut: Future<Output = SubmitError> + Send + 'static,
    {
        self.on_error = Some(Box::new(move |err, data| Box::pin(hook(err, data))));
        self
    }
}

impl<R> fmt::Debug for SubmitOptions<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitOptions")
            .field("on_before", &self.on_before.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(SubmitPhase::default(), SubmitPhase::Idle);
        assert_eq!(SubmitPhase::Gating.to_string(), "gating");
    }

    #[test]
    fn test_options_builder() {
        let options = SubmitOptions::<u32>::new()
            .on_before(|_| async { true })
            .on_success(|resp, _| async move { resp + 1 });
        assert!(options.on_before.is_some());
        assert!(options.on_success.is_some());
        assert!(options.on_error.is_none());
    }
}
