//! Form session engine
//!
//! A [`FormSession`] owns the data of one logical form together with the
//! touched set, the error map and the in-flight flags. It delegates
//! validation to a [`ValidatorAdapter`] and reports every mutation to an
//! injected [`StateObserver`].
//!
//! ## Validation
//!
//! - [`FormSession::validate`] is debounced on the trailing edge. A run that
//!   fires while another pass is in flight is dropped with
//!   [`FormError::ValidationInFlight`].
//! - [`FormSession::submit`] validates immediately and cancels any pending
//!   debounced run first.
//!
//! Cloning a session is cheap and yields another handle to the same state.

use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use precog_core::{path, ValidationOutcome, ValidatorAdapter};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::FormConfig;
use crate::debounce::{Debouncer, ValidationHandle};
use crate::error::{FormError, SubmitError};
use crate::observer::{NoopObserver, StateChange, StateObserver};
use crate::submit::{OnError, SubmitOptions, SubmitPhase};

/// The action a successful submit performs with the validated data
pub type SubmitFn<R> = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<R>> + Send + Sync>;

/// Initial form data, either fixed or produced on demand
#[derive(Clone)]
pub enum InitialData {
    /// Deep-copied on every reset
    Value(Value),
    /// Re-invoked on every reset, so defaults can be dynamic
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl InitialData {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        InitialData::Factory(Arc::new(factory))
    }

    /// A fresh object to start from
    fn fresh(&self) -> Result<Value, FormError> {
        let value = match self {
            InitialData::Value(value) => value.clone(),
            InitialData::Factory(factory) => factory(),
        };
        if value.is_object() {
            Ok(value)
        } else {
            Err(FormError::NotAnObject(kind_name(&value).to_string()))
        }
    }
}

impl From<Value> for InitialData {
    fn from(value: Value) -> Self {
        InitialData::Value(value)
    }
}

impl fmt::Debug for InitialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialData::Value(value) => f.debug_tuple("Value").field(value).finish(),
            InitialData::Factory(_) => f.write_str("Factory(..)"),
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

#[derive(Debug)]
struct FormState {
    data: Value,
    touched: IndexSet<String>,
    errors: IndexMap<String, String>,
    processing: bool,
    validating: bool,
    phase: SubmitPhase,
    validation_timeout: Duration,
}

impl FormState {
    fn disabled(&self) -> bool {
        self.processing || self.validating
    }
}

struct Inner<R> {
    validator: ValidatorAdapter,
    initial: InitialData,
    submit_fn: SubmitFn<R>,
    form_error_message: Option<String>,
    observer: Arc<dyn StateObserver>,
    debouncer: Debouncer<Vec<String>>,
    state: Mutex<FormState>,
}

/// Builder for [`FormSession`]
pub struct FormSessionBuilder<R> {
    validator: ValidatorAdapter,
    initial: InitialData,
    submit_fn: SubmitFn<R>,
    config: FormConfig,
    observer: Arc<dyn StateObserver>,
}

impl<R: Send + 'static> FormSessionBuilder<R> {
    pub fn config(mut self, config: FormConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: impl StateObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Build the session. Fails when the initial data is not an object.
    pub fn build(self) -> Result<FormSession<R>, FormError> {
        let data = self.initial.fresh()?;

        debug!(
            validation_timeout_ms = self.config.validation_timeout_ms,
            "Form session created"
        );

        Ok(FormSession {
            inner: Arc::new(Inner {
                validator: self.validator,
                initial: self.initial,
                submit_fn: self.submit_fn,
                form_error_message: self.config.form_error_message.clone(),
                observer: self.observer,
                debouncer: Debouncer::new(),
                state: Mutex::new(FormState {
                    data,
                    touched: IndexSet::new(),
                    errors: IndexMap::new(),
                    processing: false,
                    validating: false,
                    phase: SubmitPhase::Idle,
                    validation_timeout: self.config.validation_timeout(),
                }),
            }),
        })
    }
}

/// Stateful controller for one form instance
pub struct FormSession<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for FormSession<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for FormSession<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("FormSession")
            .field("validator", &self.inner.validator)
            .field("state", &*state)
            .finish()
    }
}

/// Resets `validating` when a pass ends, however it ends
struct ValidatingGuard<'a, R> {
    inner: &'a Inner<R>,
}

impl<R> Drop for ValidatingGuard<'_, R> {
    fn drop(&mut self) {
        self.inner.lock().validating = false;
        self.inner.notify(StateChange::Validating(false));
    }
}

/// Returns the session to `Idle` (and `processing` to false) when a submit ends
struct SubmitGuard<'a, R> {
    inner: &'a Inner<R>,
}

impl<R> Drop for SubmitGuard<'_, R> {
    fn drop(&mut self) {
        let was_processing = {
            let mut state = self.inner.lock();
            state.phase = SubmitPhase::Idle;
            std::mem::replace(&mut state.processing, false)
        };
        if was_processing {
            self.inner.notify(StateChange::Processing(false));
        }
    }
}

impl<R> Inner<R> {
    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: StateChange) {
        self.observer.on_change(&change);
    }

    fn set_phase(&self, phase: SubmitPhase) {
        self.lock().phase = phase;
        debug!(%phase, "Submit phase changed");
    }

    /// Claim the single validation slot for a debounced run
    fn begin_validating(&self) -> Result<ValidatingGuard<'_, R>, FormError> {
        {
            let mut state = self.lock();
            if state.validating {
                return Err(FormError::ValidationInFlight);
            }
            state.validating = true;
        }
        self.notify(StateChange::Validating(true));
        Ok(ValidatingGuard { inner: self })
    }

    /// Claim both the submit slot and the validation slot in one step
    fn begin_submit(&self) -> Result<(SubmitGuard<'_, R>, ValidatingGuard<'_, R>), FormError> {
        {
            let mut state = self.lock();
            if state.disabled() || state.phase != SubmitPhase::Idle {
                return Err(FormError::Disabled);
            }
            state.phase = SubmitPhase::Validating;
            state.validating = true;
        }
        self.notify(StateChange::Validating(true));
        Ok((SubmitGuard { inner: self }, ValidatingGuard { inner: self }))
    }

    fn invalid(&self, message: String, errors: precog_core::ErrorBag) -> FormError {
        FormError::Invalid {
            message: self.form_error_message.clone().unwrap_or(message),
            errors,
        }
    }

    /// Whole-form pass. The caller holds the validation slot.
    async fn validate_form(&self) -> Result<Value, FormError> {
        let data = {
            let mut state = self.lock();
            state.errors.clear();
            state.touched = path::leaf_paths(&state.data).into_iter().collect();
            state.data.clone()
        };
        self.notify(StateChange::Errors);
        self.notify(StateChange::Touched);

        match self.validator.validate(&data, None).await? {
            ValidationOutcome::Success { data } => Ok(data),
            ValidationOutcome::Failure { errors, message, .. } => {
                {
                    let mut state = self.lock();
                    for (path, message) in errors.iter() {
                        state.errors.insert(path.to_string(), message.to_string());
                        state.touched.insert(path.to_string());
                    }
                }
                self.notify(StateChange::Errors);
                self.notify(StateChange::Touched);
                Err(self.invalid(message, errors))
            }
        }
    }

    /// Field-scoped pass. Only `keys` are forgotten, touched and reported.
    async fn validate_keys(&self, keys: &[String]) -> Result<(), FormError> {
        let data = self.lock().data.clone();
        let outcome = self.validator.validate(&data, Some(keys)).await?;

        {
            let mut state = self.lock();
            for key in keys {
                state.errors.shift_remove(key);
                state.touched.insert(key.clone());
            }
            for (path, message) in outcome.errors().iter() {
                if keys.iter().any(|k| k == path) {
                    state.errors.insert(path.to_string(), message.to_string());
                }
            }
        }
        self.notify(StateChange::Errors);
        self.notify(StateChange::Touched);

        match outcome {
            ValidationOutcome::Failure { errors, message, .. } if !errors.is_empty() => {
                Err(self.invalid(message, errors))
            }
            _ => Ok(()),
        }
    }

    /// Body of a debounced run once its window elapsed
    async fn run_debounced(&self, keys: Vec<String>) -> Result<(), FormError> {
        let _validating = match self.begin_validating() {
            Ok(guard) => guard,
            Err(err) => {
                debug!(keys = ?keys, "Validation already in flight, dropping debounced run");
                return Err(err);
            }
        };

        debug!(keys = ?keys, "Debounced validation fired");
        let result = if keys.is_empty() {
            self.validate_form().await.map(|_| ())
        } else {
            self.validate_keys(&keys).await
        };

        if let Err(err) = &result {
            debug!(error = %err, "Debounced validation rejected");
        }
        result
    }

    async fn fail(&self, on_error: Option<OnError>, err: SubmitError) -> SubmitError {
        let recoverable = match &err {
            SubmitError::Form(form) => form.is_recoverable(),
            SubmitError::Callback(_) => true,
            SubmitError::Cancelled => false,
        };

        match on_error {
            Some(on_error) if recoverable => {
                self.set_phase(SubmitPhase::Erroring);
                let data = self.lock().data.clone();
                on_error(err, data).await
            }
            _ => err,
        }
    }
}

impl<R: Send + 'static> FormSession<R> {
    /// Start building a session around a validator, initial data and a
    /// submit action
    pub fn builder<F, Fut>(
        validator: ValidatorAdapter,
        initial: impl Into<InitialData>,
        submit: F,
    ) -> FormSessionBuilder<R>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        FormSessionBuilder {
            validator,
            initial: initial.into(),
            submit_fn: Arc::new(move |data| Box::pin(submit(data))),
            config: FormConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Create a session with explicit configuration and no observer
    pub fn new<F, Fut>(
        validator: ValidatorAdapter,
        initial: impl Into<InitialData>,
        submit: F,
        config: FormConfig,
    ) -> Result<Self, FormError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        Self::builder(validator, initial, submit).config(config).build()
    }

    // Data

    /// Deep copy of the current values
    pub fn data(&self) -> Value {
        self.inner.lock().data.clone()
    }

    /// Current values decoded into `T`
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        serde_json::from_value(self.data()).map_err(|e| FormError::Decode(e.to_string()))
    }

    /// Shallow merge: each top-level key of `patch` overwrites the live value
    pub fn set_data(&self, patch: Value) -> Result<(), FormError> {
        let Value::Object(patch) = patch else {
            return Err(FormError::NotAnObject(kind_name(&patch).to_string()));
        };

        {
            let mut state = self.inner.lock();
            if let Value::Object(data) = &mut state.data {
                data.extend(patch);
            }
        }
        self.inner.notify(StateChange::Data);
        Ok(())
    }

    /// Value at a dotted path
    pub fn field(&self, path: &str) -> Option<Value> {
        path::get(&self.inner.lock().data, path).cloned()
    }

    /// Write a value at a dotted path, creating intermediate containers
    pub fn set_field(&self, path: &str, value: Value) -> Result<(), FormError> {
        path::set(&mut self.inner.lock().data, path, value)?;
        self.inner.notify(StateChange::Data);
        Ok(())
    }

    // Errors

    /// Error message for a path
    pub fn error(&self, path: &str) -> Option<String> {
        self.inner.lock().errors.get(path).cloned()
    }

    /// First error in insertion order
    pub fn first_error(&self) -> Option<String> {
        self.inner.lock().errors.values().next().cloned()
    }

    /// Every error, in insertion order
    pub fn errors(&self) -> IndexMap<String, String> {
        self.inner.lock().errors.clone()
    }

    /// With no paths: touched at least once and error-free. With paths: all
    /// touched and none carries an error.
    pub fn valid(&self, paths: &[&str]) -> bool {
        let state = self.inner.lock();
        if paths.is_empty() {
            return !state.touched.is_empty() && state.errors.is_empty();
        }
        paths
            .iter()
            .all(|p| state.touched.contains(*p) && !state.errors.contains_key(*p))
    }

    /// With no paths: touched at least once and carrying errors. With paths:
    /// all touched and any carries an error.
    pub fn invalid(&self, paths: &[&str]) -> bool {
        let state = self.inner.lock();
        if paths.is_empty() {
            return !state.touched.is_empty() && !state.errors.is_empty();
        }
        paths.iter().all(|p| state.touched.contains(*p))
            && paths.iter().any(|p| state.errors.contains_key(*p))
    }

    /// Clear errors and touched status, for every path when `paths` is empty
    pub fn forget_errors(&self, paths: &[&str]) {
        {
            let mut state = self.inner.lock();
            if paths.is_empty() {
                state.errors.clear();
                state.touched.clear();
            } else {
                for path in paths {
                    state.errors.shift_remove(*path);
                    state.touched.shift_remove(*path);
                }
            }
        }
        self.inner.notify(StateChange::Errors);
        self.inner.notify(StateChange::Touched);
    }

    // Touched

    /// With no paths: whether anything is touched. With paths: whether all are.
    pub fn touched(&self, paths: &[&str]) -> bool {
        let state = self.inner.lock();
        if paths.is_empty() {
            return !state.touched.is_empty();
        }
        paths.iter().all(|p| state.touched.contains(*p))
    }

    /// Touched paths in the order they were first touched
    pub fn touched_paths(&self) -> Vec<String> {
        self.inner.lock().touched.iter().cloned().collect()
    }

    /// Mark paths touched without validating; every leaf when `paths` is empty
    pub fn touch(&self, paths: &[&str]) {
        {
            let mut state = self.inner.lock();
            if paths.is_empty() {
                let leaves = path::leaf_paths(&state.data);
                state.touched.extend(leaves);
            } else {
                state.touched.extend(paths.iter().map(|p| p.to_string()));
            }
        }
        self.inner.notify(StateChange::Touched);
    }

    // Validation

    /// Schedule a debounced validation of the whole form, or of `paths`.
    ///
    /// Calls inside the quiet window collapse into one run with the latest
    /// arguments. Must be called from within a Tokio runtime.
    pub fn validate(&self, paths: &[&str]) -> ValidationHandle {
        let keys: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        let delay = self.inner.lock().validation_timeout;
        debug!(keys = ?keys, delay_ms = delay.as_millis() as u64, "Validation scheduled");

        let session = self.clone();
        self.inner.debouncer.schedule(keys, delay, move |keys| async move {
            session.inner.run_debounced(keys).await
        })
    }

    /// Change the debounce window for subsequent `validate` calls
    pub fn set_validation_timeout(&self, timeout: Duration) {
        self.inner.lock().validation_timeout = timeout;
    }

    pub fn validation_timeout(&self) -> Duration {
        self.inner.lock().validation_timeout
    }

    // Lifecycle

    /// Restore fresh initial data and clear touched and error state.
    ///
    /// A pending debounced run is cancelled; an in-flight submit is left to
    /// finish against the data it captured.
    pub fn reset(&self) -> Result<(), FormError> {
        let data = self.inner.initial.fresh()?;
        self.inner.debouncer.cancel();

        {
            let mut state = self.inner.lock();
            state.data = data;
            state.touched.clear();
            state.errors.clear();
        }
        self.inner.notify(StateChange::Reset);
        info!("Form session reset");
        Ok(())
    }

    /// Reset whenever `trigger` changes. The task ends when its sender drops.
    pub fn reset_on<T>(&self, mut trigger: watch::Receiver<T>) -> JoinHandle<()>
    where
        T: Send + Sync + 'static,
    {
        let session = self.clone();
        tokio::spawn(async move {
            while trigger.changed().await.is_ok() {
                if let Err(err) = session.reset() {
                    warn!(error = %err, "Reset on change failed");
                }
            }
            debug!("Reset trigger closed");
        })
    }

    /// Validate immediately, gate, call the submit action and run the hooks.
    pub async fn submit(&self, options: SubmitOptions<R>) -> Result<R, SubmitError> {
        let SubmitOptions {
            on_before,
            on_success,
            on_error,
        } = options;

        let (_submit, validating) = self.inner.begin_submit().map_err(|err| {
            debug!("Submit rejected, form is busy");
            SubmitError::from(err)
        })?;

        if self.inner.debouncer.cancel() {
            debug!("Cancelled pending debounced validation for submit");
        }

        let validated = {
            let _validating = validating;
            self.inner.validate_form().await
        };
        let validated = match validated {
            Ok(data) => data,
            Err(err) => {
                info!(error = %err, "Submit failed validation");
                return Err(self.inner.fail(on_error, err.into()).await);
            }
        };

        if let Some(on_before) = on_before {
            self.inner.set_phase(SubmitPhase::Gating);
            if !on_before(validated.clone()).await {
                info!("Submit cancelled by on_before");
                return Err(SubmitError::Cancelled);
            }
        }

        {
            let mut state = self.inner.lock();
            state.phase = SubmitPhase::Submitting;
            state.processing = true;
        }
        self.inner.notify(StateChange::Processing(true));
        debug!("Submitting form");

        match (self.inner.submit_fn)(validated.clone()).await {
            Ok(response) => {
                info!("Submit succeeded");
                match on_success {
                    Some(on_success) => {
                        self.inner.set_phase(SubmitPhase::Succeeding);
                        Ok(on_success(response, validated).await)
                    }
                    None => Ok(response),
                }
            }
            Err(err) => {
                warn!(error = %err, "Submit callback failed");
                Err(self.inner.fail(on_error, SubmitError::Callback(err)).await)
            }
        }
    }

    // Flags

    /// A submit is in flight
    pub fn processing(&self) -> bool {
        self.inner.lock().processing
    }

    /// A validation pass is in flight
    pub fn validating(&self) -> bool {
        self.inner.lock().validating
    }

    pub fn disabled(&self) -> bool {
        self.inner.lock().disabled()
    }

    pub fn submit_phase(&self) -> SubmitPhase {
        self.inner.lock().phase
    }

    /// Whether a debounced validation is armed and has not fired yet
    pub fn validation_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precog_core::schema::{FieldRule, RuleSchema};
    use serde_json::json;

    fn session(initial: Value) -> FormSession<()> {
        let validator = ValidatorAdapter::from_schema(
            RuleSchema::new().field(FieldRule::new("age").number().min(18.0)),
        );
        FormSession::new(validator, initial, |_| async { Ok(()) }, FormConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_non_object_initial_data() {
        let validator = ValidatorAdapter::from_schema(RuleSchema::new());
        let err = FormSession::<()>::new(validator, json!([1, 2]), |_| async { Ok(()) }, FormConfig::default())
            .unwrap_err();
        assert_eq!(err, FormError::NotAnObject("array".to_string()));
    }

    #[test]
    fn test_fresh_session_is_neither_valid_nor_invalid() {
        let form = session(json!({"age": 10}));
        assert!(!form.touched(&[]));
        assert!(!form.valid(&[]));
        assert!(!form.invalid(&[]));
        assert!(!form.disabled());
    }

    #[test]
    fn test_data_is_a_detached_snapshot() {
        let form = session(json!({"age": 10, "tags": ["a"]}));
        let mut snapshot = form.data();
        snapshot["age"] = json!(99);
        assert_eq!(form.field("age"), Some(json!(10)));
    }

    #[test]
    fn test_set_data_is_shallow_merge() {
        let form = session(json!({"age": 10, "address": {"city": "Oslo", "zip": "0150"}}));
        form.set_data(json!({"address": {"city": "Bergen"}})).unwrap();
        assert_eq!(form.data(), json!({"age": 10, "address": {"city": "Bergen"}}));

        assert!(form.set_data(json!("nope")).is_err());
    }

    #[test]
    fn test_touch_is_idempotent() {
        let form = session(json!({"age": 10, "tags": ["a", "b"], "address": {"city": "Oslo"}}));
        form.touch(&[]);
        let once = form.touched_paths();
        form.touch(&[]);
        assert_eq!(form.touched_paths(), once);
        assert_eq!(once, vec!["age", "tags.0", "tags.1", "address.city"]);
    }

    #[test]
    fn test_forget_named_paths() {
        let form = session(json!({"age": 10, "name": "x"}));
        form.touch(&["age", "name"]);
        form.forget_errors(&["age"]);
        assert!(!form.touched(&["age"]));
        assert!(form.touched(&["name"]));
    }

    #[test]
    fn test_set_field_rejects_index_far_past_the_end() {
        let form = session(json!({"tags": []}));
        let err = form.set_field("tags.18446744073709551615", json!(1)).unwrap_err();
        assert!(matches!(
            err,
            FormError::Path(precog_core::PathError::IndexOutOfRange { .. })
        ));
        assert_eq!(form.field("tags"), Some(json!([])));
    }

    #[test]
    fn test_set_field_nested() {
        let form = session(json!({"tags": []}));
        form.set_field("tags.1", json!("b")).unwrap();
        assert_eq!(form.field("tags"), Some(json!([null, "b"])));
    }
}
