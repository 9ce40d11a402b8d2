//! Form session configuration
//!
//! Passed explicitly to every session; there is no process-wide default.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the debounce window
pub const ENV_VALIDATION_TIMEOUT_MS: &str = "PRECOG_VALIDATION_TIMEOUT_MS";

/// Environment variable overriding the form-level failure message
pub const ENV_FORM_ERROR_MESSAGE: &str = "PRECOG_FORM_ERROR_MESSAGE";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

/// Per-session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Quiet period before a debounced validation runs, in milliseconds
    #[serde(default = "default_validation_timeout_ms")]
    pub validation_timeout_ms: u64,
    /// Form-level failure message; the validator's own message when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_error_message: Option<String>,
}

fn default_validation_timeout_ms() -> u64 {
    1500
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            validation_timeout_ms: default_validation_timeout_ms(),
            form_error_message: None,
        }
    }
}

impl FormConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window
    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the form-level failure message
    pub fn with_form_error_message(mut self, message: impl Into<String>) -> Self {
        self.form_error_message = Some(message.into());
        self
    }

    /// Debounce window as a duration
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    /// Defaults overridden by `PRECOG_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_VALIDATION_TIMEOUT_MS) {
            config.validation_timeout_ms =
                raw.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                    var: ENV_VALIDATION_TIMEOUT_MS.to_string(),
                    reason: format!("{}", e),
                })?;
        }

        if let Some(message) = lookup(ENV_FORM_ERROR_MESSAGE) {
            config.form_error_message = Some(message);
        }

        Ok(config)
    }
}
