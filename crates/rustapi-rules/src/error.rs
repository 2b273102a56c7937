//! Failure records and error types for rule execution.
//!
//! A [`ValidationFailure`] is an ordinary output of a rule and is always
//! returned by value. A [`RuleError`] is reserved for outcomes that abort an
//! evaluation: cancellation, invalid usage, or a fault raised by a validator.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error type used for validator faults.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a rule evaluation.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Validation was cancelled")]
    Cancelled,

    #[error("Asynchronous {kind} on '{property}' cannot run in a synchronous validation")]
    AsyncInSyncPath {
        property: String,
        kind: &'static str,
    },

    #[error("Validator '{0}' does not support synchronous validation")]
    SyncUnsupported(String),

    #[error("Validator '{validator}' failed: {source}")]
    Validator {
        validator: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

impl RuleError {
    /// Wrap a fault raised by a validator implementation.
    pub fn validator(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Validator {
            validator: name.into(),
            source: source.into(),
        }
    }

    /// Whether this error signals cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// How serious a failure is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

/// A single rule violation.
///
/// Failures are immutable once built; the `with_*` methods consume the value
/// and return a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    property_path: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attempted_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(default)]
    severity: Severity,
}

impl ValidationFailure {
    /// Create a failure for a property path.
    pub fn new(property_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            message: message.into(),
            attempted_value: None,
            error_code: None,
            severity: Severity::Error,
        }
    }

    pub fn with_attempted_value(mut self, value: serde_json::Value) -> Self {
        self.attempted_value = Some(value);
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Full property path, including the chain prefix.
    pub fn property_path(&self) -> &str {
        &self.property_path
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn attempted_value(&self) -> Option<&serde_json::Value> {
        self.attempted_value.as_ref()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{}: [{}] {}", self.property_path, code, self.message),
            None => write!(f, "{}: {}", self.property_path, self.message),
        }
    }
}
