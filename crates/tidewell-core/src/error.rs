//! Core error types for tidewell-core.
//!
//! Input errors are returned to the caller. Capability errors are produced by
//! the model and calendar adapters and are normally recovered inside the
//! engine (neutral scores, greedy fallback) rather than surfaced.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tidewell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed caller input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Calendar provider errors
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Model capability errors that could not be recovered
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Validation errors raised at the engine boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range for '{subject}': end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        subject: String,
        start: chrono::NaiveDateTime,
        end: chrono::NaiveDateTime,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The same id appears twice in one input list
    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: String, id: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Calendar provider errors.
#[derive(Error, Debug)]
pub enum CalendarError {
    /// Provider could not be reached or refused the request
    #[error("Calendar provider '{provider}' unavailable: {message}")]
    Unavailable { provider: String, message: String },

    /// Provider returned data that is not a valid event list
    #[error("Malformed calendar data: {0}")]
    Malformed(String),
}

/// Failures of the external language-model capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// No model configured, or the credentials are missing
    #[error("Model capability unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within the configured timeout
    #[error("Model call timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Network/transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Model endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response did not match the expected schema
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Response parsed but a value is outside its documented bounds
    #[error("Model value '{field}' out of range: {value}")]
    OutOfRange { field: String, value: f64 },
}

impl CapabilityError {
    /// Classify an HTTP client error; timeouts report the client's configured limit.
    pub fn from_http(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            CapabilityError::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else {
            CapabilityError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(err: serde_json::Error) -> Self {
        CapabilityError::MalformedResponse(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn invalid_time_range_names_the_subject() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let err = ValidationError::InvalidTimeRange {
            subject: "event standup".to_string(),
            start: day.and_hms_opt(10, 0, 0).unwrap(),
            end: day.and_hms_opt(9, 0, 0).unwrap(),
        };
        let message = err.to_string();
        assert!(message.contains("event standup"));
        assert!(message.contains("must be after start"));
    }

    #[test]
    fn validation_error_converts_into_core_error() {
        let err: CoreError = ValidationError::DuplicateId {
            kind: "task".to_string(),
            id: "walk".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(err.to_string(), "Validation error: Duplicate task id: walk");
    }

    #[test]
    fn json_error_maps_to_malformed_response() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let cap: CapabilityError = err.into();
        assert!(matches!(cap, CapabilityError::MalformedResponse(_)));
    }
}
