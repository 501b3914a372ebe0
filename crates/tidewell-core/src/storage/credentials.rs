//! Model API key lookup.
//!
//! The key named by `ai.api_key_env` wins; otherwise the OS keyring entry
//! written by `tidewell auth set-key` is used.

use std::fmt;

use crate::error::{CapabilityError, CoreError, ValidationError};

const KEYRING_SERVICE: &str = "tidewell";
const KEYRING_ENTRY: &str = "model_api_key";

/// Where a resolved API key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// The named environment variable
    Environment(String),
    Keyring,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Environment(var) => write!(f, "environment (${var})"),
            KeySource::Keyring => f.write_str("keyring"),
        }
    }
}

/// The model API key slot in the OS keyring.
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    service: String,
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self) -> Result<keyring::Entry, CapabilityError> {
        keyring::Entry::new(&self.service, KEYRING_ENTRY).map_err(keyring_unavailable)
    }

    /// The stored key, if any.
    ///
    /// # Errors
    /// [`CapabilityError::Unavailable`] when the keyring cannot be reached.
    pub fn load(&self) -> Result<Option<String>, CapabilityError> {
        match self.entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_unavailable(e)),
        }
    }

    /// Store `key`, trimmed.
    ///
    /// # Errors
    /// A validation error for a blank key, otherwise keyring failures.
    pub fn store(&self, key: &str) -> Result<(), CoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "apiKey".to_string(),
                message: "must not be empty".to_string(),
            }
            .into());
        }
        self.entry()?.set_password(key).map_err(keyring_unavailable)?;
        Ok(())
    }

    /// Remove the stored key. Returns whether one was present.
    ///
    /// # Errors
    /// [`CapabilityError::Unavailable`] when the keyring cannot be reached.
    pub fn clear(&self) -> Result<bool, CapabilityError> {
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(keyring_unavailable(e)),
        }
    }

    /// Find the key, checking `env_var` before the keyring.
    ///
    /// The keyring is not touched when the variable holds a key.
    ///
    /// # Errors
    /// Keyring failures, only reached when the variable is unset or blank.
    pub fn resolve(&self, env_var: &str) -> Result<Option<(String, KeySource)>, CapabilityError> {
        if let Some(key) = std::env::var(env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
        {
            return Ok(Some((key, KeySource::Environment(env_var.to_string()))));
        }
        Ok(self.load()?.map(|key| (key, KeySource::Keyring)))
    }
}

fn keyring_unavailable(err: keyring::Error) -> CapabilityError {
    CapabilityError::Unavailable(format!("OS keyring: {err}"))
}
