//! TOML-based engine configuration.
//!
//! Stores:
//! - The waking-day window and the sleep window
//! - Anchoring defaults (minimum gap, default mode)
//! - Model endpoint settings (URL, model, timeout, fan-out)
//!
//! Configuration is stored at `~/.config/tidewell/config.toml`.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::coordinator::AnchoringMode;
use crate::error::ConfigError;
use crate::timeline::SleepWindow;

/// Day boundaries in local `HH:MM` time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayConfig {
    #[serde(default = "default_day_start")]
    pub day_start: String,
    #[serde(default = "default_day_end")]
    pub day_end: String,
    #[serde(default = "default_sleep_start")]
    pub sleep_start: String,
    #[serde(default = "default_sleep_end")]
    pub sleep_end: String,
}

/// Anchoring defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchoringSettings {
    #[serde(default = "default_min_gap_minutes")]
    pub min_gap_minutes: i64,
    #[serde(default)]
    pub default_mode: AnchoringMode,
}

/// Language-model endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum scoring batches in flight
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Pairs per scoring request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/tidewell/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub day: DayConfig,
    #[serde(default)]
    pub anchoring: AnchoringSettings,
    #[serde(default)]
    pub ai: AiConfig,
}

// Default functions
fn default_day_start() -> String {
    "06:00".into()
}
fn default_day_end() -> String {
    "22:00".into()
}
fn default_sleep_start() -> String {
    "22:00".into()
}
fn default_sleep_end() -> String {
    "06:00".into()
}
fn default_min_gap_minutes() -> i64 {
    15
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "TIDEWELL_AI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    4
}
fn default_batch_size() -> usize {
    8
}

impl Default for DayConfig {
    fn default() -> Self {
        Self {
            day_start: default_day_start(),
            day_end: default_day_end(),
            sleep_start: default_sleep_start(),
            sleep_end: default_sleep_end(),
        }
    }
}

impl Default for AnchoringSettings {
    fn default() -> Self {
        Self {
            min_gap_minutes: default_min_gap_minutes(),
            default_mode: AnchoringMode::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
        }
    }
}

fn parse_clock(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected HH:MM, got '{value}' ({e})"),
    })
}

impl DayConfig {
    /// Concrete day window for `date`. An end at or before the start
    /// (e.g. "01:00") is taken to be after midnight.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unparseable times.
    pub fn window_for(&self, date: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime), ConfigError> {
        let start = parse_clock("day.day_start", &self.day_start)?;
        let end = parse_clock("day.day_end", &self.day_end)?;
        let day_start = date.and_time(start);
        let mut day_end = date.and_time(end);
        if end <= start {
            day_end += Duration::days(1);
        }
        Ok((day_start, day_end))
    }

    /// The configured sleep window.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unparseable times.
    pub fn sleep_window(&self) -> Result<SleepWindow, ConfigError> {
        Ok(SleepWindow::new(
            parse_clock("day.sleep_start", &self.sleep_start)?,
            parse_clock("day.sleep_end", &self.sleep_end)?,
        ))
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/tidewell"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LoadFailed`] if the file cannot be read,
    /// [`ConfigError::ParseFailed`] for invalid TOML, or a validation error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SaveFailed`] on serialization or IO failure.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Check every value that has a constrained format or range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.day.window_for(NaiveDate::MIN)?;
        self.day.sleep_window()?;

        let positive = [
            ("anchoring.min_gap_minutes", self.anchoring.min_gap_minutes > 0),
            ("ai.timeout_secs", self.ai.timeout_secs > 0),
            ("ai.max_concurrency", self.ai.max_concurrency > 0),
            ("ai.batch_size", self.ai.batch_size > 0),
        ];
        for (key, ok) in positive {
            if !ok {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be positive".to_string(),
                });
            }
        }

        url::Url::parse(&self.ai.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "ai.base_url".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory, validating the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid; the
    /// config is left unchanged in that case.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
