//! TOML-based application configuration.
//!
//! Stores bot settings including:
//! - The selectable subject catalogue
//! - Reminder offsets for tests and deadlines
//! - Pomodoro argument limits
//! - Text-generation endpoint and model
//! - Chat message size limits
//!
//! Configuration is stored at `~/.config/studyroom/config.toml`.
//! Credentials are never written here; see [`crate::integrations::keyring_store`].

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Bot identity and catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_subjects")]
    pub subjects: Vec<String>,
    /// Acting user for the console host.
    #[serde(default = "default_console_user")]
    pub console_user: String,
    #[serde(default = "default_console_username")]
    pub console_username: String,
    #[serde(default = "default_console_channel")]
    pub console_channel: String,
}

/// Reminder offsets, in days relative to the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_test_offsets")]
    pub test_offsets_days: Vec<i64>,
    #[serde(default = "default_deadline_offsets")]
    pub deadline_offsets_days: Vec<i64>,
    /// Local hour of day at which a test or deadline is considered to happen.
    #[serde(default)]
    pub event_hour: u32,
}

/// Limits for `pomdorro` arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default = "default_max_study")]
    pub max_study_minutes: u32,
    #[serde(default = "default_max_break")]
    pub max_break_minutes: u32,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,
}

/// Text-generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    /// Extracted PDF text is cut to this many characters before prompting.
    #[serde(default = "default_max_pdf_chars")]
    pub max_pdf_chars: usize,
}

/// Chat message size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    /// Replies longer than this are split.
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    #[serde(default = "default_chunk_len")]
    pub chunk_len: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyroom/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub pomodoro: PomodoroConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    /// Overrides `<data dir>/studyroom.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

// Default functions
fn default_subjects() -> Vec<String> {
    [
        "IB Math AA",
        "IB Math AI",
        "IB Spanish AB",
        "IB English LAL",
        "IB Economics",
        "IB Business Management",
        "IB Hindi B",
        "IB Physics",
        "IB Chemistry",
        "IB ESS",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_console_user() -> String {
    "console".into()
}
fn default_console_username() -> String {
    "student".into()
}
fn default_console_channel() -> String {
    "study-hall".into()
}
fn default_test_offsets() -> Vec<i64> {
    vec![-7, -3, -2, -1, 0]
}
fn default_deadline_offsets() -> Vec<i64> {
    vec![-7, -2, -1]
}
fn default_max_study() -> u32 {
    180
}
fn default_max_break() -> u32 {
    60
}
fn default_max_sessions() -> u32 {
    12
}
fn default_ai_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_ai_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_ai_timeout() -> u64 {
    60
}
fn default_max_pdf_chars() -> usize {
    15_000
}
fn default_max_len() -> usize {
    2000
}
fn default_chunk_len() -> usize {
    1900
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            subjects: default_subjects(),
            console_user: default_console_user(),
            console_username: default_console_username(),
            console_channel: default_console_channel(),
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            test_offsets_days: default_test_offsets(),
            deadline_offsets_days: default_deadline_offsets(),
            event_hour: 0,
        }
    }
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            max_study_minutes: default_max_study(),
            max_break_minutes: default_max_break(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            timeout_secs: default_ai_timeout(),
            max_pdf_chars: default_max_pdf_chars(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            max_len: default_max_len(),
            chunk_len: default_chunk_len(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            reminders: RemindersConfig::default(),
            pomodoro: PomodoroConfig::default(),
            ai: AiConfig::default(),
            messages: MessagesConfig::default(),
            database_path: None,
        }
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
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
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

    /// Location of `config.toml` in the data directory.
    pub fn file_path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return (and write) the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, if it
    /// holds values the bot cannot work with, or if the default config
    /// cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path()?)
    }

    /// [`Config::load`] against an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                return Ok(cfg);
            }
            Err(e) => return Err(load_failed(e.to_string())),
        };
        let cfg: Self = toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::file_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
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

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Reject values the bot cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.reminders.event_hour > 23 {
            return Err(invalid("reminders.event_hour", "must be between 0 and 23"));
        }
        if self.messages.chunk_len == 0 || self.messages.chunk_len > self.messages.max_len {
            return Err(invalid(
                "messages.chunk_len",
                "must be positive and not exceed messages.max_len",
            ));
        }
        if self.bot.subjects.is_empty() {
            return Err(invalid("bot.subjects", "at least one subject is required"));
        }
        Ok(())
    }

    /// Database file location.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("studyroom.db")),
        }
    }
}
