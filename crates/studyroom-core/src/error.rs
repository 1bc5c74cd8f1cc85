//! Core error types for studyroom-core.
//!
//! Every error is scoped to the single command invocation or session that
//! produced it. The command façade turns these into user-visible replies;
//! nothing here is fatal to the process.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or missing command input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// External text-generation or extraction failure
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Session control rejected
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sending or editing a chat message failed
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input validation errors. Reported to the invoking user; no state is mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid date '{input}': expected dd/mm/yyyy")]
    InvalidDate { input: String },

    #[error("missing required argument '{name}'")]
    MissingArgument { name: String },

    #[error("argument '{name}' must be {expected}")]
    WrongArgumentType { name: String, expected: &'static str },

    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("unknown subject '{name}'")]
    UnknownSubject { name: String },

    #[error("unsupported attachment '{name}': only PDF files are accepted")]
    UnsupportedAttachment { name: String },

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Failures of the external text-generation service or document extraction.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("service returned no content")]
    EmptyResponse,

    #[error("{what} is not configured")]
    NotConfigured { what: String },

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("could not fetch attachment: {0}")]
    Attachment(String),
}

/// A control action attempted by someone other than the session owner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("user {actor} does not own this session (owner: {owner})")]
    NotSessionOwner { actor: String, owner: String },
}

/// Rejected pause/resume/cancel requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),

    #[error("session is already paused")]
    AlreadyPaused,

    #[error("session is not paused")]
    NotPaused,

    #[error("session has already finished")]
    Finished,
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Could not determine data directory: {0}")]
    DataDir(String),
}

/// Chat platform delivery errors.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unknown message {0}")]
    UnknownMessage(String),

    #[error("{0}")]
    Rejected(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<AuthorizationError> for CoreError {
    fn from(err: AuthorizationError) -> Self {
        CoreError::Control(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_error_nests_in_control_error() {
        let err: CoreError = AuthorizationError::NotSessionOwner {
            actor: "2".into(),
            owner: "1".into(),
        }
        .into();
        assert!(matches!(
            err,
            CoreError::Control(ControlError::Unauthorized(_))
        ));
    }

    #[test]
    fn validation_messages_name_the_field() {
        let err = ValidationError::MissingArgument { name: "date".into() };
        assert_eq!(err.to_string(), "missing required argument 'date'");
    }
}
