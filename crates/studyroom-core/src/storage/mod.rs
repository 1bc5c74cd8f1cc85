mod config;
pub mod database;
pub mod migrations;

pub use config::{AiConfig, BotConfig, Config, MessagesConfig, PomodoroConfig, RemindersConfig};
pub use database::Database;

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DatabaseError};
use crate::platform::UserId;

pub type SubjectId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: i64,
    pub subject_id: SubjectId,
    pub subject: String,
    pub date: NaiveDate,
    pub portion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineRecord {
    pub id: i64,
    pub subject_id: SubjectId,
    pub subject: String,
    pub work: String,
    pub date: NaiveDate,
    pub owner: UserId,
}

/// Storage contract the command layer relies on.
///
/// Implementations must make `find_or_create_subject` idempotent by name and
/// return date-bearing lists in ascending date order.
pub trait Store: Send + Sync {
    /// Record that a user exists, refreshing the stored display name.
    fn ensure_user(&self, user: &UserId, username: &str) -> Result<(), DatabaseError>;

    fn find_or_create_subject(&self, name: &str) -> Result<SubjectId, DatabaseError>;

    fn record_test(
        &self,
        subject_id: SubjectId,
        date: NaiveDate,
        portion: &str,
    ) -> Result<i64, DatabaseError>;

    fn record_deadline(
        &self,
        subject_id: SubjectId,
        work: &str,
        date: NaiveDate,
        owner: &UserId,
    ) -> Result<i64, DatabaseError>;

    fn list_tests(&self) -> Result<Vec<TestRecord>, DatabaseError>;

    /// Tests of the subjects `user` has selected.
    fn tests_for_user(&self, user: &UserId) -> Result<Vec<TestRecord>, DatabaseError>;

    fn list_deadlines(&self, owner: &UserId) -> Result<Vec<DeadlineRecord>, DatabaseError>;

    /// Replace the user's subject selection.
    fn set_user_subjects(&self, user: &UserId, subjects: &[String]) -> Result<(), DatabaseError>;

    fn get_user_subjects(&self, user: &UserId) -> Result<Vec<String>, DatabaseError>;

    fn users_subscribed_to(&self, subject_id: SubjectId) -> Result<Vec<UserId>, DatabaseError>;
}

/// Returns `~/.config/studyroom[-dev]/` based on STUDYROOM_ENV.
///
/// Set STUDYROOM_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STUDYROOM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("studyroom-dev")
    } else {
        base_dir.join("studyroom")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
