//! SQLite-backed [`Store`].
//!
//! Provides persistent storage for:
//! - Users and their subject selections
//! - Scheduled tests (shared by everyone)
//! - Per-user deadlines

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::{migrations, DeadlineRecord, Store, SubjectId, TestRecord};
use crate::error::DatabaseError;
use crate::platform::UserId;

/// SQLite database behind a mutex so it can be shared across tasks.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path` and apply migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "database opened");
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-query leaves SQLite itself consistent.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn subject_id_for(conn: &Connection, name: &str) -> rusqlite::Result<SubjectId> {
    conn.execute(
        "INSERT OR IGNORE INTO subjects (name) VALUES (?1)",
        params![name],
    )?;
    conn.query_row(
        "SELECT id FROM subjects WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
}

fn test_from_row(row: &Row<'_>) -> rusqlite::Result<TestRecord> {
    Ok(TestRecord {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        subject: row.get(2)?,
        date: row.get(3)?,
        portion: row.get(4)?,
    })
}

impl Store for Database {
    fn ensure_user(&self, user: &UserId, username: &str) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT INTO users (id, username) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET username = excluded.username",
            params![user.as_str(), username],
        )?;
        Ok(())
    }

    fn find_or_create_subject(&self, name: &str) -> Result<SubjectId, DatabaseError> {
        Ok(subject_id_for(&self.conn(), name)?)
    }

    fn record_test(
        &self,
        subject_id: SubjectId,
        date: NaiveDate,
        portion: &str,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tests (subject_id, date, portion) VALUES (?1, ?2, ?3)",
            params![subject_id, date, portion],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_deadline(
        &self,
        subject_id: SubjectId,
        work: &str,
        date: NaiveDate,
        owner: &UserId,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO deadlines (subject_id, work, date, owner) VALUES (?1, ?2, ?3, ?4)",
            params![subject_id, work, date, owner.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_tests(&self) -> Result<Vec<TestRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.subject_id, s.name, t.date, t.portion
             FROM tests t JOIN subjects s ON t.subject_id = s.id
             ORDER BY t.date ASC, t.id ASC",
        )?;
        let rows = stmt.query_map([], test_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn tests_for_user(&self, user: &UserId) -> Result<Vec<TestRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.subject_id, s.name, t.date, t.portion
             FROM tests t
             JOIN subjects s ON t.subject_id = s.id
             JOIN user_subjects us ON s.id = us.subject_id
             WHERE us.user_id = ?1
             ORDER BY t.date ASC, t.id ASC",
        )?;
        let rows = stmt.query_map(params![user.as_str()], test_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_deadlines(&self, owner: &UserId) -> Result<Vec<DeadlineRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.subject_id, s.name, d.work, d.date, d.owner
             FROM deadlines d JOIN subjects s ON d.subject_id = s.id
             WHERE d.owner = ?1
             ORDER BY d.date ASC, d.id ASC",
        )?;
        let rows = stmt.query_map(params![owner.as_str()], |row| {
            Ok(DeadlineRecord {
                id: row.get(0)?,
                subject_id: row.get(1)?,
                subject: row.get(2)?,
                work: row.get(3)?,
                date: row.get(4)?,
                owner: UserId(row.get(5)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_user_subjects(&self, user: &UserId, subjects: &[String]) -> Result<(), DatabaseError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO users (id) VALUES (?1)",
            params![user.as_str()],
        )?;
        tx.execute(
            "DELETE FROM user_subjects WHERE user_id = ?1",
            params![user.as_str()],
        )?;
        for name in subjects {
            let subject_id = subject_id_for(&tx, name)?;
            tx.execute(
                "INSERT OR IGNORE INTO user_subjects (user_id, subject_id) VALUES (?1, ?2)",
                params![user.as_str(), subject_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_user_subjects(&self, user: &UserId) -> Result<Vec<String>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.name FROM subjects s
             JOIN user_subjects us ON s.id = us.subject_id
             WHERE us.user_id = ?1
             ORDER BY s.name ASC",
        )?;
        let rows = stmt.query_map(params![user.as_str()], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn users_subscribed_to(&self, subject_id: SubjectId) -> Result<Vec<UserId>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id FROM user_subjects WHERE subject_id = ?1 ORDER BY user_id ASC",
        )?;
        let rows = stmt.query_map(params![subject_id], |row| row.get::<_, String>(0).map(UserId))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
