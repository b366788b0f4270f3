//! User account persistence. Password hashing happens in the API layer;
//! this module only stores the resulting PHC string.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use serde::Serialize;

use rozgar_core::error::RozgarError;

use crate::db::Database;

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip)]
    pub hashed_password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user. `email` is stored lower-cased.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub hashed_password: &'a str,
    pub role: &'a str,
}

/// Repository for user accounts.
pub struct UserRepository {
    db: Arc<Database>,
}

const USER_COLUMNS: &str = "id, full_name, email, phone, hashed_password, role, created_at";

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let created_at: i64 = row.get(6)?;
    Ok(UserRecord {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        hashed_password: row.get(4)?,
        role: row.get(5)?,
        created_at: Utc.timestamp_opt(created_at, 0).single().unwrap_or_default(),
    })
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a user. A duplicate email yields `RozgarError::Conflict`.
    pub fn create(&self, user: &NewUser<'_>) -> Result<UserRecord, RozgarError> {
        let email = user.email.trim().to_lowercase();
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (full_name, email, phone, hashed_password, role)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user.full_name,
                    email,
                    user.phone,
                    user.hashed_password,
                    user.role
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation
                        && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    RozgarError::Conflict("An account with this email already exists.".to_string())
                }
                other => RozgarError::Storage(format!("Failed to create user: {}", other)),
            })?;
            Ok(conn.last_insert_rowid())
        })?;

        self.find_by_id(id)?
            .ok_or_else(|| RozgarError::Storage(format!("User {} vanished after insert", id)))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RozgarError> {
        let email = email.trim().to_lowercase();
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        self.db.with_conn(|conn| {
            conn.query_row(&sql, rusqlite::params![email], map_user)
                .optional()
                .map_err(|e| RozgarError::Storage(e.to_string()))
        })
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RozgarError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        self.db.with_conn(|conn| {
            conn.query_row(&sql, rusqlite::params![id], map_user)
                .optional()
                .map_err(|e| RozgarError::Storage(e.to_string()))
        })
    }
}
