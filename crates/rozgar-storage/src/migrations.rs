//! Database schema migrations.
//!
//! Version 1 creates the job catalogue (lookups, jobs, applications, the
//! active-job search view), users, and the chat session/message tables, and
//! seeds the lookup tables with the canonical enumerations.

use rusqlite::Connection;
use tracing::info;

use rozgar_core::error::RozgarError;
use rozgar_core::types::{title_case, ExperienceBand, Qualification, DISTRICTS};

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), RozgarError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| RozgarError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| RozgarError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        seed_lookups(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), RozgarError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS job_types (
            id          INTEGER PRIMARY KEY,
            type_name   TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS qualifications (
            id                  INTEGER PRIMARY KEY,
            qualification_name  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS experience_levels (
            id          INTEGER PRIMARY KEY,
            level_name  TEXT NOT NULL UNIQUE,
            min_years   INTEGER NOT NULL,
            max_years   INTEGER
        );

        CREATE TABLE IF NOT EXISTS districts (
            id              INTEGER PRIMARY KEY,
            district_name   TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS taluks (
            id          INTEGER PRIMARY KEY,
            taluk_name  TEXT NOT NULL,
            district_id INTEGER NOT NULL REFERENCES districts (id),
            UNIQUE (taluk_name, district_id)
        );

        CREATE TABLE IF NOT EXISTS jobs (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            job_title            TEXT NOT NULL,
            job_description      TEXT,
            organization_name    TEXT NOT NULL,
            job_type_id          INTEGER NOT NULL REFERENCES job_types (id),
            qualification_id     INTEGER NOT NULL REFERENCES qualifications (id),
            experience_level_id  INTEGER NOT NULL REFERENCES experience_levels (id),
            district_id          INTEGER NOT NULL REFERENCES districts (id),
            taluk_id             INTEGER REFERENCES taluks (id),
            salary_min           REAL,
            salary_max           REAL,
            salary_currency      TEXT NOT NULL DEFAULT 'INR',
            application_deadline TEXT,
            job_posted_date      TEXT NOT NULL DEFAULT (datetime('now')),
            total_vacancies      INTEGER NOT NULL DEFAULT 1,
            requirements         TEXT,
            benefits             TEXT,
            contact_details      TEXT,
            is_active            INTEGER NOT NULL DEFAULT 1,
            updated_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_active_salary
            ON jobs (is_active, salary_max DESC);

        CREATE INDEX IF NOT EXISTS idx_jobs_district
            ON jobs (district_id);

        CREATE VIEW IF NOT EXISTS job_search_view AS
            SELECT j.id,
                   j.job_title,
                   j.job_description,
                   j.organization_name,
                   jt.type_name            AS job_type,
                   q.qualification_name    AS qualification,
                   el.level_name           AS experience_level,
                   el.min_years            AS min_years,
                   d.district_name         AS district_name,
                   t.taluk_name            AS taluk_name,
                   j.salary_min,
                   j.salary_max,
                   j.salary_currency,
                   j.application_deadline,
                   j.job_posted_date,
                   j.total_vacancies,
                   j.requirements,
                   j.benefits,
                   j.contact_details
            FROM jobs j
            JOIN job_types jt         ON jt.id = j.job_type_id
            JOIN qualifications q     ON q.id = j.qualification_id
            JOIN experience_levels el ON el.id = j.experience_level_id
            JOIN districts d          ON d.id = j.district_id
            LEFT JOIN taluks t        ON t.id = j.taluk_id
            WHERE j.is_active = 1;

        CREATE TABLE IF NOT EXISTS job_applications (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id           INTEGER NOT NULL REFERENCES jobs (id),
            applicant_name   TEXT NOT NULL,
            applicant_email  TEXT,
            applicant_phone  TEXT,
            resume_url       TEXT,
            cover_letter     TEXT,
            status           TEXT NOT NULL DEFAULT 'submitted',
            applied_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_applications_email
            ON job_applications (applicant_email);

        CREATE INDEX IF NOT EXISTS idx_applications_phone
            ON job_applications (applicant_phone);

        CREATE TABLE IF NOT EXISTS users (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name        TEXT NOT NULL,
            email            TEXT NOT NULL UNIQUE,
            phone            TEXT,
            hashed_password  TEXT NOT NULL,
            role             TEXT NOT NULL DEFAULT 'user'
                             CHECK (role IN ('user', 'admin')),
            created_at       INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS chat_sessions (
            session_id     TEXT PRIMARY KEY NOT NULL,
            user_ip        TEXT,
            created_at     INTEGER NOT NULL,
            last_activity  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id    TEXT NOT NULL REFERENCES chat_sessions (session_id),
            message_type  TEXT NOT NULL CHECK (message_type IN ('user', 'bot')),
            content       TEXT NOT NULL,
            created_at    INTEGER NOT NULL,
            metadata      TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages (session_id, created_at DESC, id DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| RozgarError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

/// Seed the lookup tables with the canonical enumerations.
///
/// Ids are stable: job types 1 (Government) and 2 (Private), qualifications
/// and experience levels in declaration order, districts in gazetteer order.
fn seed_lookups(conn: &Connection) -> Result<(), RozgarError> {
    let seed_err = |e: rusqlite::Error| RozgarError::Storage(format!("Seeding failed: {}", e));

    conn.execute(
        "INSERT OR IGNORE INTO job_types (id, type_name) VALUES (1, 'Government'), (2, 'Private')",
        [],
    )
    .map_err(seed_err)?;

    for (idx, qualification) in Qualification::ALL.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO qualifications (id, qualification_name) VALUES (?1, ?2)",
            rusqlite::params![idx as i64 + 1, qualification.as_str()],
        )
        .map_err(seed_err)?;
    }

    for (idx, band) in ExperienceBand::ALL.iter().enumerate() {
        let max_years = ExperienceBand::ALL.get(idx + 1).map(|next| next.min_years());
        conn.execute(
            "INSERT OR IGNORE INTO experience_levels (id, level_name, min_years, max_years)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![idx as i64 + 1, band.as_str(), band.min_years(), max_years],
        )
        .map_err(seed_err)?;
    }

    for (idx, district) in DISTRICTS.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO districts (id, district_name) VALUES (?1, ?2)",
            rusqlite::params![idx as i64 + 1, title_case(district)],
        )
        .map_err(seed_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_migrations_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in [
            "jobs",
            "job_applications",
            "users",
            "chat_sessions",
            "chat_messages",
            "job_search_view",
        ] {
            assert_eq!(count(&conn, table), 0, "{} should start empty", table);
        }
    }

    #[test]
    fn test_migrations_seed_lookups() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(count(&conn, "job_types"), 2);
        assert_eq!(count(&conn, "qualifications"), 4);
        assert_eq!(count(&conn, "experience_levels"), 4);
        assert_eq!(count(&conn, "districts"), 25);

        let name: String = conn
            .query_row(
                "SELECT district_name FROM districts WHERE id = 13",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "Fatehgarh Sahib");

        let expert_max: Option<i64> = conn
            .query_row(
                "SELECT max_years FROM experience_levels WHERE level_name = '10+ years'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(expert_max, None);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(count(&conn, "districts"), 25);
    }
}
