//! Job catalogue repositories.
//!
//! `JobRepository` serves criteria search, aggregate statistics, paginated
//! listing and admin CRUD over the `jobs` table and `job_search_view`.
//! `ApplicationRepository` records applications against active jobs.

use std::sync::Arc;

use rusqlite::types::ToSql;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use rozgar_core::error::RozgarError;
use rozgar_core::types::{JobStatistics, JobSummary, SearchCriteria};

use crate::db::Database;

/// Hard upper bound on a listing page.
pub const MAX_PAGE_SIZE: u32 = 50;

// =============================================================================
// Row types
// =============================================================================

/// Full detail of an active job, as exposed by the listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub job_title: String,
    pub job_description: Option<String>,
    pub organization_name: String,
    pub job_type: String,
    pub qualification: String,
    pub experience_level: String,
    pub district_name: String,
    pub taluk_name: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub application_deadline: Option<String>,
    pub job_posted_date: String,
    pub total_vacancies: i64,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub contact_details: Option<String>,
}

/// Sort orders supported by [`JobRepository::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobSort {
    #[default]
    Recent,
    Deadline,
    SalaryHigh,
    SalaryLow,
}

impl JobSort {
    /// Parse a sort key; unknown keys fall back to `Recent`.
    pub fn parse(value: &str) -> Self {
        match value {
            "deadline" => JobSort::Deadline,
            "salary_high" => JobSort::SalaryHigh,
            "salary_low" => JobSort::SalaryLow,
            _ => JobSort::Recent,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            JobSort::Recent => "job_posted_date DESC, id DESC",
            JobSort::Deadline => {
                "application_deadline IS NULL, application_deadline ASC, id DESC"
            }
            JobSort::SalaryHigh => "salary_max IS NULL, salary_max DESC, id DESC",
            JobSort::SalaryLow => "salary_min IS NULL, salary_min ASC, id DESC",
        }
    }
}

/// Filters for the paginated job listing.
#[derive(Debug, Clone, Default)]
pub struct JobFilters {
    /// Free text matched against title, organization and description.
    pub search: Option<String>,
    pub job_type: Option<String>,
    pub qualification: Option<String>,
    pub district: Option<String>,
    pub experience: Option<String>,
    /// Jobs whose maximum salary reaches at least this amount.
    pub min_salary: Option<f64>,
    /// Jobs whose minimum salary does not exceed this amount.
    pub max_salary: Option<f64>,
    pub taluk: Option<String>,
    pub organization: Option<String>,
    pub sort: JobSort,
}

/// One page of listing results.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<JobRecord>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl JobPage {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }
}

/// Payload for creating a job. Lookup fields are ids from the filter options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewJob {
    pub job_title: String,
    pub job_description: Option<String>,
    pub organization_name: String,
    pub job_type_id: i64,
    pub qualification_id: i64,
    pub experience_level_id: i64,
    pub district_id: i64,
    pub taluk_id: Option<i64>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub application_deadline: Option<String>,
    pub total_vacancies: Option<i64>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub contact_details: Option<String>,
}

/// Partial update of a job; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobPatch {
    pub job_title: Option<String>,
    pub job_description: Option<String>,
    pub organization_name: Option<String>,
    pub job_type_id: Option<i64>,
    pub qualification_id: Option<i64>,
    pub experience_level_id: Option<i64>,
    pub district_id: Option<i64>,
    pub taluk_id: Option<i64>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub application_deadline: Option<String>,
    pub total_vacancies: Option<i64>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub contact_details: Option<String>,
    pub is_active: Option<bool>,
}

impl JobPatch {
    fn assignments(&self) -> Vec<(&'static str, Box<dyn ToSql>)> {
        let mut out: Vec<(&'static str, Box<dyn ToSql>)> = Vec::new();
        macro_rules! field {
            ($name:ident) => {
                if let Some(value) = &self.$name {
                    out.push((stringify!($name), Box::new(value.clone())));
                }
            };
        }
        field!(job_title);
        field!(job_description);
        field!(organization_name);
        field!(job_type_id);
        field!(qualification_id);
        field!(experience_level_id);
        field!(district_id);
        field!(taluk_id);
        field!(salary_min);
        field!(salary_max);
        field!(salary_currency);
        field!(application_deadline);
        field!(total_vacancies);
        field!(requirements);
        field!(benefits);
        field!(contact_details);
        field!(is_active);
        out
    }
}

/// An `(id, name)` pair from a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOption {
    pub id: i64,
    pub name: String,
}

/// An experience level with its year bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceOption {
    pub id: i64,
    pub name: String,
    pub min_years: i64,
    pub max_years: Option<i64>,
}

/// Everything a client needs to populate the search filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOptions {
    pub job_types: Vec<LookupOption>,
    pub qualifications: Vec<LookupOption>,
    pub experience_levels: Vec<ExperienceOption>,
    pub districts: Vec<LookupOption>,
}

// =============================================================================
// Query building
// =============================================================================

/// Escape `%`, `_` and `\` and wrap the value for a substring `LIKE`.
pub(crate) fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Accumulates `AND`-joined conditions with positional parameters.
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl Conditions {
    fn eq(&mut self, column: &str, value: &str) {
        self.clauses.push(format!("{} = ?", column));
        self.params.push(Box::new(value.to_string()));
    }

    fn like_any(&mut self, columns: &[&str], value: &str) {
        let pattern = like_pattern(value);
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect();
        self.clauses.push(format!("({})", ors.join(" OR ")));
        for _ in columns {
            self.params.push(Box::new(pattern.clone()));
        }
    }

    fn raw(&mut self, clause: &str, value: Box<dyn ToSql>) {
        self.clauses.push(clause.to_string());
        self.params.push(value);
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

const SUMMARY_COLUMNS: &str = "id, job_title, organization_name, job_type, qualification,
     experience_level, district_name, taluk_name, salary_min, salary_max,
     total_vacancies, application_deadline";

const RECORD_COLUMNS: &str = "id, job_title, job_description, organization_name, job_type,
     qualification, experience_level, district_name, taluk_name, salary_min, salary_max,
     salary_currency, application_deadline, job_posted_date, total_vacancies,
     requirements, benefits, contact_details";

fn map_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobSummary> {
    Ok(JobSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        organization: row.get(2)?,
        category: row.get(3)?,
        qualification: row.get(4)?,
        experience: row.get(5)?,
        district: row.get(6)?,
        taluk: row.get(7)?,
        salary_min: row.get(8)?,
        salary_max: row.get(9)?,
        vacancies: row.get(10)?,
        deadline: row.get(11)?,
    })
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        job_title: row.get(1)?,
        job_description: row.get(2)?,
        organization_name: row.get(3)?,
        job_type: row.get(4)?,
        qualification: row.get(5)?,
        experience_level: row.get(6)?,
        district_name: row.get(7)?,
        taluk_name: row.get(8)?,
        salary_min: row.get(9)?,
        salary_max: row.get(10)?,
        salary_currency: row.get(11)?,
        application_deadline: row.get(12)?,
        job_posted_date: row.get(13)?,
        total_vacancies: row.get(14)?,
        requirements: row.get(15)?,
        benefits: row.get(16)?,
        contact_details: row.get(17)?,
    })
}

/// Map a write failure, surfacing bad lookup ids as validation errors.
fn write_error(action: &str, e: rusqlite::Error) -> RozgarError {
    if e.to_string().contains("FOREIGN KEY") {
        RozgarError::Validation(format!("{}: unknown reference id", action))
    } else {
        RozgarError::Storage(format!("{}: {}", action, e))
    }
}

fn validate_salary(min: Option<f64>, max: Option<f64>) -> Result<(), RozgarError> {
    for value in [min, max].into_iter().flatten() {
        if value < 0.0 || !value.is_finite() {
            return Err(RozgarError::Validation(
                "salary must be a non-negative number".to_string(),
            ));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(RozgarError::Validation(
                "salary_min cannot exceed salary_max".to_string(),
            ));
        }
    }
    Ok(())
}

// =============================================================================
// JobRepository
// =============================================================================

/// Repository over the job catalogue.
pub struct JobRepository {
    db: Arc<Database>,
}

impl JobRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Active jobs matching the criteria, highest maximum salary first.
    ///
    /// Category, qualification and experience match exactly; district is a
    /// case-insensitive substring match; the keyword is matched against the
    /// title, requirements and benefits.
    pub fn search(
        &self,
        criteria: &SearchCriteria,
        limit: u32,
    ) -> Result<Vec<JobSummary>, RozgarError> {
        let mut cond = Conditions::default();
        if let Some(job_type) = criteria.job_type {
            cond.eq("job_type", job_type.as_str());
        }
        if let Some(qualification) = criteria.qualification {
            cond.eq("qualification", qualification.as_str());
        }
        if let Some(experience) = criteria.experience {
            cond.eq("experience_level", experience.as_str());
        }
        if let Some(district) = non_blank(&criteria.district) {
            cond.like_any(&["district_name"], district);
        }
        if let Some(keyword) = non_blank(&criteria.keywords) {
            cond.like_any(&["job_title", "requirements", "benefits"], keyword);
        }
        cond.params.push(Box::new(limit as i64));

        let sql = format!(
            "SELECT {} FROM job_search_view {}
             ORDER BY salary_max IS NULL, salary_max DESC, id ASC
             LIMIT ?",
            SUMMARY_COLUMNS,
            cond.where_sql()
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| RozgarError::Storage(format!("Job search prepare: {}", e)))?;
            let rows = stmt
                .query_map(cond.refs().as_slice(), map_summary)
                .map_err(|e| RozgarError::Storage(format!("Job search: {}", e)))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| RozgarError::Storage(e.to_string()))
        })
    }

    /// Aggregate counts over active jobs.
    pub fn statistics(&self) -> Result<JobStatistics, RozgarError> {
        self.db.with_conn(|conn| {
            let (government, private, employers): (i64, i64, i64) = conn
                .query_row(
                    "SELECT COALESCE(SUM(job_type = 'Government'), 0),
                            COALESCE(SUM(job_type = 'Private'), 0),
                            COUNT(DISTINCT organization_name)
                     FROM job_search_view",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .map_err(|e| RozgarError::Storage(format!("Job statistics: {}", e)))?;

            let districts: i64 = conn
                .query_row("SELECT COUNT(*) FROM districts", [], |row| row.get(0))
                .map_err(|e| RozgarError::Storage(format!("District count: {}", e)))?;

            Ok(JobStatistics {
                government_jobs: government.max(0) as u64,
                private_jobs: private.max(0) as u64,
                total_districts: districts.max(0) as u64,
                total_employers: employers.max(0) as u64,
            })
        })
    }

    /// Paginated listing. `page` starts at 1; `limit` is clamped to
    /// `1..=MAX_PAGE_SIZE`.
    pub fn list(&self, filters: &JobFilters, page: u32, limit: u32) -> Result<JobPage, RozgarError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = (page as i64 - 1) * limit as i64;

        let mut cond = Conditions::default();
        if let Some(search) = non_blank(&filters.search) {
            cond.like_any(&["job_title", "organization_name", "job_description"], search);
        }
        if let Some(job_type) = non_blank(&filters.job_type) {
            cond.eq("job_type", job_type);
        }
        if let Some(qualification) = non_blank(&filters.qualification) {
            cond.eq("qualification", qualification);
        }
        if let Some(district) = non_blank(&filters.district) {
            cond.like_any(&["district_name"], district);
        }
        if let Some(experience) = non_blank(&filters.experience) {
            cond.eq("experience_level", experience);
        }
        if let Some(min_salary) = filters.min_salary {
            cond.raw("salary_max >= ?", Box::new(min_salary));
        }
        if let Some(max_salary) = filters.max_salary {
            cond.raw("salary_min <= ?", Box::new(max_salary));
        }
        if let Some(taluk) = non_blank(&filters.taluk) {
            cond.like_any(&["taluk_name"], taluk);
        }
        if let Some(organization) = non_blank(&filters.organization) {
            cond.like_any(&["organization_name"], organization);
        }

        let where_sql = cond.where_sql();
        let count_sql = format!("SELECT COUNT(*) FROM job_search_view {}", where_sql);
        let page_sql = format!(
            "SELECT {} FROM job_search_view {} ORDER BY {} LIMIT {} OFFSET {}",
            RECORD_COLUMNS,
            where_sql,
            filters.sort.order_by(),
            limit,
            offset
        );

        self.db.with_conn(|conn| {
            let params = cond.refs();
            let total: i64 = conn
                .query_row(&count_sql, params.as_slice(), |row| row.get(0))
                .map_err(|e| RozgarError::Storage(format!("Job count: {}", e)))?;

            let mut stmt = conn
                .prepare(&page_sql)
                .map_err(|e| RozgarError::Storage(format!("Job list prepare: {}", e)))?;
            let jobs = stmt
                .query_map(params.as_slice(), map_record)
                .map_err(|e| RozgarError::Storage(format!("Job list: {}", e)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| RozgarError::Storage(e.to_string()))?;

            Ok(JobPage {
                jobs,
                total: total.max(0) as u64,
                page,
                limit,
            })
        })
    }

    /// Detail of an active job.
    pub fn get(&self, id: i64) -> Result<Option<JobRecord>, RozgarError> {
        let sql = format!("SELECT {} FROM job_search_view WHERE id = ?1", RECORD_COLUMNS);
        self.db.with_conn(|conn| {
            conn.query_row(&sql, rusqlite::params![id], map_record)
                .optional()
                .map_err(|e| RozgarError::Storage(format!("Job lookup: {}", e)))
        })
    }

    /// Insert a job and return its id. Currency defaults to INR, vacancies
    /// to 1, and the job starts active.
    pub fn create(&self, job: &NewJob) -> Result<i64, RozgarError> {
        if job.job_title.trim().is_empty() {
            return Err(RozgarError::Validation("job_title is required".to_string()));
        }
        if job.organization_name.trim().is_empty() {
            return Err(RozgarError::Validation(
                "organization_name is required".to_string(),
            ));
        }
        if matches!(job.total_vacancies, Some(n) if n < 1) {
            return Err(RozgarError::Validation(
                "total_vacancies must be at least 1".to_string(),
            ));
        }
        validate_salary(job.salary_min, job.salary_max)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO jobs (job_title, job_description, organization_name, job_type_id,
                                   qualification_id, experience_level_id, district_id, taluk_id,
                                   salary_min, salary_max, salary_currency, application_deadline,
                                   total_vacancies, requirements, benefits, contact_details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                rusqlite::params![
                    job.job_title.trim(),
                    job.job_description,
                    job.organization_name.trim(),
                    job.job_type_id,
                    job.qualification_id,
                    job.experience_level_id,
                    job.district_id,
                    job.taluk_id,
                    job.salary_min,
                    job.salary_max,
                    job.salary_currency.as_deref().unwrap_or("INR"),
                    job.application_deadline,
                    job.total_vacancies.unwrap_or(1),
                    job.requirements,
                    job.benefits,
                    job.contact_details,
                ],
            )
            .map_err(|e| write_error("Failed to create job", e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Apply a partial update. Errors with `NotFound` when no job has the id
    /// and with `Validation` when the patch is empty.
    pub fn update(&self, id: i64, patch: &JobPatch) -> Result<(), RozgarError> {
        let assignments = patch.assignments();
        if assignments.is_empty() {
            return Err(RozgarError::Validation("no fields to update".to_string()));
        }
        if matches!(&patch.job_title, Some(t) if t.trim().is_empty()) {
            return Err(RozgarError::Validation("job_title cannot be empty".to_string()));
        }
        validate_salary(patch.salary_min, patch.salary_max)?;

        let mut sets: Vec<String> = assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect();
        sets.push("updated_at = datetime('now')".to_string());
        let sql = format!("UPDATE jobs SET {} WHERE id = ?", sets.join(", "));

        let mut params: Vec<&dyn ToSql> = assignments.iter().map(|(_, v)| v.as_ref()).collect();
        params.push(&id);

        self.db.with_conn(|conn| {
            let changed = conn
                .execute(&sql, params.as_slice())
                .map_err(|e| write_error("Failed to update job", e))?;
            if changed == 0 {
                return Err(RozgarError::NotFound(format!("job {}", id)));
            }
            Ok(())
        })
    }

    /// Soft-delete an active job.
    pub fn deactivate(&self, id: i64) -> Result<(), RozgarError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE jobs SET is_active = 0, updated_at = datetime('now')
                     WHERE id = ?1 AND is_active = 1",
                    rusqlite::params![id],
                )
                .map_err(|e| RozgarError::Storage(format!("Failed to deactivate job: {}", e)))?;
            if changed == 0 {
                return Err(RozgarError::NotFound(format!("job {}", id)));
            }
            Ok(())
        })
    }

    /// Lookup values for the filter widgets.
    pub fn filter_options(&self) -> Result<FilterOptions, RozgarError> {
        fn lookup(conn: &rusqlite::Connection, sql: &str) -> Result<Vec<LookupOption>, RozgarError> {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| RozgarError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(LookupOption {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })
                .map_err(|e| RozgarError::Storage(e.to_string()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| RozgarError::Storage(e.to_string()))
        }

        self.db.with_conn(|conn| {
            let job_types = lookup(conn, "SELECT id, type_name FROM job_types ORDER BY id")?;
            let qualifications = lookup(
                conn,
                "SELECT id, qualification_name FROM qualifications ORDER BY id",
            )?;
            let districts = lookup(
                conn,
                "SELECT id, district_name FROM districts ORDER BY district_name",
            )?;

            let mut stmt = conn
                .prepare(
                    "SELECT id, level_name, min_years, max_years FROM experience_levels
                     ORDER BY min_years",
                )
                .map_err(|e| RozgarError::Storage(e.to_string()))?;
            let experience_levels = stmt
                .query_map([], |row| {
                    Ok(ExperienceOption {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        min_years: row.get(2)?,
                        max_years: row.get(3)?,
                    })
                })
                .map_err(|e| RozgarError::Storage(e.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| RozgarError::Storage(e.to_string()))?;

            Ok(FilterOptions {
                job_types,
                qualifications,
                experience_levels,
                districts,
            })
        })
    }
}

// =============================================================================
// ApplicationRepository
// =============================================================================

/// Payload for applying to a job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewApplication {
    pub applicant_name: String,
    pub applicant_email: Option<String>,
    pub applicant_phone: Option<String>,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
}

/// A stored application joined with its job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: i64,
    pub job_id: i64,
    pub job_title: String,
    pub organization_name: String,
    pub applicant_name: String,
    pub applicant_email: Option<String>,
    pub applicant_phone: Option<String>,
    pub status: String,
    pub applied_at: String,
}

/// Repository for job applications.
pub struct ApplicationRepository {
    db: Arc<Database>,
}

impl ApplicationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record an application against an active job and return its id.
    pub fn apply(&self, job_id: i64, application: &NewApplication) -> Result<i64, RozgarError> {
        let name = application.applicant_name.trim();
        if name.is_empty() {
            return Err(RozgarError::Validation(
                "applicant_name is required".to_string(),
            ));
        }
        let email = non_blank(&application.applicant_email).map(str::to_lowercase);
        let phone = non_blank(&application.applicant_phone).map(str::to_string);
        if email.is_none() && phone.is_none() {
            return Err(RozgarError::Validation(
                "an email or phone number is required".to_string(),
            ));
        }

        self.db.with_transaction(|tx| {
            let active: Option<i64> = tx
                .query_row(
                    "SELECT id FROM jobs WHERE id = ?1 AND is_active = 1",
                    rusqlite::params![job_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RozgarError::Storage(e.to_string()))?;
            if active.is_none() {
                return Err(RozgarError::NotFound("Job not found or inactive".to_string()));
            }

            tx.execute(
                "INSERT INTO job_applications
                    (job_id, applicant_name, applicant_email, applicant_phone, resume_url, cover_letter)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    job_id,
                    name,
                    email,
                    phone,
                    application.resume_url,
                    application.cover_letter,
                ],
            )
            .map_err(|e| RozgarError::Storage(format!("Failed to save application: {}", e)))?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Applications submitted with the given email or phone, newest first.
    pub fn find_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<ApplicationRecord>, RozgarError> {
        let email = email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_lowercase);
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());
        if email.is_none() && phone.is_none() {
            return Err(RozgarError::Validation(
                "email or phone is required".to_string(),
            ));
        }

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT a.id, a.job_id, j.job_title, j.organization_name, a.applicant_name,
                            a.applicant_email, a.applicant_phone, a.status, a.applied_at
                     FROM job_applications a
                     JOIN jobs j ON j.id = a.job_id
                     WHERE (?1 IS NOT NULL AND a.applicant_email = ?1)
                        OR (?2 IS NOT NULL AND a.applicant_phone = ?2)
                     ORDER BY a.applied_at DESC, a.id DESC",
                )
                .map_err(|e| RozgarError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![email, phone], |row| {
                    Ok(ApplicationRecord {
                        id: row.get(0)?,
                        job_id: row.get(1)?,
                        job_title: row.get(2)?,
                        organization_name: row.get(3)?,
                        applicant_name: row.get(4)?,
                        applicant_email: row.get(5)?,
                        applicant_phone: row.get(6)?,
                        status: row.get(7)?,
                        applied_at: row.get(8)?,
                    })
                })
                .map_err(|e| RozgarError::Storage(e.to_string()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| RozgarError::Storage(e.to_string()))
        })
    }
}

// =============================================================================
// Test fixtures
// =============================================================================

/// Stable lookup ids assigned by the v1 seed, for fixtures and tests.
pub mod seed_ids {
    pub const GOVERNMENT: i64 = 1;
    pub const PRIVATE: i64 = 2;

    pub const TWELFTH_PASS: i64 = 1;
    pub const GRADUATE: i64 = 2;
    pub const POST_GRADUATE: i64 = 3;

    pub const ENTRY: i64 = 1;
    pub const MID: i64 = 2;
    pub const SENIOR: i64 = 3;

    pub const AMRITSAR: i64 = 1;
    pub const LUDHIANA: i64 = 2;
    pub const JALANDHAR: i64 = 3;
    pub const PATIALA: i64 = 4;
}
