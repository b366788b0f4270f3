//! Read-only analytics over active jobs for the dashboard endpoints.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rozgar_core::error::RozgarError;

use crate::db::Database;

/// Jobs posted in one calendar month, split by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`.
    pub month: String,
    pub government_jobs: u64,
    pub private_jobs: u64,
    pub total_jobs: u64,
}

/// Job and vacancy counts for one district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictCount {
    pub district: String,
    pub job_count: u64,
    pub total_vacancies: u64,
}

/// Number of jobs whose maximum salary falls in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryBucket {
    pub range: String,
    pub job_count: u64,
}

/// Job count and average maximum salary for one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationCount {
    pub organization: String,
    pub job_count: u64,
    pub avg_salary: Option<f64>,
}

/// Salary bucket labels in display order.
pub const SALARY_BUCKETS: [&str; 5] = ["<15k", "15k-30k", "30k-60k", "60k-100k", "100k+"];

/// Analytics query service.
pub struct AnalyticsService {
    db: Arc<Database>,
}

fn storage(e: rusqlite::Error) -> RozgarError {
    RozgarError::Storage(format!("Analytics query: {}", e))
}

impl AnalyticsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Monthly posting counts for the last `months` months, oldest first.
    pub fn trends(&self, months: u32) -> Result<Vec<MonthlyTrend>, RozgarError> {
        let window = format!("-{} months", months.clamp(1, 60));
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT strftime('%Y-%m', job_posted_date) AS month,
                            SUM(job_type = 'Government'),
                            SUM(job_type = 'Private'),
                            COUNT(*)
                     FROM job_search_view
                     WHERE job_posted_date >= date('now', 'start of month', ?1)
                     GROUP BY month
                     ORDER BY month ASC",
                )
                .map_err(storage)?;
            let rows = stmt
                .query_map(rusqlite::params![window], |row| {
                    Ok(MonthlyTrend {
                        month: row.get(0)?,
                        government_jobs: row.get::<_, i64>(1)?.max(0) as u64,
                        private_jobs: row.get::<_, i64>(2)?.max(0) as u64,
                        total_jobs: row.get::<_, i64>(3)?.max(0) as u64,
                    })
                })
                .map_err(storage)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
        })
    }

    /// Districts with the most active jobs.
    pub fn top_districts(&self, limit: u32) -> Result<Vec<DistrictCount>, RozgarError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT district_name, COUNT(*) AS job_count, SUM(total_vacancies)
                     FROM job_search_view
                     GROUP BY district_name
                     ORDER BY job_count DESC, district_name ASC
                     LIMIT ?1",
                )
                .map_err(storage)?;
            let rows = stmt
                .query_map(rusqlite::params![limit.clamp(1, 50)], |row| {
                    Ok(DistrictCount {
                        district: row.get(0)?,
                        job_count: row.get::<_, i64>(1)?.max(0) as u64,
                        total_vacancies: row.get::<_, i64>(2)?.max(0) as u64,
                    })
                })
                .map_err(storage)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
        })
    }

    /// Active jobs bucketed by maximum salary. Every bucket is present,
    /// including empty ones; jobs without a salary are not counted.
    pub fn salary_distribution(&self) -> Result<Vec<SalaryBucket>, RozgarError> {
        self.db.with_conn(|conn| {
            let counts: [i64; 5] = conn
                .query_row(
                    "SELECT COALESCE(SUM(salary_max < 15000), 0),
                            COALESCE(SUM(salary_max >= 15000 AND salary_max < 30000), 0),
                            COALESCE(SUM(salary_max >= 30000 AND salary_max < 60000), 0),
                            COALESCE(SUM(salary_max >= 60000 AND salary_max < 100000), 0),
                            COALESCE(SUM(salary_max >= 100000), 0)
                     FROM job_search_view
                     WHERE salary_max IS NOT NULL",
                    [],
                    |row| {
                        Ok([
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ])
                    },
                )
                .map_err(storage)?;

            Ok(SALARY_BUCKETS
                .iter()
                .zip(counts)
                .map(|(range, count)| SalaryBucket {
                    range: range.to_string(),
                    job_count: count.max(0) as u64,
                })
                .collect())
        })
    }

    /// Organizations with the most active jobs.
    pub fn top_organizations(&self, limit: u32) -> Result<Vec<OrganizationCount>, RozgarError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT organization_name, COUNT(*) AS job_count, AVG(salary_max)
                     FROM job_search_view
                     GROUP BY organization_name
                     ORDER BY job_count DESC, organization_name ASC
                     LIMIT ?1",
                )
                .map_err(storage)?;
            let rows = stmt
                .query_map(rusqlite::params![limit.clamp(1, 50)], |row| {
                    Ok(OrganizationCount {
                        organization: row.get(0)?,
                        job_count: row.get::<_, i64>(1)?.max(0) as u64,
                        avg_salary: row.get(2)?,
                    })
                })
                .map_err(storage)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
        })
    }
}
