//! Rozgar Storage crate - SQLite persistence for the job portal.
//!
//! Provides a WAL-mode SQLite database with migrations, repositories for
//! jobs, applications, users and chat conversations, and analytics queries.

pub mod conversation;
pub mod db;
pub mod migrations;
pub mod queries;
pub mod repository;
pub mod users;

pub use conversation::ConversationRepository;
pub use db::Database;
pub use queries::{
    AnalyticsService, DistrictCount, MonthlyTrend, OrganizationCount, SalaryBucket,
    SALARY_BUCKETS,
};
pub use repository::{
    seed_ids, ApplicationRecord, ApplicationRepository, ExperienceOption, FilterOptions,
    JobFilters, JobPage, JobPatch, JobRecord, JobRepository, JobSort, LookupOption,
    NewApplication, NewJob, MAX_PAGE_SIZE,
};
pub use users::{NewUser, UserRecord, UserRepository};
