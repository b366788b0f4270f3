//! Domain types shared by the storage, chat and API crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Gazetteer
// =============================================================================

/// District names recognised in free text, in match order.
///
/// `muktsar` precedes `muktsar sahib`, so the shorter name wins when both
/// appear; `ropar` and `rupnagar` are listed separately.
pub const DISTRICTS: &[&str] = &[
    "amritsar",
    "ludhiana",
    "jalandhar",
    "patiala",
    "bathinda",
    "moga",
    "sangrur",
    "kapurthala",
    "hoshiarpur",
    "gurdaspur",
    "ropar",
    "mohali",
    "fatehgarh sahib",
    "muktsar",
    "mansa",
    "barnala",
    "faridkot",
    "ferozepur",
    "pathankot",
    "tarn taran",
    "fazilka",
    "muktsar sahib",
    "malerkotla",
    "nawanshahr",
    "rupnagar",
];

/// Upper-case the first letter of every whitespace-separated word and
/// lower-case the rest.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Search criteria
// =============================================================================

/// Sector of a job listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobCategory {
    Government,
    Private,
}

impl JobCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCategory::Government => "Government",
            JobCategory::Private => "Private",
        }
    }

    /// Case-insensitive parse of the canonical name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "government" => Some(JobCategory::Government),
            "private" => Some(JobCategory::Private),
            _ => None,
        }
    }
}

/// Minimum qualification tier required by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Qualification {
    #[serde(rename = "12th Pass")]
    TwelfthPass,
    #[serde(rename = "Graduate")]
    Graduate,
    #[serde(rename = "Post Graduate")]
    PostGraduate,
    #[serde(rename = "Others")]
    Others,
}

impl Qualification {
    pub const ALL: [Qualification; 4] = [
        Qualification::TwelfthPass,
        Qualification::Graduate,
        Qualification::PostGraduate,
        Qualification::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Qualification::TwelfthPass => "12th Pass",
            Qualification::Graduate => "Graduate",
            Qualification::PostGraduate => "Post Graduate",
            Qualification::Others => "Others",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(value))
    }
}

/// Experience band required by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperienceBand {
    #[serde(rename = "0-2 years")]
    Entry,
    #[serde(rename = "2-5 years")]
    Mid,
    #[serde(rename = "5-10 years")]
    Senior,
    #[serde(rename = "10+ years")]
    Expert,
}

impl ExperienceBand {
    pub const ALL: [ExperienceBand; 4] = [
        ExperienceBand::Entry,
        ExperienceBand::Mid,
        ExperienceBand::Senior,
        ExperienceBand::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceBand::Entry => "0-2 years",
            ExperienceBand::Mid => "2-5 years",
            ExperienceBand::Senior => "5-10 years",
            ExperienceBand::Expert => "10+ years",
        }
    }

    /// Lower bound of the band in years.
    pub fn min_years(&self) -> u32 {
        match self {
            ExperienceBand::Entry => 0,
            ExperienceBand::Mid => 2,
            ExperienceBand::Senior => 5,
            ExperienceBand::Expert => 10,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for JobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Qualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ExperienceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured job-search constraints derived from a free-text message.
///
/// Every field is independently optional; an absent field is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualification: Option<Qualification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<ExperienceBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.job_type.is_none()
            && self.qualification.is_none()
            && self.experience.is_none()
            && self.district.is_none()
            && self.keywords.is_none()
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// Read-only projection of an active job used for chat display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: i64,
    pub title: String,
    pub organization: String,
    pub category: String,
    pub qualification: String,
    pub experience: String,
    pub district: String,
    pub taluk: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub vacancies: i64,
    pub deadline: Option<String>,
}

/// Aggregate counts over active jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub government_jobs: u64,
    pub private_jobs: u64,
    pub total_districts: u64,
    pub total_employers: u64,
}

impl JobStatistics {
    /// Values shown when the real statistics cannot be fetched.
    pub fn placeholder() -> Self {
        Self {
            government_jobs: 0,
            private_jobs: 0,
            total_districts: DISTRICTS.len() as u64,
            total_employers: 0,
        }
    }

    pub fn total_jobs(&self) -> u64 {
        self.government_jobs + self.private_jobs
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// Author of a stored chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Bot,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Bot => "bot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "bot" => Some(MessageRole::Bot),
            _ => None,
        }
    }
}

/// Which branch of the extractor produced the criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaSource {
    Model,
    Rules,
}

/// Which branch of the composer produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePath {
    /// The remote model answered.
    Model,
    /// A deterministic template rendered from live data.
    Fallback,
    /// The fixed last-resort help string.
    Static,
}

/// Usage metadata attached to bot messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub criteria_used: SearchCriteria,
    pub criteria_source: CriteriaSource,
    pub jobs_found: usize,
    pub response_path: ResponsePath,
    pub model_used: String,
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// A persisted chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub user_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
