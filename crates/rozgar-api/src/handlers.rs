//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rozgar_chat::ChatError;
use rozgar_core::types::{
    ChatMessage, ExperienceBand, JobCategory, JobStatistics, JobSummary, Qualification,
    SearchCriteria,
};
use rozgar_storage::{
    ApplicationRecord, DistrictCount, FilterOptions, JobFilters, JobPatch, JobRecord, JobSort,
    MonthlyTrend, NewApplication, NewJob, NewUser, OrganizationCount, SalaryBucket, UserRecord,
};

use crate::auth::{hash_password, verify_password, Claims};
use crate::error::ApiError;
use crate::rate_limit::ClientAddr;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobListParams {
    pub search: Option<String>,
    pub job_type: Option<String>,
    pub qualification: Option<String>,
    pub district: Option<String>,
    pub experience: Option<String>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub taluk: Option<String>,
    pub organization: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobSearchRequest {
    pub job_type: Option<String>,
    pub qualification: Option<String>,
    pub district: Option<String>,
    pub experience: Option<String>,
    pub keywords: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationsParams {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub applicant_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsParams {
    pub months: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub endpoints: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub database: String,
    pub ai_service: String,
    pub active_connections: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<ChatMessage>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub success: bool,
    pub data: Vec<JobRecord>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobDetailResponse {
    pub success: bool,
    pub data: JobRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobMutationResponse {
    pub success: bool,
    pub job_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub success: bool,
    pub data: JobStatistics,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobSearchResponse {
    pub success: bool,
    pub data: Vec<JobSummary>,
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub success: bool,
    pub application_id: i64,
    pub job_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplicationListResponse {
    pub success: bool,
    pub data: Vec<ApplicationRecord>,
    pub count: usize,
}

/// `{success, data}` wrapper used by the analytics endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
}

impl From<UserRecord> for UserProfile {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token_expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserProfile,
}

// =============================================================================
// Service endpoints
// =============================================================================

/// GET / - service banner.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Punjab Job Portal API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        endpoints: serde_json::json!({
            "chat": "/api/chat",
            "websocket": "/ws/chat/{session_id}",
            "jobs": "/api/jobs",
            "search": "/api/jobs/search",
            "stats": "/api/jobs/stats",
        }),
    })
}

/// GET /api/health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ok = state.jobs.statistics().is_ok();
    Json(HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        database: if database_ok { "connected" } else { "unavailable" }.to_string(),
        ai_service: state.model_id.clone(),
        active_connections: state.sessions.registry().len(),
    })
}

// =============================================================================
// Chat
// =============================================================================

/// POST /api/chat - one chat turn over plain HTTP.
///
/// Same pipeline as a WebSocket turn without the typing notice. A missing
/// session id starts a new session.
pub async fn chat(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ChatError::EmptyMessage.into());
    }
    let max_len = state.config.chat.max_message_length;
    if message.chars().count() > max_len {
        return Err(ChatError::MessageTooLong(max_len).into());
    }

    let session_id = req
        .session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    validate_session_id(&session_id)?;

    if let Err(e) = state
        .conversations
        .ensure_session(&session_id, client.as_deref())
    {
        tracing::warn!(session_id = %session_id, error = %e, "Failed to record chat session");
    }

    let reply = state.composer.compose(&session_id, message).await;

    Ok(Json(ChatResponse {
        success: true,
        message: reply.text,
        session_id,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// GET /api/chat/history/{session_id} - most recent messages, newest first.
pub async fn chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    validate_session_id(&session_id)?;
    let limit = params
        .limit
        .unwrap_or(state.config.chat.history_page_size)
        .clamp(1, 100);

    state.conversations.ensure_session(&session_id, None)?;
    let data = state.conversations.recent(&session_id, limit)?;

    Ok(Json(HistoryResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// Session ids are opaque, but must be non-empty and reasonably short.
pub(crate) fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    if session_id.trim().is_empty() || session_id.len() > 128 {
        return Err(ApiError::BadRequest(
            "session_id must be 1-128 characters".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Jobs
// =============================================================================

/// GET /api/jobs - filtered, paginated listing.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> Result<Json<JobListResponse>, ApiError> {
    let sort = match params.sort.as_deref() {
        None | Some("") => JobSort::default(),
        Some(key @ ("recent" | "deadline" | "salary_high" | "salary_low")) => JobSort::parse(key),
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Unknown sort '{}'; expected recent, deadline, salary_high or salary_low",
                other
            )))
        }
    };

    let filters = JobFilters {
        search: params.search,
        job_type: params.job_type,
        qualification: params.qualification,
        district: params.district,
        experience: params.experience,
        min_salary: params.min_salary,
        max_salary: params.max_salary,
        taluk: params.taluk,
        organization: params.organization,
        sort,
    };

    let page = state
        .jobs
        .list(&filters, params.page.unwrap_or(1), params.limit.unwrap_or(10))?;
    let pagination = PaginationMeta {
        page: page.page,
        limit: page.limit,
        total: page.total,
        total_pages: page.total_pages().max(1),
    };

    Ok(Json(JobListResponse {
        success: true,
        data: page.jobs,
        pagination,
    }))
}

/// GET /api/jobs/filters - lookup values for the search form.
pub async fn job_filters(State(state): State<AppState>) -> Result<Json<FilterOptions>, ApiError> {
    Ok(Json(state.jobs.filter_options()?))
}

/// GET /api/jobs/stats - aggregate job counts.
pub async fn job_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(StatsResponse {
        success: true,
        data: state.jobs.statistics()?,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// POST /api/jobs/search - structured criteria search.
pub async fn search_jobs(
    State(state): State<AppState>,
    Json(req): Json<JobSearchRequest>,
) -> Result<Json<JobSearchResponse>, ApiError> {
    let limit = req.limit.unwrap_or(10);
    if !(1..=50).contains(&limit) {
        return Err(ApiError::UnprocessableEntity(
            "limit must be between 1 and 50".to_string(),
        ));
    }

    let criteria = SearchCriteria {
        job_type: parse_field("job_type", req.job_type.as_deref(), JobCategory::parse)?,
        qualification: parse_field(
            "qualification",
            req.qualification.as_deref(),
            Qualification::parse,
        )?,
        experience: parse_field("experience", req.experience.as_deref(), ExperienceBand::parse)?,
        district: non_blank(req.district),
        keywords: non_blank(req.keywords),
    };

    let data = state.jobs.search(&criteria, limit)?;
    Ok(Json(JobSearchResponse {
        success: true,
        count: data.len(),
        message: format!("Found {} jobs matching your criteria", data.len()),
        data,
    }))
}

fn parse_field<T>(
    name: &str,
    value: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse(v)
            .map(Some)
            .ok_or_else(|| ApiError::UnprocessableEntity(format!("Unknown {} '{}'", name, v))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// GET /api/jobs/applications - applications by contact email or phone.
pub async fn list_applications(
    State(state): State<AppState>,
    Query(params): Query<ApplicationsParams>,
) -> Result<Json<ApplicationListResponse>, ApiError> {
    let email = non_blank(params.email);
    let phone = non_blank(params.phone);
    if email.is_none() && phone.is_none() {
        return Err(ApiError::BadRequest("Email or phone is required".to_string()));
    }

    let data = state
        .applications
        .find_by_contact(email.as_deref(), phone.as_deref())?;
    Ok(Json(ApplicationListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

/// GET /api/jobs/{id} - full job detail.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<JobDetailResponse>, ApiError> {
    let job = state
        .jobs
        .get(id)?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    Ok(Json(JobDetailResponse {
        success: true,
        data: job,
    }))
}

/// POST /api/jobs/{id}/apply - submit an application.
pub async fn apply_to_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ApplyRequest>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    if req.applicant_name.trim().chars().count() < 2 {
        return Err(ApiError::UnprocessableEntity(
            "applicant_name must be at least 2 characters".to_string(),
        ));
    }

    let application = NewApplication {
        applicant_name: req.applicant_name,
        applicant_email: req.email,
        applicant_phone: req.phone.map(|p| sanitize_phone(&p)),
        resume_url: req.resume_url,
        cover_letter: req.cover_letter,
    };
    let application_id = state.applications.apply(id, &application)?;
    tracing::info!(job_id = id, application_id, "Application submitted");

    Ok(Json(ApplicationResponse {
        success: true,
        application_id,
        job_id: id,
        message: "Application submitted successfully".to_string(),
    }))
}

/// POST /api/jobs - create a job (admin).
pub async fn create_job(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(job): Json<NewJob>,
) -> Result<Json<JobMutationResponse>, ApiError> {
    let job_id = state.jobs.create(&job)?;
    tracing::info!(job_id, admin = %claims.sub, "Job created");
    Ok(Json(JobMutationResponse {
        success: true,
        job_id,
        message: "Job created successfully".to_string(),
    }))
}

/// PUT /api/jobs/{id} - partial update (admin).
pub async fn update_job(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(patch): Json<JobPatch>,
) -> Result<Json<JobMutationResponse>, ApiError> {
    state.jobs.update(id, &patch)?;
    tracing::info!(job_id = id, admin = %claims.sub, "Job updated");
    Ok(Json(JobMutationResponse {
        success: true,
        job_id: id,
        message: "Job updated successfully".to_string(),
    }))
}

/// DELETE /api/jobs/{id} - soft delete (admin).
pub async fn delete_job(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<JobMutationResponse>, ApiError> {
    state.jobs.deactivate(id)?;
    tracing::info!(job_id = id, admin = %claims.sub, "Job deactivated");
    Ok(Json(JobMutationResponse {
        success: true,
        job_id: id,
        message: "Job deactivated successfully".to_string(),
    }))
}

// =============================================================================
// Analytics
// =============================================================================

/// GET /api/analytics/trends - monthly postings by category.
pub async fn analytics_trends(
    State(state): State<AppState>,
    Query(params): Query<TrendsParams>,
) -> Result<Json<DataResponse<Vec<MonthlyTrend>>>, ApiError> {
    let data = state.analytics.trends(params.months.unwrap_or(6))?;
    Ok(Json(DataResponse {
        success: true,
        data,
    }))
}

/// GET /api/analytics/top-districts
pub async fn analytics_top_districts(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<DataResponse<Vec<DistrictCount>>>, ApiError> {
    let data = state.analytics.top_districts(params.limit.unwrap_or(5))?;
    Ok(Json(DataResponse {
        success: true,
        data,
    }))
}

/// GET /api/analytics/salary-distribution
pub async fn analytics_salary_distribution(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<SalaryBucket>>>, ApiError> {
    let data = state.analytics.salary_distribution()?;
    Ok(Json(DataResponse {
        success: true,
        data,
    }))
}

/// GET /api/analytics/top-organizations
pub async fn analytics_top_organizations(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<DataResponse<Vec<OrganizationCount>>>, ApiError> {
    let data = state.analytics.top_organizations(params.limit.unwrap_or(5))?;
    Ok(Json(DataResponse {
        success: true,
        data,
    }))
}

// =============================================================================
// Authentication
// =============================================================================

/// HTML-escape user-supplied text.
pub(crate) fn sanitize_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.trim().chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Keep digits and `+` only.
pub(crate) fn sanitize_phone(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn is_plausible_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn check_password_length(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(8..=128).contains(&len) {
        return Err(ApiError::UnprocessableEntity(
            "Password must be 8-128 characters".to_string(),
        ));
    }
    Ok(())
}

/// Build the auth response with the session cookie attached.
fn auth_success(
    state: &AppState,
    user: UserRecord,
    message: &str,
) -> Result<impl IntoResponse, ApiError> {
    let token = state.tokens.issue(&user)?;
    let cookie = state.tokens.session_cookie(&token);
    let body = AuthResponse {
        success: true,
        message: message.to_string(),
        token_expires_in: state.tokens.ttl_secs(),
        user: user.into(),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// POST /api/auth/register - create an account and sign in.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = sanitize_text(&req.full_name);
    if !(2..=100).contains(&full_name.chars().count()) {
        return Err(ApiError::UnprocessableEntity(
            "Full name must be 2-100 characters".to_string(),
        ));
    }
    let email = req.email.trim().to_lowercase();
    if !is_plausible_email(&email) {
        return Err(ApiError::UnprocessableEntity(
            "A valid email address is required".to_string(),
        ));
    }
    let phone = req
        .phone
        .as_deref()
        .map(sanitize_phone)
        .filter(|p| !p.is_empty());
    if matches!(&phone, Some(p) if !(6..=20).contains(&p.len())) {
        return Err(ApiError::UnprocessableEntity(
            "Phone number must be 6-20 digits".to_string(),
        ));
    }
    check_password_length(&req.password)?;
    let role = match req.role.as_deref().map(|r| r.trim().to_lowercase()) {
        Some(r) if r == "admin" => "admin",
        _ => "user",
    };

    let password = req.password;
    let hashed_password = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))??;

    let user = state.users.create(&NewUser {
        full_name: &full_name,
        email: &email,
        phone: phone.as_deref(),
        hashed_password: &hashed_password,
        role,
    })?;
    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    auth_success(&state, user, "Registration successful")
}

/// POST /api/auth/login - verify credentials and issue a token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid email or password.".to_string());

    let user = state.users.find_by_email(&req.email)?.ok_or_else(invalid)?;

    let password = req.password;
    let stored = user.hashed_password.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))?;
    if !valid {
        tracing::info!(user_id = user.id, "Login rejected");
        return Err(invalid());
    }

    auth_success(&state, user, "Login successful")
}

/// GET /api/auth/me - profile of the authenticated user.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MeResponse>, ApiError> {
    let id: i64 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;
    let user = state
        .users
        .find_by_id(id)?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
    Ok(Json(MeResponse {
        success: true,
        user: user.into(),
    }))
}
