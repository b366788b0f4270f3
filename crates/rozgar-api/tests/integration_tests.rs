//! Integration tests for the Rozgar API.
//!
//! Every test builds its own in-memory state and drives the router with
//! `tower::ServiceExt::oneshot`. The language model is always unavailable,
//! so chat replies come from the deterministic fallback templates.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use rozgar_api::create_router;
use rozgar_api::handlers::{HealthResponse, JobListResponse};
use rozgar_api::state::AppState;
use rozgar_chat::testing::UnavailableModel;
use rozgar_core::config::RozgarConfig;
use rozgar_storage::seed_ids::*;
use rozgar_storage::{Database, NewJob};

// =============================================================================
// Helpers
// =============================================================================

const TEST_SECRET: &str = "integration-test-secret";

/// Create a fresh AppState with an in-memory DB and no reachable model.
fn make_state() -> AppState {
    AppState::new(
        RozgarConfig::default(),
        Database::in_memory().unwrap(),
        Arc::new(UnavailableModel::new()),
        TEST_SECRET,
    )
}

/// State with three active jobs: two in Ludhiana, one in Amritsar.
fn seeded_state() -> AppState {
    let state = make_state();
    seed_job(&state, "Clerk", "PSSSB", GOVERNMENT, LUDHIANA, 30000.0);
    seed_job(&state, "Software Developer", "Infosys", PRIVATE, LUDHIANA, 80000.0);
    seed_job(&state, "Teacher", "Education Department", GOVERNMENT, AMRITSAR, 45000.0);
    state
}

fn seed_job(state: &AppState, title: &str, org: &str, job_type: i64, district: i64, salary_max: f64) -> i64 {
    state
        .jobs
        .create(&NewJob {
            job_title: title.to_string(),
            organization_name: org.to_string(),
            job_type_id: job_type,
            qualification_id: GRADUATE,
            experience_level_id: ENTRY,
            district_id: district,
            salary_min: Some(salary_max / 2.0),
            salary_max: Some(salary_max),
            total_vacancies: Some(2),
            ..Default::default()
        })
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(method: &str, uri: &str, token: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read full response body bytes.
async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Register an account and return its bearer token.
async fn register(state: &AppState, email: &str, role: &str) -> String {
    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/api/auth/register",
            &json!({
                "full_name": "Test User",
                "email": email,
                "password": "correct-horse",
                "role": role,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap()
}

// =============================================================================
// Service endpoints
// =============================================================================

#[tokio::test]
async fn test_root_banner() {
    let resp = create_router(make_state()).oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Punjab Job Portal API");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_health() {
    let resp = create_router(make_state())
        .oneshot(get("/api/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.database, "connected");
    assert_eq!(health.ai_service, "unavailable-model");
    assert_eq!(health.active_connections, 0);
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_falls_back_to_listing_and_persists() {
    let state = seeded_state();
    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/api/chat",
            &json!({"message": "government jobs in Ludhiana", "session_id": "s-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["session_id"], "s-1");
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("I found 1 jobs matching your criteria"));
    assert!(message.contains("Clerk at PSSSB"));

    let resp = create_router(state)
        .oneshot(get("/api/chat/history/s-1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["role"], "bot");
    assert_eq!(body["data"][0]["metadata"]["response_path"], "fallback");
    assert_eq!(body["data"][1]["role"], "user");
    assert_eq!(body["data"][1]["content"], "government jobs in Ludhiana");
}

#[tokio::test]
async fn test_chat_generates_session_id() {
    let resp = create_router(make_state())
        .oneshot(post_json("/api/chat", &json!({"message": "hello"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let session_id = body["session_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(session_id).is_ok());
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Welcome to Punjab Job Portal!"));
}

#[tokio::test]
async fn test_chat_rejects_blank_message() {
    let resp = create_router(make_state())
        .oneshot(post_json("/api/chat", &json!({"message": "   "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_chat_rejects_oversized_message() {
    let message = "a".repeat(2001);
    let resp = create_router(make_state())
        .oneshot(post_json("/api/chat", &json!({ "message": message })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_history_of_unknown_session_is_empty() {
    let state = make_state();
    let resp = create_router(state.clone())
        .oneshot(get("/api/chat/history/never-seen?limit=5"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["count"], 0);
    assert!(state.conversations.session("never-seen").unwrap().is_some());
}

#[tokio::test]
async fn test_websocket_requires_upgrade() {
    let resp = create_router(make_state())
        .oneshot(get("/ws/chat/abc"))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn test_list_jobs_paginates() {
    let resp = create_router(seeded_state())
        .oneshot(get("/api/jobs?limit=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page: JobListResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.pagination.total, 3);
    assert_eq!(page.pagination.total_pages, 2);
    assert_eq!(page.pagination.page, 1);
}

#[tokio::test]
async fn test_list_jobs_filters_and_sorts() {
    let resp = create_router(seeded_state())
        .oneshot(get("/api/jobs?district=Ludhiana&sort=salary_high"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page: JobListResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(page.pagination.total, 2);
    assert_eq!(page.data[0].job_title, "Software Developer");
}

#[tokio::test]
async fn test_list_jobs_rejects_unknown_sort() {
    let resp = create_router(make_state())
        .oneshot(get("/api/jobs?sort=random"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_filters_and_stats() {
    let state = seeded_state();
    let resp = create_router(state.clone())
        .oneshot(get("/api/jobs/filters"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(!body["job_types"].as_array().unwrap().is_empty());
    assert!(!body["districts"].as_array().unwrap().is_empty());

    let resp = create_router(state)
        .oneshot(get("/api/jobs/stats"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"]["government_jobs"], 2);
    assert_eq!(body["data"]["private_jobs"], 1);
}

#[tokio::test]
async fn test_search_jobs() {
    let resp = create_router(seeded_state())
        .oneshot(post_json(
            "/api/jobs/search",
            &json!({"job_type": "government", "district": "Ludhiana"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["title"], "Clerk");
    assert_eq!(body["message"], "Found 1 jobs matching your criteria");
}

#[tokio::test]
async fn test_search_jobs_validates_input() {
    let state = make_state();
    let resp = create_router(state.clone())
        .oneshot(post_json("/api/jobs/search", &json!({"job_type": "NGO"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = create_router(state)
        .oneshot(post_json("/api/jobs/search", &json!({"limit": 0})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_get_job() {
    let state = make_state();
    let id = seed_job(&state, "Clerk", "PSSSB", GOVERNMENT, PATIALA, 25000.0);

    let resp = create_router(state.clone())
        .oneshot(get(&format!("/api/jobs/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["district_name"], "Patiala");

    let resp = create_router(state)
        .oneshot(get("/api/jobs/9999"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Job not found");
}

// =============================================================================
// Applications
// =============================================================================

#[tokio::test]
async fn test_apply_and_lookup_applications() {
    let state = make_state();
    let id = seed_job(&state, "Clerk", "PSSSB", GOVERNMENT, LUDHIANA, 30000.0);

    let resp = create_router(state.clone())
        .oneshot(post_json(
            &format!("/api/jobs/{}/apply", id),
            &json!({"applicant_name": "Manpreet Kaur", "email": "Manpreet@Example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["job_id"], id);
    assert_eq!(body["message"], "Application submitted successfully");

    let resp = create_router(state)
        .oneshot(get("/api/jobs/applications?email=manpreet@example.com"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["job_title"], "Clerk");
}

#[tokio::test]
async fn test_apply_error_paths() {
    let state = make_state();
    let id = seed_job(&state, "Clerk", "PSSSB", GOVERNMENT, LUDHIANA, 30000.0);

    // Neither email nor phone.
    let resp = create_router(state.clone())
        .oneshot(post_json(
            &format!("/api/jobs/{}/apply", id),
            &json!({"applicant_name": "Manpreet Kaur"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/api/jobs/9999/apply",
            &json!({"applicant_name": "Manpreet Kaur", "phone": "9812345678"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = create_router(state)
        .oneshot(get("/api/jobs/applications"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Analytics
// =============================================================================

#[tokio::test]
async fn test_analytics_endpoints() {
    let state = seeded_state();

    let resp = create_router(state.clone())
        .oneshot(get("/api/analytics/trends"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"][0]["total_jobs"], 3);

    let resp = create_router(state.clone())
        .oneshot(get("/api/analytics/top-districts?limit=1"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"][0]["district"], "Ludhiana");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let resp = create_router(state.clone())
        .oneshot(get("/api/analytics/salary-distribution"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 5);

    let resp = create_router(state)
        .oneshot(get("/api/analytics/top-organizations"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_register_sets_cookie_and_rejects_duplicates() {
    let state = make_state();
    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/api/auth/register",
            &json!({
                "full_name": "  <Jaspreet>  ",
                "email": "Jaspreet@Example.com",
                "phone": "+91 98123 45678",
                "password": "long-enough",
                "role": "superuser",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    let body = body_json(resp).await;
    assert_eq!(body["user"]["email"], "jaspreet@example.com");
    assert_eq!(body["user"]["full_name"], "&lt;Jaspreet&gt;");
    assert_eq!(body["user"]["phone"], "+919812345678");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["token_expires_in"], 3600);

    let resp = create_router(state)
        .oneshot(post_json(
            "/api/auth/register",
            &json!({
                "full_name": "Someone Else",
                "email": "jaspreet@example.com",
                "password": "long-enough",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validation() {
    let state = make_state();
    let cases = [
        json!({"full_name": "A", "email": "a@example.com", "password": "long-enough"}),
        json!({"full_name": "Valid Name", "email": "not-an-email", "password": "long-enough"}),
        json!({"full_name": "Valid Name", "email": "a@example.com", "password": "short"}),
        json!({"full_name": "Valid Name", "email": "a@example.com", "phone": "123", "password": "long-enough"}),
    ];
    for case in cases {
        let resp = create_router(state.clone())
            .oneshot(post_json("/api/auth/register", &case))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "case: {}", case);
    }
}

#[tokio::test]
async fn test_login_and_me() {
    let state = make_state();
    register(&state, "login@example.com", "user").await;

    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/api/auth/login",
            &json!({"email": "LOGIN@example.com", "password": "correct-horse"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
    let cookie_pair = cookie.split(';').next().unwrap().to_string();

    // The cookie alone authenticates.
    let resp = create_router(state.clone())
        .oneshot(
            Request::get("/api/auth/me")
                .header("cookie", cookie_pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["user"]["email"], "login@example.com");

    let resp = create_router(state.clone())
        .oneshot(post_json(
            "/api/auth/login",
            &json!({"email": "login@example.com", "password": "wrong-password"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Invalid email or password.");

    let resp = create_router(state)
        .oneshot(get("/api/auth/me"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

/// Failed login from `peer`, claiming `forwarded` as its origin.
fn login_attempt(peer: [u8; 4], forwarded: &str) -> Request<Body> {
    Request::post("/api/auth/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", forwarded)
        .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
        .body(Body::from(
            json!({"email": "nobody@example.com", "password": "whatever1"}).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_login_rate_limited_per_peer() {
    let state = make_state();

    // A fresh X-Forwarded-For value on every attempt does not reset the limit.
    for i in 0..10 {
        let resp = create_router(state.clone())
            .oneshot(login_attempt([10, 0, 0, 7], &format!("1.2.3.{i}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let resp = create_router(state.clone())
        .oneshot(login_attempt([10, 0, 0, 7], "1.2.3.99"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other peers are unaffected.
    let resp = create_router(state)
        .oneshot(login_attempt([10, 0, 0, 8], "1.2.3.0"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rate_limit_trusts_forwarded_for_when_configured() {
    let mut config = RozgarConfig::default();
    config.rate_limit.trust_forwarded_for = true;
    let state = AppState::new(
        config,
        Database::in_memory().unwrap(),
        Arc::new(UnavailableModel::new()),
        TEST_SECRET,
    );

    for _ in 0..10 {
        let resp = create_router(state.clone())
            .oneshot(login_attempt([10, 0, 0, 1], "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let resp = create_router(state.clone())
        .oneshot(login_attempt([10, 0, 0, 1], "203.0.113.9"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    // Behind the same proxy, a different origin has its own window.
    let resp = create_router(state)
        .oneshot(login_attempt([10, 0, 0, 1], "198.51.100.1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Admin job management
// =============================================================================

#[tokio::test]
async fn test_create_job_requires_admin() {
    let state = make_state();
    let new_job = json!({
        "job_title": "Data Analyst",
        "organization_name": "Punjab Data Office",
        "job_type_id": GOVERNMENT,
        "qualification_id": POST_GRADUATE,
        "experience_level_id": MID,
        "district_id": JALANDHAR,
        "salary_max": 60000.0,
    });

    let resp = create_router(state.clone())
        .oneshot(post_json("/api/jobs", &new_job))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let user_token = register(&state, "user@example.com", "user").await;
    let resp = create_router(state.clone())
        .oneshot(with_bearer("POST", "/api/jobs", &user_token, Some(&new_job)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let admin_token = register(&state, "admin@example.com", "admin").await;
    let resp = create_router(state.clone())
        .oneshot(with_bearer("POST", "/api/jobs", &admin_token, Some(&new_job)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let id = body["job_id"].as_i64().unwrap();

    // Listing stays public.
    let resp = create_router(state)
        .oneshot(get(&format!("/api/jobs/{}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["job_title"], "Data Analyst");
}

#[tokio::test]
async fn test_update_and_delete_job() {
    let state = make_state();
    let id = seed_job(&state, "Clerk", "PSSSB", GOVERNMENT, LUDHIANA, 30000.0);
    let admin_token = register(&state, "admin@example.com", "admin").await;
    let uri = format!("/api/jobs/{}", id);

    let resp = create_router(state.clone())
        .oneshot(with_bearer(
            "PUT",
            &uri,
            &admin_token,
            Some(&json!({"job_title": "Senior Clerk"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.jobs.get(id).unwrap().unwrap().job_title, "Senior Clerk");

    let resp = create_router(state.clone())
        .oneshot(with_bearer("DELETE", &uri, "not-a-token", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = create_router(state.clone())
        .oneshot(with_bearer("DELETE", &uri, &admin_token, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = create_router(state)
        .oneshot(get(&uri))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
