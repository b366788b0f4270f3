//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, the body
//! limit and all endpoint handlers.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use rozgar_core::config::RozgarConfig;
use rozgar_core::error::RozgarError;

use crate::auth;
use crate::handlers;
use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;
use crate::ws;

/// CORS for the configured browser origins. Unparseable origins are
/// skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);
    let body_limit = state.config.server.max_body_bytes;
    let admin = || from_fn_with_state(state.clone(), auth::require_admin);

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health));

    let chat_routes = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route(
            "/api/chat/history/{session_id}",
            get(handlers::chat_history),
        )
        .route("/ws/chat/{session_id}", get(ws::chat_socket));

    // Reads are public; writes on the same paths need an admin token.
    let job_routes = Router::new()
        .route(
            "/api/jobs",
            get(handlers::list_jobs).merge(post(handlers::create_job).route_layer(admin())),
        )
        .route("/api/jobs/filters", get(handlers::job_filters))
        .route("/api/jobs/stats", get(handlers::job_stats))
        .route("/api/jobs/search", post(handlers::search_jobs))
        .route("/api/jobs/applications", get(handlers::list_applications))
        .route(
            "/api/jobs/{id}",
            get(handlers::get_job).merge(
                put(handlers::update_job)
                    .delete(handlers::delete_job)
                    .route_layer(admin()),
            ),
        )
        .route("/api/jobs/{id}/apply", post(handlers::apply_to_job));

    let analytics_routes = Router::new()
        .route("/api/analytics/trends", get(handlers::analytics_trends))
        .route(
            "/api/analytics/top-districts",
            get(handlers::analytics_top_districts),
        )
        .route(
            "/api/analytics/salary-distribution",
            get(handlers::analytics_salary_distribution),
        )
        .route(
            "/api/analytics/top-organizations",
            get(handlers::analytics_top_organizations),
        );

    // Credential endpoints share one sliding-window limiter.
    let credential_routes = Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .layer(from_fn(rate_limit_middleware))
        .layer(Extension(state.auth_limiter.clone()));

    let session_routes = Router::new()
        .route("/api/auth/me", get(handlers::me))
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    public_routes
        .merge(chat_routes)
        .merge(job_routes)
        .merge(analytics_routes)
        .merge(credential_routes)
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Connection info is attached so handlers can see the peer address.
/// Returns after Ctrl-C once in-flight requests finish.
pub async fn start_server(config: &RozgarConfig, state: AppState) -> Result<(), RozgarError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RozgarError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| RozgarError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
