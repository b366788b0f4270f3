//! Rozgar API crate - axum HTTP server, route handlers, WebSocket chat.
//!
//! Provides the REST API for the job portal: chat over HTTP and WebSocket,
//! job listing and search, applications, analytics, account registration
//! and login, and health checks.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
