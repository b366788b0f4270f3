//! Per-client sliding-window rate limiter for the authentication routes.
//!
//! Each client address keeps the timestamps of its accepted requests inside
//! the window; older entries are evicted on every check. Clients whose
//! newest stamp has aged out are swept at most once per window so the map
//! stays bounded by the number of recently active clients.
//!
//! Clients are keyed on the TCP peer address. `X-Forwarded-For` is only
//! consulted when the limiter is told to trust it, since any caller can
//! set that header.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

#[derive(Default)]
struct Window {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    trust_forwarded_for: bool,
    state: Arc<Mutex<Window>>,
}

impl RateLimiter {
    /// Allow `max_requests` per client within any `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trust_forwarded_for: false,
            state: Arc::new(Mutex::new(Window::default())),
        }
    }

    /// Key clients on the first `X-Forwarded-For` hop when present.
    pub fn with_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Record a request from `client`. Returns true if it is allowed.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    /// Number of clients currently holding stamps.
    pub fn tracked_clients(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).hits.len()
    }

    /// Client key for a request under this limiter's trust setting.
    pub fn client_key(&self, headers: &HeaderMap, extensions: &Extensions) -> String {
        client_address(headers, extensions, self.trust_forwarded_for)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let window = self.window;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let due = match state.last_sweep {
            Some(last) => now.saturating_duration_since(last) >= window,
            None => true,
        };
        if due {
            state.hits.retain(|_, stamps| {
                stamps
                    .back()
                    .is_some_and(|t| now.saturating_duration_since(*t) < window)
            });
            state.last_sweep = Some(now);
        }

        let stamps = state.hits.entry(client.to_string()).or_default();
        while let Some(oldest) = stamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                stamps.pop_front();
            } else {
                break;
            }
        }
        if stamps.len() >= self.max_requests {
            return false;
        }
        stamps.push_back(now);
        true
    }
}

fn peer_address(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Client address for a request. The first `X-Forwarded-For` hop is used
/// only when `trust_forwarded_for` is set; otherwise the peer address
/// recorded by `ConnectInfo`.
pub fn client_address(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_forwarded_for: bool,
) -> Option<String> {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_for(headers) {
            return Some(ip);
        }
    }
    peer_address(extensions)
}

/// Extractor for the peer address of the connection.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(peer_address(&parts.extensions)))
    }
}

/// Axum middleware that enforces the limit per client address.
pub async fn rate_limit_middleware(
    axum::extract::Extension(limiter): axum::extract::Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client = limiter.client_key(req.headers(), req.extensions());
    if limiter.check(&client) {
        next.run(req).await
    } else {
        tracing::warn!(client = %client, "Rate limit exceeded");
        ApiError::TooManyRequests("Too many requests. Please try again shortly.".to_string())
            .into_response()
    }
}
