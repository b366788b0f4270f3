//! Password hashing, JWT issuance and the authentication middleware.
//!
//! Tokens are HS256 JWTs carrying `{sub, email, role, exp}`. They are set
//! as an HttpOnly cookie on login and accepted either from that cookie or
//! from an `Authorization: Bearer <token>` header.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use rozgar_core::config::AuthConfig;
use rozgar_storage::UserRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// Generate a random 64-character hex signing secret.
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Load the signing secret from file, or generate and save a new one.
pub fn load_or_generate_secret(secret_path: &std::path::Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(secret_path) {
        let secret = contents.trim().to_string();
        if !secret.is_empty() {
            tracing::info!("JWT secret loaded from {}", secret_path.display());
            return secret;
        }
    }

    let secret = generate_secret();

    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(secret_path, &secret) {
        tracing::warn!(
            error = %e,
            "Failed to save JWT secret to {}; tokens will not survive a restart",
            secret_path.display()
        );
    } else {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(secret_path, std::fs::Permissions::from_mode(0o600));
        }
        tracing::info!("JWT secret saved to {}", secret_path.display());
    }

    secret
}

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ApiError::Internal(format!("Failed to encode salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string. Unparseable hashes fail.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: String,
    /// Expiry as seconds since the epoch.
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Signing keys plus cookie settings.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
    cookie_name: String,
    cookie_secure: bool,
}

impl TokenIssuer {
    pub fn new(secret: &str, config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: config.token_ttl_minutes.max(1) * 60,
            cookie_name: config.cookie_name.clone(),
            cookie_secure: config.cookie_secure,
        }
    }

    /// Token lifetime in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn issue(&self, user: &UserRecord) -> Result<String, ApiError> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            exp: (Utc::now().timestamp() + self.ttl_secs).max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected token");
                ApiError::Unauthorized("Invalid or expired token".to_string())
            })
    }

    /// `Set-Cookie` value carrying the token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
            self.cookie_name,
            token,
            self.ttl_secs,
            if self.cookie_secure { "; Secure" } else { "" }
        )
    }

    /// Token from the `Authorization` header, falling back to the cookie.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(token) = bearer {
            return Some(token.to_string());
        }

        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.to_string())
            .filter(|t| !t.is_empty())
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, ApiError> {
        let token = self
            .token_from_headers(headers)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
        self.verify(&token)
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Middleware that requires a valid token and stores its [`Claims`] in the
/// request extensions.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match state.tokens.authenticate(req.headers()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Middleware that additionally requires the `admin` role.
pub async fn require_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match state.tokens.authenticate(req.headers()) {
        Ok(claims) if claims.is_admin() => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Ok(claims) => {
            tracing::warn!(user = %claims.sub, "Admin route refused");
            ApiError::Forbidden("Administrator access required".to_string()).into_response()
        }
        Err(e) => e.into_response(),
    }
}
