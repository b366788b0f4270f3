use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, RozgarError};

/// Top-level configuration for the Rozgar backend.
///
/// Loaded from `~/.rozgar/config.toml` by default (see the `--config` flag). Every section is optional in the
/// file; missing sections and keys take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RozgarConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl RozgarConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RozgarConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RozgarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognised keys: `ROZGAR_HOST`, `ROZGAR_PORT`, `ROZGAR_DATA_DIR`,
    /// `ROZGAR_DATABASE`, `MODEL_ENDPOINT`, `MODEL_NAME`, `MODEL_API_TOKEN`
    /// (or `GITHUB_TOKEN`), `JWT_SECRET` (or `SECRET_KEY`), `COOKIE_SECURE`,
    /// `TRUST_FORWARDED_FOR`.
    /// Unparseable numeric or boolean values are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty("ROZGAR_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("ROZGAR_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid ROZGAR_PORT"),
            }
        }
        if let Some(dir) = non_empty("ROZGAR_DATA_DIR") {
            self.general.data_dir = dir;
        }
        if let Some(path) = non_empty("ROZGAR_DATABASE") {
            self.database.path = path;
        }
        if let Some(endpoint) = non_empty("MODEL_ENDPOINT") {
            self.model.endpoint = endpoint;
        }
        if let Some(model) = non_empty("MODEL_NAME") {
            self.model.model = model;
        }
        if let Some(token) = non_empty("MODEL_API_TOKEN").or_else(|| non_empty("GITHUB_TOKEN")) {
            self.model.api_token = Some(token);
        }
        if let Some(secret) = non_empty("JWT_SECRET").or_else(|| non_empty("SECRET_KEY")) {
            self.auth.jwt_secret = secret;
        }
        if let Some(flag) = non_empty("COOKIE_SECURE") {
            match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.auth.cookie_secure = true,
                "0" | "false" | "no" => self.auth.cookie_secure = false,
                _ => warn!(value = %flag, "Ignoring invalid COOKIE_SECURE"),
            }
        }
        if let Some(flag) = non_empty("TRUST_FORWARDED_FOR") {
            match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.rate_limit.trust_forwarded_for = true,
                "0" | "false" | "no" => self.rate_limit.trust_forwarded_for = false,
                _ => warn!(value = %flag, "Ignoring invalid TRUST_FORWARDED_FOR"),
            }
        }
    }

    /// Resolved path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        if self.database.path.is_empty() {
            Path::new(&self.general.data_dir).join("rozgar.db")
        } else {
            PathBuf::from(&self.database.path)
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the database and generated secrets.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// Global request body limit in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. Empty means `<data_dir>/rozgar.db`.
    pub path: String,
}

/// Remote language-model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Bearer token. Without one every model call fails over to the
    /// deterministic paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Upper bound on a single model call.
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://models.inference.ai.azure.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_token: None,
            timeout_secs: 8,
            temperature: 0.3,
        }
    }
}

/// Chat pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum inbound message length in characters.
    pub max_message_length: usize,
    /// Jobs fetched per criteria search.
    pub search_limit: u32,
    /// Jobs rendered by the fallback listing.
    pub fallback_listing: usize,
    /// Prior messages given to the model as context.
    pub history_turns: u32,
    /// Default page size of the history endpoint.
    pub history_page_size: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            search_limit: 5,
            fallback_listing: 3,
            history_turns: 5,
            history_page_size: 20,
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. Empty means generate one under `data_dir`.
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub cookie_secure: bool,
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_minutes: 60,
            cookie_secure: false,
            cookie_name: "access_token".to_string(),
        }
    }
}

/// Sliding-window limiter for the authentication endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
    /// Key clients on the first `X-Forwarded-For` hop instead of the peer
    /// address. Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            trust_forwarded_for: false,
        }
    }
}
