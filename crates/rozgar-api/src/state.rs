//! Application state shared across all route handlers.
//!
//! AppState holds references to the repositories, the chat pipeline and the
//! auth helpers. It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rozgar_chat::{
    ComposerSettings, ConnectionRegistry, LanguageModel, ResponseComposer, SessionManager,
};
use rozgar_core::config::RozgarConfig;
use rozgar_storage::{
    AnalyticsService, ApplicationRepository, ConversationRepository, Database, JobRepository,
    UserRepository,
};

use crate::auth::TokenIssuer;
use crate::rate_limit::RateLimiter;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RozgarConfig>,
    pub database: Arc<Database>,
    pub jobs: Arc<JobRepository>,
    pub applications: Arc<ApplicationRepository>,
    pub users: Arc<UserRepository>,
    pub conversations: Arc<ConversationRepository>,
    pub analytics: Arc<AnalyticsService>,
    /// Reply pipeline shared by the HTTP and WebSocket chat paths.
    pub composer: Arc<ResponseComposer>,
    pub sessions: Arc<SessionManager>,
    pub tokens: Arc<TokenIssuer>,
    /// Limiter for the register and login routes.
    pub auth_limiter: RateLimiter,
    /// Model id reported by the health endpoint.
    pub model_id: String,
    pub start_time: Instant,
}

impl AppState {
    /// Wire repositories and the chat pipeline around one database.
    pub fn new(
        config: RozgarConfig,
        database: Database,
        model: Arc<dyn LanguageModel>,
        jwt_secret: &str,
    ) -> Self {
        let database = Arc::new(database);
        let jobs = Arc::new(JobRepository::new(Arc::clone(&database)));
        let conversations = Arc::new(ConversationRepository::new(Arc::clone(&database)));

        let model_id = model.model_id().to_string();
        let composer = Arc::new(ResponseComposer::new(
            model,
            jobs.clone(),
            conversations.clone(),
            ComposerSettings::from(&config),
        ));
        let sessions = Arc::new(SessionManager::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::clone(&composer),
            config.chat.max_message_length,
        ));

        Self {
            applications: Arc::new(ApplicationRepository::new(Arc::clone(&database))),
            users: Arc::new(UserRepository::new(Arc::clone(&database))),
            analytics: Arc::new(AnalyticsService::new(Arc::clone(&database))),
            tokens: Arc::new(TokenIssuer::new(jwt_secret, &config.auth)),
            auth_limiter: RateLimiter::new(
                config.rate_limit.max_requests,
                Duration::from_secs(config.rate_limit.window_secs),
            )
            .with_forwarded_for(config.rate_limit.trust_forwarded_for),
            config: Arc::new(config),
            database,
            jobs,
            conversations,
            composer,
            sessions,
            model_id,
            start_time: Instant::now(),
        }
    }
}
