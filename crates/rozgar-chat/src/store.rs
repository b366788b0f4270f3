//! Collaborator seams the composer depends on, with their SQLite-backed
//! implementations.

use async_trait::async_trait;

use rozgar_core::types::{ChatMessage, JobStatistics, JobSummary, MessageMetadata, MessageRole, SearchCriteria};
use rozgar_storage::{ConversationRepository, JobRepository};

use crate::error::ChatError;

/// Job search and aggregate statistics.
#[async_trait]
pub trait JobQuery: Send + Sync {
    /// Up to `limit` active jobs matching `criteria`, highest maximum salary first.
    async fn search(&self, criteria: &SearchCriteria, limit: u32) -> Result<Vec<JobSummary>, ChatError>;

    async fn statistics(&self) -> Result<JobStatistics, ChatError>;
}

/// Session and message persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create the session if absent. Returns `true` when it was created.
    async fn ensure_session(&self, session_id: &str, user_ip: Option<&str>) -> Result<bool, ChatError>;

    /// Append a message, creating the session when unknown.
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> Result<i64, ChatError>;

    /// Most recent messages, newest first.
    async fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessage>, ChatError>;
}

#[async_trait]
impl JobQuery for JobRepository {
    async fn search(&self, criteria: &SearchCriteria, limit: u32) -> Result<Vec<JobSummary>, ChatError> {
        Ok(JobRepository::search(self, criteria, limit)?)
    }

    async fn statistics(&self) -> Result<JobStatistics, ChatError> {
        Ok(JobRepository::statistics(self)?)
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    async fn ensure_session(&self, session_id: &str, user_ip: Option<&str>) -> Result<bool, ChatError> {
        Ok(ConversationRepository::ensure_session(self, session_id, user_ip)?)
    }

    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> Result<i64, ChatError> {
        Ok(ConversationRepository::append(self, session_id, role, content, metadata)?)
    }

    async fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(ConversationRepository::recent(self, session_id, limit)?)
    }
}
