//! Chat session and message persistence.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tracing::{debug, warn};

use rozgar_core::error::RozgarError;
use rozgar_core::types::{ChatMessage, ChatSession, MessageMetadata, MessageRole};

use crate::db::Database;

/// Repository for chat sessions and their message history.
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create the session if it does not exist yet.
    ///
    /// Returns `true` when a row was inserted. Repeated calls are no-ops and
    /// never overwrite the recorded address.
    pub fn ensure_session(
        &self,
        session_id: &str,
        user_ip: Option<&str>,
    ) -> Result<bool, RozgarError> {
        let now = Utc::now().timestamp_millis();
        self.db.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO chat_sessions (session_id, user_ip, created_at, last_activity)
                     VALUES (?1, ?2, ?3, ?3)",
                    rusqlite::params![session_id, user_ip, now],
                )
                .map_err(|e| RozgarError::Storage(format!("Failed to ensure session: {}", e)))?;
            if inserted > 0 {
                debug!(session_id, "Chat session created");
            }
            Ok(inserted > 0)
        })
    }

    /// Append a message, creating the session first when it is unknown.
    ///
    /// Touches the session's `last_activity` and returns the new message id.
    pub fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> Result<i64, RozgarError> {
        let metadata_json = metadata.map(serde_json::to_string).transpose()?;
        let now = Utc::now().timestamp_millis();

        self.db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO chat_sessions (session_id, created_at, last_activity)
                 VALUES (?1, ?2, ?2)
                 ON CONFLICT (session_id) DO UPDATE SET last_activity = excluded.last_activity",
                rusqlite::params![session_id, now],
            )
            .map_err(|e| RozgarError::Storage(format!("Failed to touch session: {}", e)))?;

            tx.execute(
                "INSERT INTO chat_messages (session_id, message_type, content, created_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![session_id, role.as_str(), content, now, metadata_json],
            )
            .map_err(|e| RozgarError::Storage(format!("Failed to save message: {}", e)))?;

            Ok(tx.last_insert_rowid())
        })
    }

    /// Up to `limit` most recent messages of a session, newest first.
    pub fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessage>, RozgarError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, message_type, content, created_at, metadata
                     FROM chat_messages
                     WHERE session_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2",
                )
                .map_err(|e| RozgarError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id, limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                })
                .map_err(|e| RozgarError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let (id, session_id, role, content, created_at, metadata) =
                    row.map_err(|e| RozgarError::Storage(e.to_string()))?;
                let role = MessageRole::parse(&role).ok_or_else(|| {
                    RozgarError::Storage(format!("Unknown message type '{}'", role))
                })?;
                messages.push(ChatMessage {
                    id,
                    session_id,
                    role,
                    content,
                    created_at: from_millis(created_at),
                    metadata: metadata.and_then(|raw| parse_metadata(id, &raw)),
                });
            }
            Ok(messages)
        })
    }

    /// Look up a session by id.
    pub fn session(&self, session_id: &str) -> Result<Option<ChatSession>, RozgarError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT session_id, user_ip, created_at, last_activity
                 FROM chat_sessions WHERE session_id = ?1",
                rusqlite::params![session_id],
                |row| {
                    Ok(ChatSession {
                        session_id: row.get(0)?,
                        user_ip: row.get(1)?,
                        created_at: from_millis(row.get(2)?),
                        last_activity: from_millis(row.get(3)?),
                    })
                },
            )
            .optional()
            .map_err(|e| RozgarError::Storage(e.to_string()))
        })
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Metadata written by older builds may not match the current shape; such
/// rows keep their content and drop the metadata.
fn parse_metadata(message_id: i64, raw: &str) -> Option<MessageMetadata> {
    match serde_json::from_str(raw) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!(message_id, error = %e, "Ignoring unreadable message metadata");
            None
        }
    }
}
