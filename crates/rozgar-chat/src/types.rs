//! Message types exchanged with the model and with WebSocket clients.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use rozgar_core::types::{
    CriteriaSource, MessageMetadata, ResponsePath, SearchCriteria,
};

/// Metadata label for replies not produced by the remote model.
pub const FALLBACK_MODEL_LABEL: &str = "fallback_system";

// =============================================================================
// Model turns
// =============================================================================

/// Role of a turn sent to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One role-tagged text turn of a model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }
}

// =============================================================================
// Composer output
// =============================================================================

/// A generated reply plus the facts needed to describe how it was made.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedReply {
    pub text: String,
    pub criteria: SearchCriteria,
    pub criteria_source: CriteriaSource,
    pub jobs_found: usize,
    pub path: ResponsePath,
    /// Model id when the remote model produced the text.
    pub model: Option<String>,
}

impl ComposedReply {
    /// Metadata stored alongside the bot message.
    pub fn metadata(&self) -> MessageMetadata {
        MessageMetadata {
            criteria_used: self.criteria.clone(),
            criteria_source: self.criteria_source,
            jobs_found: self.jobs_found,
            response_path: self.path,
            model_used: self
                .model
                .clone()
                .unwrap_or_else(|| FALLBACK_MODEL_LABEL.to_string()),
        }
    }
}

// =============================================================================
// WebSocket envelopes
// =============================================================================

/// Extract the user text from an inbound WebSocket frame.
///
/// Only `{"type": "user_message", "message": "<text>"}` with non-blank text
/// is accepted; anything else yields `None`.
pub fn parse_inbound(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    if value.get("type")?.as_str()? != "user_message" {
        return None;
    }
    let message = value.get("message")?.as_str()?.trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

/// Kind of an outbound WebSocket frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    BotMessage,
    Typing,
}

/// Outbound WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    pub message: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl OutboundEnvelope {
    pub fn bot(message: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::BotMessage,
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn typing() -> Self {
        Self {
            kind: OutboundKind::Typing,
            message: "AI is thinking...".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
