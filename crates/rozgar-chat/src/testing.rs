//! Deterministic language-model stubs for tests. No network access.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::llm::LanguageModel;
use crate::types::ChatTurn;

/// Replays queued results in order and records every request.
///
/// Once the queue is exhausted each call fails with [`ChatError::Model`].
pub struct ScriptedModel {
    id: String,
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedModel {
    /// `Err(msg)` entries become model errors.
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            id: "scripted-model".to_string(),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, ChatError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(turns.to_vec());
        match self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(ChatError::Model(msg)),
            None => Err(ChatError::Model("no scripted response left".to_string())),
        }
    }
}

/// Fails every call, like a model with no credentials.
#[derive(Default)]
pub struct UnavailableModel {
    calls: AtomicUsize,
}

impl UnavailableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for UnavailableModel {
    fn model_id(&self) -> &str {
        "unavailable-model"
    }

    async fn complete(&self, _turns: &[ChatTurn]) -> Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ChatError::Model("model unavailable".to_string()))
    }
}

/// Sleeps before answering; pairs with paused tokio time in timeout tests.
pub struct SlowModel {
    delay: Duration,
    reply: String,
}

impl SlowModel {
    pub fn new(delay: Duration, reply: impl Into<String>) -> Self {
        Self {
            delay,
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for SlowModel {
    fn model_id(&self) -> &str {
        "slow-model"
    }

    async fn complete(&self, _turns: &[ChatTurn]) -> Result<String, ChatError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}
