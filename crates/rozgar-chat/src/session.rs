//! WebSocket session lifecycle and the live-connection registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rozgar_core::types::MessageRole;

use crate::response::ResponseComposer;
use crate::types::{parse_inbound, OutboundEnvelope};

/// Sending half of a connection's outbound queue.
pub type OutboundSender = mpsc::UnboundedSender<OutboundEnvelope>;

/// Identifies one registered connection of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    session_id: String,
    connection_id: u64,
}

impl ConnectionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }
}

struct Registration {
    connection_id: u64,
    sender: OutboundSender,
}

/// At most one live connection per session id; the latest registration wins.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, Registration>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any existing one for the session.
    pub fn register(&self, session_id: &str, sender: OutboundSender) -> ConnectionHandle {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.lock().insert(
            session_id.to_string(),
            Registration {
                connection_id,
                sender,
            },
        );
        if let Some(previous) = previous {
            debug!(
                session_id,
                replaced = previous.connection_id,
                connection_id,
                "Connection replaced"
            );
        }
        ConnectionHandle {
            session_id: session_id.to_string(),
            connection_id,
        }
    }

    /// Remove the registration if it still belongs to `handle`.
    pub fn deregister(&self, handle: &ConnectionHandle) -> bool {
        let mut connections = self.lock();
        match connections.get(&handle.session_id) {
            Some(reg) if reg.connection_id == handle.connection_id => {
                connections.remove(&handle.session_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.lock()
            .get(&handle.session_id)
            .is_some_and(|reg| reg.connection_id == handle.connection_id)
    }

    /// Send to the handle's connection if it is still the registered one.
    ///
    /// A closed receiver deregisters the connection. Returns whether the
    /// envelope was queued.
    pub fn deliver(&self, handle: &ConnectionHandle, envelope: OutboundEnvelope) -> bool {
        let mut connections = self.lock();
        let Some(reg) = connections.get(&handle.session_id) else {
            return false;
        };
        if reg.connection_id != handle.connection_id {
            debug!(
                session_id = %handle.session_id,
                connection_id = handle.connection_id,
                "Dropping message for replaced connection"
            );
            return false;
        }
        if reg.sender.send(envelope).is_err() {
            connections.remove(&handle.session_id);
            warn!(session_id = %handle.session_id, "Connection closed, deregistered");
            return false;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drives connect, inbound messages and disconnect for WebSocket sessions.
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
    composer: Arc<ResponseComposer>,
    /// Longest accepted message, in characters after trimming.
    max_message_length: usize,
}

impl SessionManager {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        composer: Arc<ResponseComposer>,
        max_message_length: usize,
    ) -> Self {
        Self {
            registry,
            composer,
            max_message_length,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register the connection, make sure the session exists and send the
    /// welcome message. The welcome is not persisted.
    pub async fn connect(
        &self,
        session_id: &str,
        user_ip: Option<&str>,
        sender: OutboundSender,
    ) -> ConnectionHandle {
        let handle = self.registry.register(session_id, sender);
        info!(session_id, connection_id = handle.connection_id, "Chat connection opened");

        if let Err(e) = self.composer.store().ensure_session(session_id, user_ip).await {
            warn!(session_id, error = %e, "Failed to record chat session");
        }

        let welcome = self.composer.welcome().await;
        self.registry.deliver(&handle, OutboundEnvelope::bot(welcome));
        handle
    }

    /// Process one raw inbound frame.
    ///
    /// Returns `false` when the frame was ignored: not a user message, blank,
    /// or longer than the configured limit. Otherwise the user message
    /// is persisted, a typing notice is sent, and the reply is persisted and
    /// delivered. A reply for a replaced connection is persisted but dropped.
    pub async fn handle_inbound(&self, handle: &ConnectionHandle, raw: &str) -> bool {
        let Some(text) = parse_inbound(raw) else {
            debug!(session_id = %handle.session_id, "Ignoring inbound frame");
            return false;
        };
        let chars = text.chars().count();
        if chars > self.max_message_length {
            warn!(
                session_id = %handle.session_id,
                chars,
                limit = self.max_message_length,
                "Ignoring oversized chat message"
            );
            return false;
        }
        let session_id = handle.session_id();
        let store = self.composer.store();

        if let Err(e) = store.append(session_id, MessageRole::User, &text, None).await {
            warn!(session_id, error = %e, "Failed to persist user message");
        }
        self.registry.deliver(handle, OutboundEnvelope::typing());

        let reply = self.composer.generate(session_id, &text).await;
        if let Err(e) = store
            .append(session_id, MessageRole::Bot, &reply.text, Some(&reply.metadata()))
            .await
        {
            warn!(session_id, error = %e, "Failed to persist bot reply");
        }

        self.registry.deliver(handle, OutboundEnvelope::bot(reply.text));
        true
    }

    /// Deregister the connection. Stale handles are a no-op.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        if self.registry.deregister(handle) {
            info!(
                session_id = %handle.session_id,
                connection_id = handle.connection_id,
                "Chat connection closed"
            );
        } else {
            debug!(
                session_id = %handle.session_id,
                connection_id = handle.connection_id,
                "Closed connection was already replaced"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rozgar_storage::{ConversationRepository, Database, JobRepository};

    use crate::response::ComposerSettings;
    use crate::testing::UnavailableModel;
    use crate::types::OutboundKind;

    fn channel() -> (OutboundSender, mpsc::UnboundedReceiver<OutboundEnvelope>) {
        mpsc::unbounded_channel()
    }

    const MAX_MESSAGE_LENGTH: usize = 50;

    fn manager() -> (SessionManager, Arc<ConversationRepository>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let conversations = Arc::new(ConversationRepository::new(Arc::clone(&db)));
        let composer = ResponseComposer::new(
            Arc::new(UnavailableModel::new()),
            Arc::new(JobRepository::new(db)),
            conversations.clone(),
            ComposerSettings::default(),
        );
        (
            SessionManager::new(
                Arc::new(ConnectionRegistry::new()),
                Arc::new(composer),
                MAX_MESSAGE_LENGTH,
            ),
            conversations,
        )
    }

    // ---- Registry ----

    #[test]
    fn test_register_replaces_previous_connection() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        let first = registry.register("s", tx1);
        assert!(registry.deliver(&first, OutboundEnvelope::bot("before")));

        let second = registry.register("s", tx2);
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_current(&first));
        assert!(registry.is_current(&second));

        assert!(!registry.deliver(&first, OutboundEnvelope::bot("stale")));
        assert!(registry.deliver(&second, OutboundEnvelope::bot("after")));

        assert_eq!(rx1.try_recv().unwrap().message, "before");
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap().message, "after");
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_stale_deregister_keeps_current() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let first = registry.register("s", tx1);
        let second = registry.register("s", tx2);

        assert!(!registry.deregister(&first));
        assert!(registry.is_current(&second));
        assert!(registry.deregister(&second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_closed_receiver_deregisters() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = channel();
        let handle = registry.register("s", tx);
        drop(rx);

        assert!(!registry.deliver(&handle, OutboundEnvelope::bot("lost")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sessions_are_independent() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        let a = registry.register("a", tx_a);
        let b = registry.register("b", tx_b);
        assert_ne!(a.connection_id(), b.connection_id());

        registry.deliver(&b, OutboundEnvelope::bot("for b"));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().message, "for b");
    }

    // ---- Manager ----

    #[tokio::test]
    async fn test_connect_sends_welcome_and_creates_session() {
        let (manager, conversations) = manager();
        let (tx, mut rx) = channel();

        let handle = manager.connect("s1", Some("10.1.1.1"), tx).await;
        assert_eq!(handle.session_id(), "s1");

        let welcome = rx.try_recv().unwrap();
        assert_eq!(welcome.kind, OutboundKind::BotMessage);
        assert!(welcome.message.starts_with("Welcome to the Punjab Job Portal!"));

        let session = conversations.session("s1").unwrap().unwrap();
        assert_eq!(session.user_ip.as_deref(), Some("10.1.1.1"));
        assert!(conversations.recent("s1", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_message_flow() {
        let (manager, conversations) = manager();
        let (tx, mut rx) = channel();
        let handle = manager.connect("s1", None, tx).await;
        rx.try_recv().unwrap();

        let processed = manager
            .handle_inbound(&handle, r#"{"type":"user_message","message":"jobs in AMRITSAR"}"#)
            .await;
        assert!(processed);

        let typing = rx.try_recv().unwrap();
        assert_eq!(typing.kind, OutboundKind::Typing);
        assert_eq!(typing.message, "AI is thinking...");
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.kind, OutboundKind::BotMessage);

        let stored = conversations.recent("s1", 10).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].role, MessageRole::User);
        assert_eq!(stored[1].content, "jobs in AMRITSAR");
        assert_eq!(stored[0].role, MessageRole::Bot);
        assert_eq!(stored[0].content, reply.message);
        let metadata = stored[0].metadata.as_ref().unwrap();
        assert_eq!(
            metadata.criteria_used.district.as_deref(),
            Some("Amritsar")
        );
    }

    #[tokio::test]
    async fn test_ignored_frames_send_nothing() {
        let (manager, conversations) = manager();
        let (tx, mut rx) = channel();
        let handle = manager.connect("s1", None, tx).await;
        rx.try_recv().unwrap();

        for raw in [r#"{"type":"ping"}"#, "garbage", r#"{"type":"user_message","message":""}"#] {
            assert!(!manager.handle_inbound(&handle, raw).await);
        }
        assert!(rx.try_recv().is_err());
        assert!(conversations.recent("s1", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_ignored() {
        let (manager, conversations) = manager();
        let (tx, mut rx) = channel();
        let handle = manager.connect("s1", None, tx).await;
        rx.try_recv().unwrap();

        let long = serde_json::json!({
            "type": "user_message",
            "message": "a".repeat(MAX_MESSAGE_LENGTH + 1),
        })
        .to_string();
        assert!(!manager.handle_inbound(&handle, &long).await);
        assert!(rx.try_recv().is_err());
        assert!(conversations.recent("s1", 10).unwrap().is_empty());

        // Exactly at the limit, counted in characters after trimming.
        let at_limit = serde_json::json!({
            "type": "user_message",
            "message": format!("  {}  ", "ਪ".repeat(MAX_MESSAGE_LENGTH)),
        })
        .to_string();
        assert!(manager.handle_inbound(&handle, &at_limit).await);
        assert_eq!(conversations.recent("s1", 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reply_for_replaced_connection_not_cross_delivered() {
        let (manager, conversations) = manager();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let first = manager.connect("s1", None, tx1).await;
        rx1.try_recv().unwrap();
        let second = manager.connect("s1", None, tx2).await;
        rx2.try_recv().unwrap();

        assert!(manager.handle_inbound(&first, r#"{"type":"user_message","message":"hello"}"#).await);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
        // The turn is still recorded.
        assert_eq!(conversations.recent("s1", 10).unwrap().len(), 2);

        manager.disconnect(&first);
        assert!(manager.registry().is_current(&second));
        manager.disconnect(&second);
        assert!(manager.registry().is_empty());
    }
}
