//! Chat pipeline: criteria extraction, reply composition and WebSocket
//! session management.

pub mod context;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod response;
pub mod session;
pub mod store;
pub mod testing;
pub mod types;

pub use error::ChatError;
pub use extractor::CriteriaExtractor;
pub use llm::{complete_with_timeout, HttpLanguageModel, LanguageModel};
pub use response::{ComposerSettings, ResponseComposer, LAST_RESORT_REPLY};
pub use session::{ConnectionHandle, ConnectionRegistry, OutboundSender, SessionManager};
pub use store::{ConversationStore, JobQuery};
pub use types::{ChatTurn, ComposedReply, OutboundEnvelope, OutboundKind, TurnRole};
