mod dto;
pub mod handlers;
pub mod session;

pub use session::{ConversationSession, SessionRegistry, TurnResult, TurnState};

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// How a message is rendered. `Insights` carries the recommendations after a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Insights,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

pub fn router() -> axum::Router<crate::state::AppState> {
    handlers::routes()
}
