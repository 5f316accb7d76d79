//! Request and response bodies exchanged with the chat backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use ragchat_core::{ConversationId, MessageId, Origin};

/// Substituted when the ask endpoint returns no usable answer.
pub const NO_RESPONSE: &str = "No response received";

/// One row of `GET /conversations/`. Only the id is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
}

/// Body of `POST /conversations/`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedConversation {
    pub conversation_id: ConversationId,
}

/// One row of `GET /conversations/{id}/messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    #[serde(default)]
    pub id: Option<MessageId>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
}

impl HistoryMessage {
    pub fn origin(&self) -> Origin {
        Origin::from_sender(self.sender.as_deref())
    }

    /// Server creation time, if present and parseable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Body of `POST /ask/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub answer: Option<String>,
}

impl AskResponse {
    /// The answer text; a missing, null or empty answer is not an error.
    pub fn into_answer(self) -> String {
        match self.answer {
            Some(answer) if !answer.is_empty() => answer,
            _ => NO_RESPONSE.to_string(),
        }
    }
}

/// Acknowledgement from `POST /upload/`. Not otherwise interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// JSON body for `POST /login`.
#[derive(Debug, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// JSON body for `POST /signup`.
#[derive(Debug, Serialize)]
pub(crate) struct SignupBody<'a> {
    pub full_name: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC.
///
/// The backend stores `TIMESTAMP` columns without a zone, so most values
/// arrive in the naive form.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
