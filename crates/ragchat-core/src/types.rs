use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Preview shown for conversations loaded from the service before they are opened.
pub const LOADED_PREVIEW_PLACEHOLDER: &str = "Tap to view";

// =============================================================================
// Identity
// =============================================================================

/// Identifiers arrive as JSON numbers from the backend but are opaque to the client.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Int(i64),
    Text(String),
}

impl From<WireId> for String {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Int(n) => n.to_string(),
            WireId::Text(s) => s,
        }
    }
}

/// Opaque conversation identifier assigned by the remote service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<i64> for ConversationId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireId::deserialize(deserializer).map(|id| Self(id.into()))
    }
}

/// Message identifier: server-assigned for history, session-generated for local messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireId::deserialize(deserializer).map(|id| Self(id.into()))
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Who authored a message. Determines rendering side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

impl Origin {
    /// Map a free-form server `sender` field. Only exactly `"user"` is the human side.
    pub fn from_sender(sender: Option<&str>) -> Self {
        match sender {
            Some("user") => Origin::User,
            _ => Origin::Assistant,
        }
    }
}

/// Final state of a transient status notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Succeeded,
    Failed,
}

/// Lifecycle of a timeline entry.
///
/// User input is appended `Tentative` and only ever moves to `Confirmed`.
/// Upload notices are appended `Transient` and only ever move to `Resolved`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Optimistic echo of user input whose reply is still outstanding.
    Tentative,
    /// Settled content: history, replies, greetings, answered input.
    Confirmed,
    /// Status notice for an operation still in flight.
    Transient,
    /// A former transient notice whose operation has finished.
    Resolved(Resolution),
}

/// A single entry in a conversation timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub origin: Origin,
    pub status: MessageStatus,
}

impl Message {
    /// A settled assistant message stamped with the current time.
    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            timestamp: Utc::now(),
            origin: Origin::Assistant,
            status: MessageStatus::Confirmed,
        }
    }

    /// Optimistically echoed user input stamped with the current time.
    pub fn tentative_user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            timestamp: Utc::now(),
            origin: Origin::User,
            status: MessageStatus::Tentative,
        }
    }

    /// An assistant status notice for an in-flight operation.
    pub fn transient(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            status: MessageStatus::Transient,
            ..Self::assistant(id, content)
        }
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// A server-tracked chat thread as shown in the sidebar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub is_active: bool,
    /// Advisory only; never authoritative.
    pub last_message_preview: String,
}

impl Conversation {
    /// An entry from the service listing. Starts inactive with a placeholder preview.
    pub fn loaded(id: ConversationId) -> Self {
        Self {
            title: Self::title_for(&id),
            id,
            is_active: false,
            last_message_preview: LOADED_PREVIEW_PLACEHOLDER.to_string(),
        }
    }

    /// A conversation the user just started. Starts active with no preview.
    pub fn created(id: ConversationId) -> Self {
        Self {
            title: Self::title_for(&id),
            id,
            is_active: true,
            last_message_preview: String::new(),
        }
    }

    /// Display titles are synthesized locally; the service never supplies one.
    pub fn title_for(id: &ConversationId) -> String {
        format!("Chat {}", id)
    }
}

/// Truncate to at most `max_chars` Unicode scalar values.
pub fn preview_of(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}

// =============================================================================
// Documents
// =============================================================================

/// A file selected for upload into the knowledge base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// MIME type inferred from the extension; the backend picks a loader by extension.
    pub fn content_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("txt") => "text/plain",
            Some("csv") => "text/csv",
            Some("json") => "application/json",
            Some("md") => "text/markdown",
            Some("html") | Some("htm") => "text/html",
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            _ => "application/octet-stream",
        }
    }
}
