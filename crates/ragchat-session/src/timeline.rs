//! Append-only message timeline of the active conversation.
//!
//! Insertion order is display order. Entries are never removed or
//! reordered; the only in-place edits are the two status transitions
//! `Tentative -> Confirmed` and `Transient -> Resolved`.

use ragchat_core::{Message, MessageId, MessageStatus, Resolution};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    messages: Vec<Message>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline from already-ordered history.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    /// Append at the end and return the message id.
    pub fn append(&mut self, message: Message) -> MessageId {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Settle a tentative user message. Returns false if `id` is absent or
    /// not tentative.
    pub fn confirm(&mut self, id: &MessageId) -> bool {
        match self.find_mut(id) {
            Some(message) if message.status == MessageStatus::Tentative => {
                message.status = MessageStatus::Confirmed;
                true
            }
            _ => false,
        }
    }

    /// Resolve a transient notice, optionally replacing its content.
    /// Returns false if `id` is absent or already resolved.
    pub fn resolve(
        &mut self,
        id: &MessageId,
        resolution: Resolution,
        content: Option<String>,
    ) -> bool {
        match self.find_mut(id) {
            Some(message) if message.status == MessageStatus::Transient => {
                message.status = MessageStatus::Resolved(resolution);
                if let Some(content) = content {
                    message.content = content;
                }
                true
            }
            _ => false,
        }
    }

    fn find_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }
}
