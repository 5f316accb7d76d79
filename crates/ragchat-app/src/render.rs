//! Plain-text rendering of session state.

use std::collections::HashMap;
use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use ragchat_core::{Conversation, Message, MessageId, MessageStatus, Resolution};

/// `h:mm AM/PM`, no leading zero on the hour.
pub fn format_time<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    timestamp.format("%-I:%M %p").to_string()
}

pub fn format_message<Tz: TimeZone>(message: &Message, timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let speaker = if message.is_user() { "you" } else { "assistant" };
    format!("[{}] {}: {}", format_time(timestamp), speaker, message.content)
}

pub fn format_conversation(conversation: &Conversation) -> String {
    let marker = if conversation.is_active { '*' } else { ' ' };
    if conversation.last_message_preview.is_empty() {
        format!("{} {:>4}  {}", marker, conversation.id.as_str(), conversation.title)
    } else {
        format!(
            "{} {:>4}  {}  {}",
            marker,
            conversation.id.as_str(),
            conversation.title,
            conversation.last_message_preview
        )
    }
}

/// Tracks which timeline entries were already printed.
#[derive(Debug, Default)]
pub struct TimelineRenderer {
    shown: HashMap<MessageId, MessageStatus>,
}

impl TimelineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries to print for `timeline`: new ones, plus notices rewritten by
    /// a successful upload since last time. If an entry printed earlier is
    /// gone the timeline was replaced and everything is printed again.
    pub fn changes<'a>(&mut self, timeline: &'a [Message]) -> Vec<&'a Message> {
        let replaced = self
            .shown
            .keys()
            .any(|id| !timeline.iter().any(|m| &m.id == id));
        if replaced {
            self.shown.clear();
        }

        let mut out = Vec::new();
        for message in timeline {
            let print = match self.shown.get(&message.id) {
                None => true,
                Some(previous) => {
                    previous != &message.status
                        && message.status == MessageStatus::Resolved(Resolution::Succeeded)
                }
            };
            if print {
                out.push(message);
            }
            self.shown.insert(message.id.clone(), message.status);
        }
        out
    }
}
