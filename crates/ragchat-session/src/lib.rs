//! Conversation session manager.
//!
//! Owns the conversation list and the active timeline, drives every remote
//! call through [`ragchat_client::ChatService`], applies optimistic updates
//! and reconciles each response (or failure) back into a consistent state.

pub mod action;
pub mod error;
pub mod events;
pub mod ids;
pub mod manager;
pub mod timeline;

pub use action::{ActionKind, ActionPhase, ActionTracker, RequestTag, SessionCursor, Staleness};
pub use error::SessionError;
pub use events::SessionEvent;
pub use ids::LocalIdGenerator;
pub use manager::{Reconciliation, SendOutcome, SessionManager, SessionView, UploadOutcome};
pub use timeline::Timeline;
