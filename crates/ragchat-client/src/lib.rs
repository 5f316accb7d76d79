//! Typed client for the retrieval-augmented chat backend.
//!
//! Wraps the conversation, ask and upload endpoints behind the
//! [`ChatService`] trait and classifies every failure into a small
//! [`ServiceError`] taxonomy. Also carries the credential service contract
//! (login / signup) used to obtain a bearer token.

pub mod auth;
pub mod error;
pub mod http;
pub mod mock;
pub mod service;
pub mod wire;

pub use auth::{AuthClient, AuthError, LoginResponse, SignupRequest};
pub use error::{ErrorKind, ServiceError};
pub use http::HttpChatService;
pub use mock::MockChatService;
pub use service::ChatService;
pub use wire::{AskResponse, ConversationSummary, HistoryMessage, UploadReceipt};
