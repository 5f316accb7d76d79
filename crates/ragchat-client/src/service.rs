use async_trait::async_trait;

use ragchat_core::{ConversationId, Document};

use crate::error::ServiceError;
use crate::wire::{ConversationSummary, HistoryMessage, UploadReceipt};

/// The remote operations the session manager depends on.
///
/// Every method takes the caller's bearer token explicitly; implementations
/// attach it as `Authorization: Bearer <token>` only when it is present.
/// No implementation retries: a failed call yields exactly one error.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// List the caller's conversations in server order.
    async fn list_conversations(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, ServiceError>;

    /// Create a new, empty conversation and return its id.
    async fn create_conversation(&self, token: Option<&str>)
        -> Result<ConversationId, ServiceError>;

    /// Fetch the stored history of one conversation.
    async fn fetch_messages(
        &self,
        token: Option<&str>,
        conversation: &ConversationId,
    ) -> Result<Vec<HistoryMessage>, ServiceError>;

    /// Ask a question within a conversation and return the answer text.
    ///
    /// `conversation` is `None` when nothing is selected; the service decides
    /// how to reject that.
    async fn ask(
        &self,
        token: Option<&str>,
        conversation: Option<&ConversationId>,
        question: &str,
    ) -> Result<String, ServiceError>;

    /// Upload a document into the knowledge base.
    async fn upload_document(
        &self,
        token: Option<&str>,
        document: &Document,
    ) -> Result<UploadReceipt, ServiceError>;
}
