//! reqwest-backed implementation of [`ChatService`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use ragchat_core::config::ServiceConfig;
use ragchat_core::{ConversationId, Document};

use crate::error::ServiceError;
use crate::service::ChatService;
use crate::wire::{AskResponse, ConversationSummary, CreatedConversation, HistoryMessage, UploadReceipt};

/// Shared HTTP plumbing: base URL joining, auth header and response classification.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: Client,
    base_url: String,
}

impl Transport {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn get(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.get(self.url(path)), token)
    }

    pub(crate) fn post(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.post(self.url(path)), token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send the request and decode a JSON body, classifying every failure.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "Chat service request failed");
            ServiceError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ServiceError::from_status(status, &body);
            tracing::warn!(operation, status = status.as_u16(), error = %err, "Chat service rejected request");
            return Err(err);
        }

        tracing::debug!(operation, status = status.as_u16(), "Chat service responded");
        response.json::<T>().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "Chat service response could not be decoded");
            ServiceError::from(e)
        })
    }
}

fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// HTTP client for the chat backend.
#[derive(Debug, Clone)]
pub struct HttpChatService {
    transport: Transport,
}

impl HttpChatService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            transport: Transport::new(base_url),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn list_conversations(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, ServiceError> {
        let request = self.transport.get("/conversations/", token);
        self.transport.execute("list_conversations", request).await
    }

    async fn create_conversation(
        &self,
        token: Option<&str>,
    ) -> Result<ConversationId, ServiceError> {
        let request = self
            .transport
            .post("/conversations/", token)
            .json(&serde_json::json!({}));
        let created: CreatedConversation =
            self.transport.execute("create_conversation", request).await?;
        Ok(created.conversation_id)
    }

    async fn fetch_messages(
        &self,
        token: Option<&str>,
        conversation: &ConversationId,
    ) -> Result<Vec<HistoryMessage>, ServiceError> {
        let path = format!("/conversations/{}/messages", conversation);
        let request = self.transport.get(&path, token);
        self.transport.execute("fetch_messages", request).await
    }

    async fn ask(
        &self,
        token: Option<&str>,
        conversation: Option<&ConversationId>,
        question: &str,
    ) -> Result<String, ServiceError> {
        let form = Form::new()
            .text("question", question.to_string())
            .text(
                "conversation_id",
                conversation.map(|c| c.to_string()).unwrap_or_default(),
            );
        let request = self.transport.post("/ask/", token).multipart(form);
        let response: AskResponse = self.transport.execute("ask", request).await?;
        Ok(response.into_answer())
    }

    async fn upload_document(
        &self,
        token: Option<&str>,
        document: &Document,
    ) -> Result<UploadReceipt, ServiceError> {
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(document.content_type())
            .map_err(|e| ServiceError::BadRequest(format!("invalid document: {}", e)))?;
        let form = Form::new().part("file", part);
        let request = self.transport.post("/upload/", token).multipart(form);
        self.transport.execute("upload_document", request).await
    }
}
