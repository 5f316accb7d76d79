//! In-memory [`ChatService`] for tests and offline runs.
//!
//! Behaves like the real backend (conversations, stored history, answers
//! written back into history) and lets callers script failures, hold a call
//! open until released, and inspect the calls that were made.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use ragchat_core::{ConversationId, Document, MessageId};

use crate::error::ServiceError;
use crate::service::ChatService;
use crate::wire::{ConversationSummary, HistoryMessage, UploadReceipt};

/// Which remote operation a call, failure or gate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListConversations,
    CreateConversation,
    FetchMessages,
    Ask,
    UploadDocument,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub token: Option<String>,
    pub conversation: Option<ConversationId>,
    /// Question text or uploaded file name.
    pub payload: Option<String>,
}

/// Releases one held call when dropped or released.
#[derive(Debug)]
pub struct Gate(Option<oneshot::Sender<()>>);

impl Gate {
    pub fn release(mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    required_token: Option<String>,
    conversations: Vec<ConversationId>,
    history: HashMap<ConversationId, Vec<HistoryMessage>>,
    next_conversation: i64,
    next_message: i64,
    answers: VecDeque<String>,
    failures: HashMap<Operation, VecDeque<ServiceError>>,
    gates: HashMap<Operation, VecDeque<oneshot::Receiver<()>>>,
    calls: Vec<Call>,
}

/// Scriptable in-memory chat backend.
#[derive(Debug, Default)]
pub struct MockChatService {
    state: Mutex<MockState>,
}

impl MockChatService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_conversation: 1,
                next_message: 1,
                ..MockState::default()
            }),
        }
    }

    /// Reject every call whose bearer token differs from `token`.
    pub fn require_token(self, token: impl Into<String>) -> Self {
        self.lock().required_token = Some(token.into());
        self
    }

    /// Add an existing conversation with the given history.
    pub fn with_conversation(
        self,
        id: impl Into<ConversationId>,
        history: Vec<HistoryMessage>,
    ) -> Self {
        let id = id.into();
        {
            let mut state = self.lock();
            if let Ok(n) = id.as_str().parse::<i64>() {
                state.next_conversation = state.next_conversation.max(n + 1);
            }
            state.conversations.push(id.clone());
            state.history.insert(id, history);
        }
        self
    }

    /// Queue the answer for the next successful `ask`.
    pub fn push_answer(&self, answer: impl Into<String>) {
        self.lock().answers.push_back(answer.into());
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: ServiceError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Hold the next call of `operation` open until the returned gate is released.
    pub fn hold_next(&self, operation: Operation) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.entry(operation).or_default().push_back(rx);
        Gate(Some(tx))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Stored history for a conversation, as the backend would return it.
    pub fn history(&self, id: &ConversationId) -> Vec<HistoryMessage> {
        self.lock().history.get(id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, wait on its gate if one is queued, then apply auth
    /// and any scripted failure.
    async fn enter(&self, call: Call) -> Result<(), ServiceError> {
        let operation = call.operation;
        let token = call.token.clone();
        let gate = {
            let mut state = self.lock();
            state.calls.push(call);
            state.gates.get_mut(&operation).and_then(VecDeque::pop_front)
        };
        if let Some(rx) = gate {
            let _ = rx.await;
        }

        let mut state = self.lock();
        if let Some(required) = &state.required_token {
            if token.as_deref() != Some(required.as_str()) {
                return Err(ServiceError::Unauthorized("Not authenticated".to_string()));
            }
        }
        if let Some(err) = state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(())
    }
}

fn call(operation: Operation, token: Option<&str>) -> Call {
    Call {
        operation,
        token: token.map(str::to_string),
        conversation: None,
        payload: None,
    }
}

fn stored_message(id: i64, sender: &str, content: &str) -> HistoryMessage {
    HistoryMessage {
        id: Some(MessageId::new(id.to_string())),
        content: Some(content.to_string()),
        created_at: Some(Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        sender: Some(sender.to_string()),
    }
}

#[async_trait]
impl ChatService for MockChatService {
    async fn list_conversations(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, ServiceError> {
        self.enter(call(Operation::ListConversations, token)).await?;
        let state = self.lock();
        Ok(state
            .conversations
            .iter()
            .map(|id| ConversationSummary { id: id.clone() })
            .collect())
    }

    async fn create_conversation(
        &self,
        token: Option<&str>,
    ) -> Result<ConversationId, ServiceError> {
        self.enter(call(Operation::CreateConversation, token)).await?;
        let mut state = self.lock();
        let id = ConversationId::from(state.next_conversation);
        state.next_conversation += 1;
        state.conversations.push(id.clone());
        state.history.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn fetch_messages(
        &self,
        token: Option<&str>,
        conversation: &ConversationId,
    ) -> Result<Vec<HistoryMessage>, ServiceError> {
        self.enter(Call {
            conversation: Some(conversation.clone()),
            ..call(Operation::FetchMessages, token)
        })
        .await?;
        let state = self.lock();
        state
            .history
            .get(conversation)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("Conversation not found".to_string()))
    }

    async fn ask(
        &self,
        token: Option<&str>,
        conversation: Option<&ConversationId>,
        question: &str,
    ) -> Result<String, ServiceError> {
        self.enter(Call {
            conversation: conversation.cloned(),
            payload: Some(question.to_string()),
            ..call(Operation::Ask, token)
        })
        .await?;
        let mut state = self.lock();
        let Some(conversation) = conversation else {
            return Err(ServiceError::BadRequest(
                "conversation_id: field required".to_string(),
            ));
        };
        if !state.history.contains_key(conversation) {
            return Err(ServiceError::Unauthorized("Unauthorized".to_string()));
        }
        let answer = state
            .answers
            .pop_front()
            .unwrap_or_else(|| format!("Echo: {}", question));

        let user_id = state.next_message;
        let reply_id = user_id + 1;
        state.next_message += 2;
        if let Some(history) = state.history.get_mut(conversation) {
            history.push(stored_message(user_id, "user", question));
            history.push(stored_message(reply_id, "assistant", &answer));
        }
        Ok(answer)
    }

    async fn upload_document(
        &self,
        token: Option<&str>,
        document: &Document,
    ) -> Result<UploadReceipt, ServiceError> {
        self.enter(Call {
            payload: Some(document.file_name.clone()),
            ..call(Operation::UploadDocument, token)
        })
        .await?;
        Ok(UploadReceipt {
            status: Some("success".to_string()),
            message: Some("File uploaded and indexed.".to_string()),
        })
    }
}
