//! The session manager.
//!
//! All state lives behind one `std::sync::Mutex` that is never held across
//! an `.await`: each operation applies its optimistic mutation, releases
//! the lock, awaits the remote call, then re-acquires the lock to
//! reconcile. Any number of operations may be in flight at once.
//!
//! Every request is tagged at issue time (see [`RequestTag`]); a response
//! whose tag no longer matches the session is discarded instead of being
//! merged into a conversation it was not meant for.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;

use ragchat_client::{ChatService, HistoryMessage, ServiceError};
use ragchat_core::config::SessionConfig;
use ragchat_core::{
    preview_of, Conversation, ConversationId, Document, Message, MessageId, MessageStatus,
    Resolution, TokenProvider,
};

use crate::action::{ActionKind, ActionPhase, ActionTracker, RequestTag, SessionCursor, Staleness};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::ids::LocalIdGenerator;
use crate::timeline::Timeline;

/// Assistant message appended when a question could not be answered.
pub const SEND_FAILURE_MESSAGE: &str =
    "I'm sorry, I'm having trouble processing your request right now. Please try again.";

const EVENT_CAPACITY: usize = 256;

fn upload_notice(file_name: &str) -> String {
    format!("Uploading and processing document: {}...", file_name)
}

fn upload_succeeded(file_name: &str) -> String {
    format!(
        "✅ Document \"{}\" has been successfully uploaded and indexed. You can now ask questions about it!",
        file_name
    )
}

fn upload_failed(file_name: &str) -> String {
    format!("❌ Failed to upload document \"{}\". Please try again.", file_name)
}

// =============================================================================
// Outcomes and view
// =============================================================================

/// Whether a resolved request changed session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Applied,
    /// The response arrived after the session moved on and was dropped.
    Discarded,
}

/// Result of [`SessionManager::send_message`]. Failures are already visible
/// in the timeline; nothing here needs handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty or whitespace-only input. Nothing changed.
    Skipped,
    /// The assistant reply was appended with this id.
    Answered(MessageId),
    /// The apology message was appended with this id.
    Failed { message: MessageId, error: ServiceError },
    /// The reply belonged to a conversation that is no longer active.
    Discarded,
}

/// Result of [`SessionManager::upload_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The success message: the notice resolved in place, or a new entry
    /// when the notice was no longer in the timeline.
    Uploaded(MessageId),
    /// The failure message was appended with this id.
    Failed { message: MessageId, error: ServiceError },
    Discarded,
}

/// Read-only snapshot of session state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub display_name: String,
    pub conversations: Vec<Conversation>,
    pub active_conversation: Option<ConversationId>,
    pub timeline: Vec<Message>,
    pub draft: String,
    /// Any request in flight.
    pub busy: bool,
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Default)]
struct SessionState {
    display_name: String,
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    timeline: Timeline,
    draft: String,
    epoch: u64,
    selection: u64,
    actions: ActionTracker,
}

impl SessionState {
    fn cursor(&self) -> SessionCursor {
        SessionCursor {
            epoch: self.epoch,
            selection: self.selection,
            active: self.active.clone(),
        }
    }

    /// Empty everything except in-flight bookkeeping and start a new epoch.
    fn reset(&mut self, display_name: String) {
        self.display_name = display_name;
        self.conversations.clear();
        self.active = None;
        self.timeline = Timeline::new();
        self.draft.clear();
        self.epoch += 1;
    }

    fn activate(&mut self, id: &ConversationId) {
        for conversation in &mut self.conversations {
            conversation.is_active = &conversation.id == id;
        }
        self.active = Some(id.clone());
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Owns the conversation list and active timeline and drives every remote call.
pub struct SessionManager {
    service: Arc<dyn ChatService>,
    tokens: Arc<dyn TokenProvider>,
    config: SessionConfig,
    ids: LocalIdGenerator,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        service: Arc<dyn ChatService>,
        tokens: Arc<dyn TokenProvider>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = SessionState {
            display_name: tokens.display_name_or(&config.guest_name),
            ..SessionState::default()
        };
        Self {
            service,
            tokens,
            config,
            ids: LocalIdGenerator::new(),
            state: Mutex::new(state),
            events,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Receive a [`SessionEvent`] after every state change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn view(&self) -> SessionView {
        let state = self.lock();
        SessionView {
            display_name: state.display_name.clone(),
            conversations: state.conversations.clone(),
            active_conversation: state.active.clone(),
            timeline: state.timeline.messages().to_vec(),
            draft: state.draft.clone(),
            busy: state.actions.is_busy(),
        }
    }

    /// Whether the document's extension is one the session accepts for upload.
    pub fn accepts(&self, document: &Document) -> bool {
        document.extension().is_some_and(|ext| {
            self.config
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        })
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
        self.emit(&[SessionEvent::DraftChanged]);
    }

    /// Send whatever is held in the draft.
    pub async fn submit_draft(&self) -> SendOutcome {
        let draft = self.lock().draft.clone();
        self.send_message(&draft).await
    }

    // ---- Conversations ----

    /// Reset all state and load the conversation list.
    ///
    /// Works without a token: the request goes out unauthenticated and the
    /// service decides. A listing failure leaves the list empty and is
    /// returned, never fatal.
    pub async fn initialize(&self) -> Result<Reconciliation, ServiceError> {
        let token = self.tokens.token();
        if token.is_none() {
            tracing::warn!("No authentication token found, continuing as guest");
        }
        let display_name = self.tokens.display_name_or(&self.config.guest_name);

        let tag = {
            let mut state = self.lock();
            state.reset(display_name);
            self.issue(&mut state, ActionKind::Initialize)
        };
        self.emit(&[
            SessionEvent::Reset,
            SessionEvent::ActionStarted(ActionKind::Initialize),
        ]);

        let result = self.service.list_conversations(token.as_deref()).await;

        let mut state = self.lock();
        if let Some(reason) = self.staleness(&tag, &state) {
            self.discard(state, &tag, reason);
            return Ok(Reconciliation::Discarded);
        }
        match result {
            Ok(summaries) => {
                state.conversations = summaries
                    .into_iter()
                    .map(|summary| Conversation::loaded(summary.id))
                    .collect();
                tracing::info!(count = state.conversations.len(), "Loaded conversations");
                self.settle(
                    state,
                    &tag,
                    ActionPhase::Reconciled,
                    vec![SessionEvent::ConversationsChanged],
                );
                Ok(Reconciliation::Applied)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to load conversations");
                self.settle(state, &tag, ActionPhase::Reported, Vec::new());
                Err(error)
            }
        }
    }

    /// Create a conversation on the service and make it the active one.
    pub async fn start_new_conversation(&self) -> Result<Reconciliation, ServiceError> {
        let token = self.tokens.token();
        let tag = {
            let mut state = self.lock();
            self.issue(&mut state, ActionKind::Create)
        };
        self.emit(&[SessionEvent::ActionStarted(ActionKind::Create)]);

        let result = self.service.create_conversation(token.as_deref()).await;

        let mut state = self.lock();
        if let Some(reason) = self.staleness(&tag, &state) {
            self.discard(state, &tag, reason);
            return Ok(Reconciliation::Discarded);
        }
        match result {
            Ok(id) => {
                state.conversations.retain(|c| c.id != id);
                state.conversations.insert(0, Conversation::created(id.clone()));
                state.activate(&id);
                state.selection += 1;
                state.timeline = Timeline::new();
                state.timeline.append(self.greeting());
                tracing::info!(conversation = %id, "Started new conversation");
                self.settle(
                    state,
                    &tag,
                    ActionPhase::Reconciled,
                    vec![SessionEvent::ConversationsChanged, SessionEvent::TimelineChanged],
                );
                Ok(Reconciliation::Applied)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to start new conversation");
                self.settle(state, &tag, ActionPhase::Reported, Vec::new());
                Err(error)
            }
        }
    }

    /// Make `id` active and replace the timeline with its stored history.
    ///
    /// The active flag moves immediately, even if `id` was already active or
    /// is not in the list. On failure the timeline is left as it was.
    pub async fn select_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Reconciliation, ServiceError> {
        let token = self.tokens.token();
        let tag = {
            let mut state = self.lock();
            state.activate(id);
            state.selection += 1;
            self.issue(&mut state, ActionKind::Select)
        };
        self.emit(&[
            SessionEvent::ConversationsChanged,
            SessionEvent::ActionStarted(ActionKind::Select),
        ]);

        let result = self.service.fetch_messages(token.as_deref(), id).await;

        let mut state = self.lock();
        if let Some(reason) = self.staleness(&tag, &state) {
            self.discard(state, &tag, reason);
            return Ok(Reconciliation::Discarded);
        }
        match result {
            Ok(history) => {
                let messages = history
                    .into_iter()
                    .map(|row| self.history_message(row))
                    .collect();
                state.timeline = Timeline::from_messages(messages);
                if state.timeline.is_empty() {
                    state.timeline.append(self.greeting());
                }

                let preview = state
                    .timeline
                    .last()
                    .map(|last| preview_of(&last.content, self.config.preview_chars));
                if let Some(preview) = preview {
                    if let Some(conversation) =
                        state.conversations.iter_mut().find(|c| &c.id == id)
                    {
                        conversation.last_message_preview = preview;
                    }
                }

                tracing::info!(
                    conversation = %id,
                    messages = state.timeline.len(),
                    "Loaded conversation"
                );
                self.settle(
                    state,
                    &tag,
                    ActionPhase::Reconciled,
                    vec![SessionEvent::TimelineChanged, SessionEvent::ConversationsChanged],
                );
                Ok(Reconciliation::Applied)
            }
            Err(error) => {
                tracing::warn!(conversation = %id, error = %error, "Failed to load messages");
                self.settle(state, &tag, ActionPhase::Reported, Vec::new());
                Err(error)
            }
        }
    }

    // ---- Messages ----

    /// Echo `text` into the timeline, ask the service, and append the reply
    /// or an apology. The user message is never removed.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Skipped;
        }
        let token = self.tokens.token();

        let (tag, question) = {
            let mut state = self.lock();
            let question = state
                .timeline
                .append(Message::tentative_user(self.ids.next_id(), text));
            state.draft.clear();
            (self.issue(&mut state, ActionKind::Send), question)
        };
        self.emit(&[
            SessionEvent::TimelineChanged,
            SessionEvent::DraftChanged,
            SessionEvent::ActionStarted(ActionKind::Send),
        ]);

        let result = self
            .service
            .ask(token.as_deref(), tag.issued.active.as_ref(), text)
            .await;

        let mut state = self.lock();
        let confirmed = state.timeline.confirm(&question);
        if let Some(reason) = self.staleness(&tag, &state) {
            let events = if confirmed {
                vec![SessionEvent::TimelineChanged]
            } else {
                Vec::new()
            };
            tracing::debug!(seq = tag.seq, %reason, "Discarding stale reply");
            self.settle(state, &tag, ActionPhase::Reconciled, events);
            return SendOutcome::Discarded;
        }
        match result {
            Ok(answer) => {
                let reply = state
                    .timeline
                    .append(Message::assistant(self.ids.next_id(), answer));
                self.settle(
                    state,
                    &tag,
                    ActionPhase::Reconciled,
                    vec![SessionEvent::TimelineChanged],
                );
                SendOutcome::Answered(reply)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Error getting assistant response");
                let message = state
                    .timeline
                    .append(Message::assistant(self.ids.next_id(), SEND_FAILURE_MESSAGE));
                self.settle(
                    state,
                    &tag,
                    ActionPhase::Reported,
                    vec![SessionEvent::TimelineChanged],
                );
                SendOutcome::Failed { message, error }
            }
        }
    }

    /// Upload a document into the knowledge base with an in-timeline
    /// progress notice that is resolved when the upload finishes.
    pub async fn upload_document(&self, document: Document) -> UploadOutcome {
        let token = self.tokens.token();
        let name = document.file_name.clone();

        let (tag, notice) = {
            let mut state = self.lock();
            let notice = state
                .timeline
                .append(Message::transient(self.ids.next_id(), upload_notice(&name)));
            (self.issue(&mut state, ActionKind::Upload), notice)
        };
        self.emit(&[
            SessionEvent::TimelineChanged,
            SessionEvent::ActionStarted(ActionKind::Upload),
        ]);

        let result = self
            .service
            .upload_document(token.as_deref(), &document)
            .await;

        let mut state = self.lock();
        if let Some(reason) = self.staleness(&tag, &state) {
            self.discard(state, &tag, reason);
            return UploadOutcome::Discarded;
        }
        match result {
            Ok(receipt) => {
                tracing::info!(file = %name, status = ?receipt.status, "Document uploaded");
                // A re-fetch of the same conversation may have dropped the notice.
                let resolved = if state.timeline.resolve(
                    &notice,
                    Resolution::Succeeded,
                    Some(upload_succeeded(&name)),
                ) {
                    notice
                } else {
                    state
                        .timeline
                        .append(Message::assistant(self.ids.next_id(), upload_succeeded(&name)))
                };
                self.settle(
                    state,
                    &tag,
                    ActionPhase::Reconciled,
                    vec![SessionEvent::TimelineChanged],
                );
                UploadOutcome::Uploaded(resolved)
            }
            Err(error) => {
                tracing::warn!(file = %name, error = %error, "Document upload failed");
                state.timeline.resolve(&notice, Resolution::Failed, None);
                let message = state
                    .timeline
                    .append(Message::assistant(self.ids.next_id(), upload_failed(&name)));
                self.settle(
                    state,
                    &tag,
                    ActionPhase::Reported,
                    vec![SessionEvent::TimelineChanged],
                );
                UploadOutcome::Failed { message, error }
            }
        }
    }

    // ---- Credentials ----

    /// Forget the stored credentials and empty the session.
    ///
    /// State is reset even when clearing the token store fails; that
    /// failure is returned.
    pub fn sign_out(&self) -> Result<(), SessionError> {
        self.lock().reset(self.config.guest_name.clone());
        let cleared = self.tokens.clear();
        self.emit(&[SessionEvent::SignedOut]);
        match &cleared {
            Ok(()) => tracing::info!("Signed out"),
            Err(e) => tracing::warn!(error = %e, "Signed out but credentials could not be cleared"),
        }
        cleared.map_err(SessionError::from)
    }

    // ---- Internals ----

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: &[SessionEvent]) {
        for event in events {
            // No receivers is fine.
            let _ = self.events.send(*event);
        }
    }

    fn issue(&self, state: &mut SessionState, kind: ActionKind) -> RequestTag {
        let seq = state.actions.begin(kind);
        RequestTag {
            seq,
            kind,
            issued: state.cursor(),
        }
    }

    fn staleness(&self, tag: &RequestTag, state: &SessionState) -> Option<Staleness> {
        tag.staleness(&state.cursor(), self.config.discard_stale_responses)
    }

    /// Retire an action, release the lock, then notify subscribers.
    fn settle(
        &self,
        mut state: MutexGuard<'_, SessionState>,
        tag: &RequestTag,
        phase: ActionPhase,
        mut events: Vec<SessionEvent>,
    ) {
        if let Err(e) = state.actions.finish(tag.seq, phase) {
            tracing::warn!(error = %e, "Action bookkeeping out of sync");
        }
        drop(state);
        events.push(SessionEvent::ActionFinished {
            kind: tag.kind,
            phase,
        });
        self.emit(&events);
    }

    fn discard(&self, state: MutexGuard<'_, SessionState>, tag: &RequestTag, reason: Staleness) {
        tracing::debug!(seq = tag.seq, kind = %tag.kind, %reason, "Discarding stale response");
        self.settle(state, tag, ActionPhase::Reconciled, Vec::new());
    }

    fn greeting(&self) -> Message {
        Message::assistant(self.ids.next_id(), self.config.greeting.clone())
    }

    fn history_message(&self, row: HistoryMessage) -> Message {
        let origin = row.origin();
        let timestamp = row.created_at().unwrap_or_else(Utc::now);
        Message {
            id: row.id.unwrap_or_else(|| self.ids.next_id()),
            content: row.content.unwrap_or_default(),
            timestamp,
            origin,
            status: MessageStatus::Confirmed,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
